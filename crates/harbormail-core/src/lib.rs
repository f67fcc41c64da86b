//! Core services for HarborMail
//!
//! Ties the protocol crates together: provider presets, per-request
//! mailbox sessions, the command dispatcher, and the SQLite-backed
//! local cache.

mod command;
mod database;
mod error;
mod provider;
mod reconcile;
mod session;
pub mod validation;

pub use command::{
    execute, Command, CommandContext, CommandResponse, DraftFields, FormAttachment,
    DEFAULT_FETCH_LIMIT,
};
pub use database::{Database, DbAttachment, DbEmail};
pub use error::{CoreError, CoreResult};
pub use provider::{Provider, ProviderRegistry};
pub use reconcile::{reconcile, ReconcileReport};
pub use session::MailboxSession;
