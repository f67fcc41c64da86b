//! IMAP protocol layer for HarborMail
//!
//! One authenticated connection per client request, plus the canonical
//! folder-name mapping that hides provider naming schemes.

mod client;
mod error;
mod folder;
mod message;

pub use client::ImapClient;
pub use error::{ImapError, ImapResult};
pub use folder::{
    CanonicalFolder, FolderLayout, FolderMapping, ServerFolder, DEFAULT_FOLDER_KEYS,
};
pub use message::{AttachmentMeta, EmailAddress, MessageSummary};
