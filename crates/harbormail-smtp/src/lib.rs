//! SMTP layer for HarborMail
//!
//! Composes outbound messages and submits them with the account's
//! own credentials over implicit TLS or STARTTLS.

mod client;
mod error;

pub use client::{OutgoingAttachment, OutgoingMessage, SmtpClient, Tls};
pub use error::{SmtpError, SmtpResult};
