//! Failure modes of the IMAP layer

use thiserror::Error;

/// Result type for IMAP operations
pub type ImapResult<T> = Result<T, ImapError>;

/// What went wrong while talking to the mail server
#[derive(Debug, Error)]
pub enum ImapError {
    /// The TCP connection could not be opened
    #[error("Could not reach the IMAP server: {0}")]
    Connect(String),

    /// TLS negotiation failed
    #[error("TLS setup with the IMAP server failed: {0}")]
    Tls(String),

    /// The LOGIN handshake was rejected
    #[error("Server rejected the login: {0}")]
    Login(String),

    /// The server answered a command with NO or BAD
    #[error("IMAP command failed: {0}")]
    Server(String),

    /// A response arrived but could not be decoded
    #[error("Could not decode the server response: {0}")]
    BadResponse(String),

    /// A canonical folder has no server-side counterpart
    #[error("No folder is mapped to {0}")]
    FolderNotFound(String),

    /// CREATE was refused, usually a duplicate name
    #[error("Could not create folder {name}: {reason}")]
    CreateRejected { name: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An operation ran before login or after logout
    #[error("No open IMAP session")]
    NotConnected,
}
