//! Error types for core operations

use thiserror::Error;

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors surfaced by mailbox and cache operations.
///
/// The display strings double as the `error` field of command
/// responses, so they are phrased for the client.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The LOGIN handshake was rejected
    #[error("Wrong email address or password")]
    Auth,

    /// The address belongs to no provider in the registry
    #[error("Unsupported email provider: {0}")]
    UnsupportedProvider(String),

    /// Folder could not be created (duplicate or invalid name)
    #[error("Could not create folder {name}: {reason}")]
    FolderCreate { name: String, reason: String },

    /// Canonical folder has no server-side counterpart
    #[error("Folder not found: {0}")]
    FolderNotFound(String),

    /// Local cache write failed; the batch was rolled back
    #[error("Could not update the local cache: {0}")]
    Persistence(String),

    /// Network or protocol failure talking to the mail server
    #[error("Could not reach the mail server: {0}")]
    Unreachable(String),

    /// Outbound message rejected or never built
    #[error("Could not send the message: {0}")]
    Send(String),

    /// Malformed or incomplete request fields
    #[error("{0}")]
    InvalidRequest(String),
}

impl From<harbormail_imap::ImapError> for CoreError {
    fn from(e: harbormail_imap::ImapError) -> Self {
        use harbormail_imap::ImapError;
        match e {
            ImapError::Login(_) => CoreError::Auth,
            ImapError::FolderNotFound(name) => CoreError::FolderNotFound(name),
            ImapError::CreateRejected { name, reason } => CoreError::FolderCreate { name, reason },
            other => CoreError::Unreachable(other.to_string()),
        }
    }
}

impl From<harbormail_smtp::SmtpError> for CoreError {
    fn from(e: harbormail_smtp::SmtpError) -> Self {
        use harbormail_smtp::SmtpError;
        match e {
            SmtpError::Connect(reason) => CoreError::Unreachable(reason),
            other => CoreError::Send(other.to_string()),
        }
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(e: sqlx::Error) -> Self {
        CoreError::Persistence(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use harbormail_imap::ImapError;
    use harbormail_smtp::SmtpError;

    #[test]
    fn test_imap_errors_map_to_core_kinds() {
        assert!(matches!(
            CoreError::from(ImapError::Login("NO".into())),
            CoreError::Auth
        ));

        match CoreError::from(ImapError::FolderNotFound("bin".into())) {
            CoreError::FolderNotFound(name) => assert_eq!(name, "bin"),
            other => panic!("unexpected mapping: {:?}", other),
        }

        match CoreError::from(ImapError::CreateRejected {
            name: "bin".into(),
            reason: "already exists".into(),
        }) {
            CoreError::FolderCreate { name, reason } => {
                assert_eq!(name, "bin");
                assert_eq!(reason, "already exists");
            }
            other => panic!("unexpected mapping: {:?}", other),
        }

        assert!(matches!(
            CoreError::from(ImapError::Connect("refused".into())),
            CoreError::Unreachable(_)
        ));
        assert!(matches!(
            CoreError::from(ImapError::NotConnected),
            CoreError::Unreachable(_)
        ));
    }

    #[test]
    fn test_smtp_errors_map_to_core_kinds() {
        assert!(matches!(
            CoreError::from(SmtpError::Connect("timed out".into())),
            CoreError::Unreachable(_)
        ));
        assert!(matches!(
            CoreError::from(SmtpError::Submit("rejected".into())),
            CoreError::Send(_)
        ));
        assert!(matches!(
            CoreError::from(SmtpError::Address("nope".into())),
            CoreError::Send(_)
        ));
    }
}
