//! Failure modes of outbound mail

use thiserror::Error;

/// Result type for SMTP operations
pub type SmtpResult<T> = Result<T, SmtpError>;

/// What went wrong while composing or submitting a message
#[derive(Debug, Error)]
pub enum SmtpError {
    /// The relay could not be reached or refused the TLS setup
    #[error("Could not reach the SMTP server: {0}")]
    Connect(String),

    /// An address field does not parse as a mailbox
    #[error("Unusable address {0}")]
    Address(String),

    /// The MIME document could not be assembled
    #[error("Could not compose the message: {0}")]
    Compose(String),

    /// The relay rejected the submission
    #[error("Message was not accepted: {0}")]
    Submit(String),
}
