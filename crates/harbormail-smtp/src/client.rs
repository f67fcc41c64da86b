//! Message composition and submission over lettre

use crate::{SmtpError, SmtpResult};
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::{Credentials, Mechanism},
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{debug, info};

/// How the SMTP connection is secured
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tls {
    /// TLS from the first byte (ports like 465)
    Implicit,
    /// Plain connection upgraded with STARTTLS (ports like 587)
    StartTls,
}

/// A file carried by an outgoing message
#[derive(Debug, Clone)]
pub struct OutgoingAttachment {
    /// Name shown to the recipient
    pub filename: String,
    /// MIME type, e.g. "application/pdf"
    pub content_type: String,
    /// Decoded file bytes
    pub data: Vec<u8>,
}

/// A message under composition, headed for SMTP submission or an
/// IMAP draft append
#[derive(Debug, Clone)]
pub struct OutgoingMessage {
    /// Sender address
    pub from: String,
    /// Recipient addresses
    pub to: Vec<String>,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: Option<String>,
    /// Message-ID header; set by callers that need to find the
    /// message again after storing it
    pub message_id: Option<String>,
    /// Attached files
    pub attachments: Vec<OutgoingAttachment>,
}

impl OutgoingMessage {
    pub fn new(from: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: Vec::new(),
            subject: subject.into(),
            body: None,
            message_id: None,
            attachments: Vec::new(),
        }
    }

    /// Add a recipient
    pub fn to(mut self, address: impl Into<String>) -> Self {
        self.to.push(address.into());
        self
    }

    /// Set the plain-text body
    pub fn text(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set the Message-ID header
    pub fn message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    /// Attach a file
    pub fn attachment(
        mut self,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        data: Vec<u8>,
    ) -> Self {
        self.attachments.push(OutgoingAttachment {
            filename: filename.into(),
            content_type: content_type.into(),
            data,
        });
        self
    }

    /// Serialize to RFC 5322 bytes, for storing via IMAP append
    pub fn formatted(&self) -> SmtpResult<Vec<u8>> {
        Ok(self.mime()?.formatted())
    }

    /// Assemble the MIME document: a text part, wrapped in
    /// multipart/mixed when files are attached
    fn mime(&self) -> SmtpResult<Message> {
        let mut builder = Message::builder()
            .from(mailbox(&self.from)?)
            .subject(&self.subject);
        for recipient in &self.to {
            builder = builder.to(mailbox(recipient)?);
        }
        if let Some(id) = &self.message_id {
            builder = builder.message_id(Some(id.clone()));
        }

        let text = SinglePart::builder()
            .header(ContentType::TEXT_PLAIN)
            .body(self.body.clone().unwrap_or_default());
        let body = MultiPart::alternative().singlepart(text);

        let assembled = if self.attachments.is_empty() {
            builder.multipart(body)
        } else {
            let mut mixed = MultiPart::mixed().multipart(body);
            for file in &self.attachments {
                let content_type = ContentType::parse(&file.content_type)
                    .unwrap_or(ContentType::parse("application/octet-stream").unwrap());
                mixed = mixed.singlepart(
                    Attachment::new(file.filename.clone()).body(file.data.clone(), content_type),
                );
            }
            builder.multipart(mixed)
        };

        assembled.map_err(|e| SmtpError::Compose(e.to_string()))
    }
}

fn mailbox(address: &str) -> SmtpResult<Mailbox> {
    let parsed = address
        .parse()
        .map_err(|e| SmtpError::Address(format!("{}: {}", address, e)))?;
    Ok(Mailbox::new(None, parsed))
}

/// One SMTP relay endpoint
pub struct SmtpClient {
    host: String,
    port: u16,
    tls: Tls,
}

impl SmtpClient {
    pub fn new(host: impl Into<String>, port: u16, tls: Tls) -> Self {
        Self {
            host: host.into(),
            port,
            tls,
        }
    }

    /// Submit a message, authenticating with the account password
    /// over the PLAIN mechanism
    pub async fn send_password(
        &self,
        email: &str,
        password: &str,
        message: OutgoingMessage,
    ) -> SmtpResult<()> {
        let recipients = message.to.len();
        let mime = message.mime()?;
        debug!("Submitting message through {}:{}", self.host, self.port);

        self.transport(email, password)?
            .send(mime)
            .await
            .map_err(|e| SmtpError::Submit(e.to_string()))?;

        info!("Message accepted for {} recipient(s)", recipients);
        Ok(())
    }

    fn transport(
        &self,
        email: &str,
        password: &str,
    ) -> SmtpResult<AsyncSmtpTransport<Tokio1Executor>> {
        let relay = match self.tls {
            Tls::Implicit => AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host),
            Tls::StartTls => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.host),
        }
        .map_err(|e| SmtpError::Connect(e.to_string()))?;

        Ok(relay
            .port(self.port)
            .credentials(Credentials::new(email.to_string(), password.to_string()))
            .authentication(vec![Mechanism::Plain])
            .build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_text_message() {
        let msg = OutgoingMessage::new("sender@gmail.com", "Meeting notes")
            .to("friend@ukr.net")
            .text("See you at three.");

        let bytes = msg.formatted().unwrap();
        let rendered = String::from_utf8_lossy(&bytes);
        assert!(rendered.contains("Subject: Meeting notes"));
        assert!(rendered.contains("To: friend@ukr.net"));
        assert!(rendered.contains("See you at three."));
    }

    #[test]
    fn test_build_message_with_attachment() {
        let msg = OutgoingMessage::new("sender@gmail.com", "Report")
            .to("friend@ukr.net")
            .text("Attached.")
            .attachment("report.pdf", "application/pdf", vec![0x25, 0x50, 0x44, 0x46]);

        let bytes = msg.formatted().unwrap();
        let rendered = String::from_utf8_lossy(&bytes);
        assert!(rendered.contains("multipart/mixed"));
        assert!(rendered.contains("report.pdf"));
    }

    #[test]
    fn test_message_id_is_carried() {
        let msg = OutgoingMessage::new("sender@gmail.com", "Draft")
            .to("friend@ukr.net")
            .message_id("<12345@harbormail>");

        let bytes = msg.formatted().unwrap();
        let rendered = String::from_utf8_lossy(&bytes);
        assert!(rendered.contains("<12345@harbormail>"));
    }

    #[test]
    fn test_invalid_recipient_is_rejected() {
        let msg = OutgoingMessage::new("sender@gmail.com", "Oops").to("not-an-address");
        assert!(matches!(msg.mime(), Err(SmtpError::Address(_))));
    }

    #[test]
    fn test_unknown_attachment_type_falls_back() {
        let msg = OutgoingMessage::new("sender@gmail.com", "Data")
            .to("friend@ukr.net")
            .attachment("blob.bin", "definitely not a mime type", vec![1, 2, 3]);

        let rendered = String::from_utf8_lossy(&msg.formatted().unwrap()).to_string();
        assert!(rendered.contains("application/octet-stream"));
    }
}
