//! Fetched message summaries

use async_imap::types::Fetch;
use chrono::{DateTime, FixedOffset};
use mail_parser::{MessageParser, MimeHeaders};

use crate::{ImapError, ImapResult};

/// One mailbox from an address header, with its optional display name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailAddress {
    /// Human-readable name, when the header carried one
    pub name: Option<String>,
    /// The bare address, e.g. "kate@gmail.com"
    pub address: String,
}

impl EmailAddress {
    pub fn new(name: Option<String>, address: String) -> Self {
        Self { name, address }
    }
}

/// Renders "Name <address>", or the bare address when there is no name
impl std::fmt::Display for EmailAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => write!(f, "{} <{}>", name, self.address),
            _ => f.write_str(&self.address),
        }
    }
}

/// Metadata for an attachment found in a fetched message
#[derive(Debug, Clone)]
pub struct AttachmentMeta {
    pub filename: String,
    pub mime_type: String,
}

/// Summary of one fetched message
#[derive(Debug, Clone)]
pub struct MessageSummary {
    /// Server-assigned UID, unique only within the folder it came from
    pub uid: u32,
    /// Envelope Date header, with INTERNALDATE as the fallback
    pub date: Option<DateTime<FixedOffset>>,
    /// From addresses
    pub from: Vec<EmailAddress>,
    /// To addresses
    pub to: Vec<EmailAddress>,
    /// Subject line
    pub subject: Option<String>,
    /// Plain-text body
    pub text: Option<String>,
    /// Attachments carried by the message
    pub attachments: Vec<AttachmentMeta>,
}

impl MessageSummary {
    /// Build a summary from a FETCH response carrying UID, ENVELOPE and BODY[]
    pub fn from_fetch(fetch: &Fetch) -> ImapResult<Self> {
        let uid = fetch
            .uid
            .ok_or_else(|| ImapError::BadResponse("FETCH response carried no UID".to_string()))?;

        let mut summary = MessageSummary {
            uid,
            date: None,
            from: Vec::new(),
            to: Vec::new(),
            subject: None,
            text: None,
            attachments: Vec::new(),
        };

        if let Some(env) = fetch.envelope() {
            summary.subject = env
                .subject
                .as_ref()
                .map(|s| String::from_utf8_lossy(s).to_string());
            summary.from = parse_address_list(env.from.as_ref());
            summary.to = parse_address_list(env.to.as_ref());
        }
        summary.date = summary_date(fetch.envelope(), fetch.internal_date());

        if let Some(raw) = fetch.body() {
            let (text, attachments) = parse_body(raw);
            summary.text = text;
            summary.attachments = attachments;
        }

        Ok(summary)
    }

    /// Sender display string, e.g. "Jane Doe <jane@example.com>"
    pub fn from_display(&self) -> String {
        join_addresses(&self.from)
    }

    /// Recipient display string
    pub fn to_display(&self) -> String {
        join_addresses(&self.to)
    }

    /// The subject, with a default for empty
    pub fn subject_display(&self) -> &str {
        self.subject.as_deref().unwrap_or("(No subject)")
    }
}

fn join_addresses(addresses: &[EmailAddress]) -> String {
    addresses
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Decode an ENVELOPE address list into displayable addresses
pub(crate) fn parse_address_list(
    addrs: Option<&Vec<imap_proto::types::Address>>,
) -> Vec<EmailAddress> {
    addrs
        .map(|v| {
            v.iter()
                .map(|a| {
                    let mailbox = a
                        .mailbox
                        .as_ref()
                        .map(|s| String::from_utf8_lossy(s).to_string())
                        .unwrap_or_default();
                    let host = a
                        .host
                        .as_ref()
                        .map(|s| String::from_utf8_lossy(s).to_string())
                        .unwrap_or_default();
                    let address = format!("{}@{}", mailbox, host);
                    let name = a
                        .name
                        .as_ref()
                        .map(|s| String::from_utf8_lossy(s).to_string());
                    EmailAddress::new(name, address)
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Date for a summary: the envelope Date header when it parses,
/// otherwise the INTERNALDATE the server recorded at delivery
pub(crate) fn summary_date(
    envelope: Option<&imap_proto::types::Envelope<'_>>,
    internal: Option<DateTime<FixedOffset>>,
) -> Option<DateTime<FixedOffset>> {
    envelope
        .and_then(|env| env.date.as_ref())
        .and_then(|raw| parse_envelope_date(&String::from_utf8_lossy(raw)))
        .or(internal)
}

/// Parse an RFC 2822 envelope date, tolerating trailing comments like
/// "(UTC)" and irregular whitespace
pub(crate) fn parse_envelope_date(raw: &str) -> Option<DateTime<FixedOffset>> {
    let mut s = raw.trim().to_string();
    if let Some(paren) = s.rfind('(') {
        s = s[..paren].trim().to_string();
    }
    while s.contains("  ") {
        s = s.replace("  ", " ");
    }
    s = s.replace(" ,", ",");
    DateTime::parse_from_rfc2822(&s).ok()
}

/// Extract the plain-text body and attachment metadata from a raw
/// RFC 5322 payload
fn parse_body(raw: &[u8]) -> (Option<String>, Vec<AttachmentMeta>) {
    let Some(message) = MessageParser::default().parse(raw) else {
        return (None, Vec::new());
    };

    let text = message.body_text(0).map(|s| s.into_owned());

    let mut attachments = Vec::new();
    for attachment in message.attachments() {
        // Parts with a Content-ID are inline resources for an HTML
        // body, not user-facing attachments
        if attachment.content_id().is_some() {
            continue;
        }

        let mime_type = MimeHeaders::content_type(attachment)
            .map(|ct| {
                if let Some(subtype) = ct.subtype() {
                    format!("{}/{}", ct.ctype(), subtype)
                } else {
                    ct.ctype().to_string()
                }
            })
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let filename = attachment
            .attachment_name()
            .unwrap_or("attachment")
            .to_string();

        attachments.push(AttachmentMeta {
            filename,
            mime_type,
        });
    }

    (text, attachments)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_date_parsing() {
        let date = parse_envelope_date("Tue, 1 Jul 2025 10:52:37 +0300").unwrap();
        assert_eq!(date.timestamp(), 1751356357);

        // Trailing comment and doubled spaces
        assert!(parse_envelope_date("Tue, 1 Jul 2025  10:52:37 +0300 (EEST)").is_some());
        assert!(parse_envelope_date("not a date").is_none());
    }

    fn envelope_with_date(date: Option<&str>) -> imap_proto::types::Envelope<'_> {
        imap_proto::types::Envelope {
            date: date.map(|d| d.as_bytes().into()),
            subject: None,
            from: None,
            sender: None,
            reply_to: None,
            to: None,
            cc: None,
            bcc: None,
            in_reply_to: None,
            message_id: None,
        }
    }

    #[test]
    fn test_summary_date_falls_back_to_internal_date() {
        let delivered = DateTime::parse_from_rfc2822("Tue, 1 Jul 2025 10:52:37 +0300").unwrap();

        // A parseable Date header wins over the delivery time
        let dated = envelope_with_date(Some("Mon, 30 Jun 2025 09:00:00 +0200"));
        let header = summary_date(Some(&dated), Some(delivered)).unwrap();
        assert_eq!(header.timestamp(), 1751266800);

        // Garbled header: the server's delivery time stands in
        let garbled = envelope_with_date(Some("not a date"));
        assert_eq!(summary_date(Some(&garbled), Some(delivered)), Some(delivered));

        // Missing header, missing envelope
        let empty = envelope_with_date(None);
        assert_eq!(summary_date(Some(&empty), Some(delivered)), Some(delivered));
        assert_eq!(summary_date(None, Some(delivered)), Some(delivered));
        assert_eq!(summary_date(None, None), None);
    }

    #[test]
    fn test_address_display() {
        let with_name = EmailAddress::new(Some("Jane Doe".into()), "jane@example.com".into());
        assert_eq!(with_name.to_string(), "Jane Doe <jane@example.com>");

        let bare = EmailAddress::new(None, "jane@example.com".into());
        assert_eq!(bare.to_string(), "jane@example.com");

        let empty_name = EmailAddress::new(Some(String::new()), "jane@example.com".into());
        assert_eq!(empty_name.to_string(), "jane@example.com");
    }

    #[test]
    fn test_parse_body_plain_text() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "To: b@example.com\r\n",
            "Subject: hello\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "Hi there\r\n",
        );

        let (text, attachments) = parse_body(raw.as_bytes());
        assert_eq!(text.unwrap().trim(), "Hi there");
        assert!(attachments.is_empty());
    }

    #[test]
    fn test_parse_body_with_attachment() {
        let raw = concat!(
            "From: a@example.com\r\n",
            "To: b@example.com\r\n",
            "Subject: report\r\n",
            "MIME-Version: 1.0\r\n",
            "Content-Type: multipart/mixed; boundary=\"xyz\"\r\n",
            "\r\n",
            "--xyz\r\n",
            "Content-Type: text/plain\r\n",
            "\r\n",
            "See attached.\r\n",
            "--xyz\r\n",
            "Content-Type: application/pdf; name=\"report.pdf\"\r\n",
            "Content-Disposition: attachment; filename=\"report.pdf\"\r\n",
            "Content-Transfer-Encoding: base64\r\n",
            "\r\n",
            "JVBERi0=\r\n",
            "--xyz--\r\n",
        );

        let (text, attachments) = parse_body(raw.as_bytes());
        assert_eq!(text.unwrap().trim(), "See attached.");
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "report.pdf");
        assert_eq!(attachments[0].mime_type, "application/pdf");
    }
}
