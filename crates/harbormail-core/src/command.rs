//! The command endpoint: a closed set of client commands, parsed and
//! validated up front, dispatched by a single match

use std::collections::HashMap;

use base64::Engine;
use chrono::Utc;
use harbormail_imap::{AttachmentMeta, CanonicalFolder, EmailAddress, MessageSummary};
use harbormail_smtp::{OutgoingMessage, SmtpClient};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::debug;

use crate::reconcile::reconcile;
use crate::validation::{
    is_valid_email, MAX_FILENAME_LENGTH, MAX_FOLDER_NAME_LENGTH, MAX_SUBJECT_LENGTH,
};
use crate::{CoreError, CoreResult, Database, MailboxSession, ProviderRegistry};

/// Messages fetched when the client does not ask for a count
pub const DEFAULT_FETCH_LIMIT: u32 = 10;

/// One decoded attachment from the compose form
#[derive(Debug, Clone, PartialEq)]
pub struct FormAttachment {
    pub filename: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

/// Validated compose fields shared by drafts and outgoing mail
#[derive(Debug, Clone, PartialEq)]
pub struct DraftFields {
    pub recipient: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<FormAttachment>,
}

impl DraftFields {
    fn from_form(fields: &HashMap<String, String>) -> CoreResult<Self> {
        let recipient = required(fields, "recipient")?;
        if !is_valid_email(recipient) {
            return Err(CoreError::InvalidRequest(format!(
                "Invalid recipient address: {}",
                recipient
            )));
        }

        let subject = fields.get("subject").cloned().unwrap_or_default();
        if subject.len() > MAX_SUBJECT_LENGTH {
            return Err(CoreError::InvalidRequest(format!(
                "Subject is longer than {} characters",
                MAX_SUBJECT_LENGTH
            )));
        }

        let body = fields.get("body").cloned().unwrap_or_default();

        let attachments = match fields.get("attachments").filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => parse_attachments(raw)?,
            None => Vec::new(),
        };

        Ok(Self {
            recipient: recipient.to_string(),
            subject,
            body,
            attachments,
        })
    }

    /// Compose the outbound message for these fields
    pub fn to_outgoing(&self, from: &str) -> OutgoingMessage {
        let mut message = OutgoingMessage::new(from, self.subject.clone())
            .to(self.recipient.clone())
            .text(self.body.clone());
        for attachment in &self.attachments {
            message = message.attachment(
                attachment.filename.clone(),
                attachment.mime_type.clone(),
                attachment.data.clone(),
            );
        }
        message
    }

    /// Summary used to mirror a stored draft into the cache
    fn to_summary(&self, uid: u32, from: &str) -> MessageSummary {
        MessageSummary {
            uid,
            date: Some(Utc::now().fixed_offset()),
            from: vec![EmailAddress::new(None, from.to_string())],
            to: vec![EmailAddress::new(None, self.recipient.clone())],
            subject: Some(self.subject.clone()),
            text: Some(self.body.clone()),
            attachments: self
                .attachments
                .iter()
                .map(|a| AttachmentMeta {
                    filename: a.filename.clone(),
                    mime_type: a.mime_type.clone(),
                })
                .collect(),
        }
    }
}

/// The full set of commands the endpoint accepts.
///
/// Adding a variant forces every dispatch arm to be written out, so
/// the command set stays exhaustively checked.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// List folders and the newest messages of one folder
    GetFoldersAndMessages { folder: CanonicalFolder, limit: u32 },
    /// Create a folder on the server, then record it locally
    CreateFolder { name: String },
    /// Move a message between folders
    MoveTo {
        uid: u32,
        from: CanonicalFolder,
        to: CanonicalFolder,
    },
    /// Store a composed message in drafts
    SaveDraft { draft: DraftFields },
    /// Send a composed message over SMTP
    SendEmail { draft: DraftFields },
    /// Permanently delete a message
    Delete { uid: u32, folder: CanonicalFolder },
    /// Move a message to the bin
    SendToBin { uid: u32, folder: CanonicalFolder },
}

impl Command {
    /// Parse and validate one form submission. `default_limit` is used
    /// when `get_folders_and_n_messages` arrives without an `n` field.
    pub fn from_form(fields: &HashMap<String, String>, default_limit: u32) -> CoreResult<Self> {
        match required(fields, "command")? {
            "get_folders_and_n_messages" => {
                let folder = folder_field(fields, "folder")?;
                let limit = match fields.get("n").map(String::as_str).filter(|n| !n.is_empty()) {
                    Some(raw) => raw.parse::<u32>().map_err(|_| {
                        CoreError::InvalidRequest(format!("Invalid message count: {}", raw))
                    })?,
                    None => default_limit,
                };
                Ok(Command::GetFoldersAndMessages { folder, limit })
            }
            "create_folder" => {
                let name = required(fields, "new_folder")?;
                if name.len() > MAX_FOLDER_NAME_LENGTH {
                    return Err(CoreError::InvalidRequest(format!(
                        "Folder name is longer than {} characters",
                        MAX_FOLDER_NAME_LENGTH
                    )));
                }
                Ok(Command::CreateFolder {
                    name: name.to_string(),
                })
            }
            "move_to" => Ok(Command::MoveTo {
                uid: uid_field(fields)?,
                from: folder_field(fields, "folder")?,
                to: folder_field(fields, "new_folder")?,
            }),
            "save_draft" => Ok(Command::SaveDraft {
                draft: DraftFields::from_form(fields)?,
            }),
            "send_email" => Ok(Command::SendEmail {
                draft: DraftFields::from_form(fields)?,
            }),
            "delete" => Ok(Command::Delete {
                uid: uid_field(fields)?,
                folder: folder_field(fields, "folder")?,
            }),
            "send_to_bin" => Ok(Command::SendToBin {
                uid: uid_field(fields)?,
                folder: folder_field(fields, "folder")?,
            }),
            other => Err(CoreError::InvalidRequest(format!(
                "Unknown command: {}",
                other
            ))),
        }
    }
}

fn required<'a>(fields: &'a HashMap<String, String>, name: &str) -> CoreResult<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| CoreError::InvalidRequest(format!("Missing field: {}", name)))
}

fn uid_field(fields: &HashMap<String, String>) -> CoreResult<u32> {
    let raw = required(fields, "uid")?;
    raw.parse::<u32>()
        .map_err(|_| CoreError::InvalidRequest(format!("Invalid uid: {}", raw)))
}

fn folder_field(fields: &HashMap<String, String>, name: &str) -> CoreResult<CanonicalFolder> {
    Ok(CanonicalFolder::from_key(required(fields, name)?))
}

/// Decode the `attachments` form field: a JSON array of objects with
/// `filename`, optional `mime_type` and base64 `data`
fn parse_attachments(raw: &str) -> CoreResult<Vec<FormAttachment>> {
    #[derive(Deserialize)]
    struct RawAttachment {
        filename: String,
        #[serde(default)]
        mime_type: Option<String>,
        data: String,
    }

    let entries: Vec<RawAttachment> = serde_json::from_str(raw)
        .map_err(|_| CoreError::InvalidRequest("Malformed attachments field".to_string()))?;

    let mut attachments = Vec::with_capacity(entries.len());
    for entry in entries {
        if entry.filename.is_empty() || entry.filename.len() > MAX_FILENAME_LENGTH {
            return Err(CoreError::InvalidRequest(format!(
                "Invalid attachment filename: {}",
                entry.filename
            )));
        }
        let data = base64::engine::general_purpose::STANDARD
            .decode(entry.data.as_bytes())
            .map_err(|_| {
                CoreError::InvalidRequest(format!(
                    "Attachment {} is not valid base64",
                    entry.filename
                ))
            })?;
        attachments.push(FormAttachment {
            filename: entry.filename,
            mime_type: entry
                .mime_type
                .unwrap_or_else(|| "application/octet-stream".to_string()),
            data,
        });
    }
    Ok(attachments)
}

/// JSON envelope returned for every command
#[derive(Debug, Clone, Serialize)]
pub struct CommandResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Everything a command needs besides its own fields
pub struct CommandContext<'a> {
    pub registry: &'a ProviderRegistry,
    pub database: &'a Database,
    /// Account address from the login session
    pub email: &'a str,
    /// Account password from the login session
    pub password: &'a str,
}

/// Run one command and fold any failure into the response envelope.
///
/// Errors never escape to the HTTP layer: the endpoint always answers
/// with `success: false` and the error text instead of a status code.
pub async fn execute(ctx: &CommandContext<'_>, command: Command) -> CommandResponse {
    match run(ctx, command).await {
        Ok(data) => CommandResponse::ok(data),
        Err(e) => {
            debug!("Command failed: {}", e);
            CommandResponse::err(e.to_string())
        }
    }
}

async fn run(ctx: &CommandContext<'_>, command: Command) -> CoreResult<Value> {
    match command {
        // Sending goes straight out over SMTP
        Command::SendEmail { draft } => send_email(ctx, draft).await,
        // Everything else runs over one IMAP session, opened and
        // closed within this request
        other => {
            let mut session = MailboxSession::login(ctx.registry, ctx.email, ctx.password).await?;
            let result = dispatch(ctx, &mut session, other).await;
            if let Err(e) = session.logout().await {
                debug!("Logout after command failed: {}", e);
            }
            result
        }
    }
}

async fn dispatch(
    ctx: &CommandContext<'_>,
    session: &mut MailboxSession,
    command: Command,
) -> CoreResult<Value> {
    match command {
        Command::GetFoldersAndMessages { folder, limit } => {
            get_folders_and_messages(ctx, session, folder, limit).await
        }
        Command::CreateFolder { name } => create_folder(ctx, session, name).await,
        Command::MoveTo { uid, from, to } => move_to(ctx, session, uid, from, to).await,
        Command::SaveDraft { draft } => save_draft(ctx, session, draft).await,
        Command::Delete { uid, folder } => delete(ctx, session, uid, folder).await,
        Command::SendToBin { uid, folder } => {
            move_to(ctx, session, uid, folder, CanonicalFolder::Bin).await
        }
        Command::SendEmail { .. } => unreachable!(),
    }
}

async fn get_folders_and_messages(
    ctx: &CommandContext<'_>,
    session: &mut MailboxSession,
    folder: CanonicalFolder,
    limit: u32,
) -> CoreResult<Value> {
    let folders = session.list_canonical_folders().await?;
    let summaries = session.fetch_recent(&folder, limit).await?;

    let user_id = ctx.database.ensure_user(ctx.email).await?;
    let discovered: Vec<String> = folders
        .iter()
        .filter_map(|f| match f {
            CanonicalFolder::User(name) => Some(name.clone()),
            _ => None,
        })
        .collect();
    reconcile(ctx.database, user_id, &folder, &discovered, &summaries).await?;

    Ok(json!({
        "folders": folders.iter().map(|f| f.key()).collect::<Vec<_>>(),
        "messages": summaries.iter().map(summary_json).collect::<Vec<_>>(),
    }))
}

async fn create_folder(
    ctx: &CommandContext<'_>,
    session: &mut MailboxSession,
    name: String,
) -> CoreResult<Value> {
    // Server first. If the server rejects the name there is no local
    // insert; the cache only ever lists folders the server accepted.
    // The reverse failure (row insert after a server success) is
    // reported without undoing the server-side create.
    session.create_folder(&name).await?;

    let user_id = ctx.database.ensure_user(ctx.email).await?;
    ctx.database.insert_folder(user_id, &name).await?;

    Ok(json!({ "folder": name }))
}

async fn move_to(
    ctx: &CommandContext<'_>,
    session: &mut MailboxSession,
    uid: u32,
    from: CanonicalFolder,
    to: CanonicalFolder,
) -> CoreResult<Value> {
    session.move_message(uid, &from, &to).await?;

    let user_id = ctx.database.ensure_user(ctx.email).await?;
    ctx.database.move_cached_email(user_id, uid, to.key()).await?;

    Ok(json!({ "uid": uid, "folder": to.key() }))
}

async fn save_draft(
    ctx: &CommandContext<'_>,
    session: &mut MailboxSession,
    draft: DraftFields,
) -> CoreResult<Value> {
    let message = draft.to_outgoing(session.email());
    let uid = session.append_draft(message).await?;

    // Without a UID there is no cache key, so the mirror is skipped
    if let Some(uid) = uid {
        let user_id = ctx.database.ensure_user(ctx.email).await?;
        let summary = draft.to_summary(uid, ctx.email);
        reconcile(ctx.database, user_id, &CanonicalFolder::Drafts, &[], &[summary]).await?;
    }

    Ok(json!({ "uid": uid }))
}

async fn delete(
    ctx: &CommandContext<'_>,
    session: &mut MailboxSession,
    uid: u32,
    folder: CanonicalFolder,
) -> CoreResult<Value> {
    session.delete_message(uid, &folder).await?;

    let user_id = ctx.database.ensure_user(ctx.email).await?;
    ctx.database.delete_cached_email(user_id, uid).await?;

    Ok(json!({ "uid": uid }))
}

async fn send_email(ctx: &CommandContext<'_>, draft: DraftFields) -> CoreResult<Value> {
    let provider = ctx.registry.for_address(ctx.email)?;
    let client = SmtpClient::new(provider.smtp_host, provider.smtp_port, provider.smtp_tls);

    let message = draft.to_outgoing(ctx.email);
    client.send_password(ctx.email, ctx.password, message).await?;

    Ok(json!({ "recipient": draft.recipient }))
}

fn summary_json(summary: &MessageSummary) -> Value {
    json!({
        "uid": summary.uid,
        "date": summary.date.map(|d| d.to_rfc3339()),
        "from": summary.from_display(),
        "to": summary.to_display(),
        "subject": summary.subject_display(),
        "body": summary.text,
        "attachments": summary
            .attachments
            .iter()
            .map(|a| json!({ "filename": a.filename, "mime_type": a.mime_type }))
            .collect::<Vec<_>>(),
    })
}
