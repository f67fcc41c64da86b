//! One-shot IMAP connections

use async_imap::types::NameAttribute;
use async_imap::Session;
use async_native_tls::TlsStream;
use futures::TryStreamExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::folder::ServerFolder;
use crate::message::MessageSummary;
use crate::{ImapError, ImapResult};

type Secured = TlsStream<TcpStream>;

/// FETCH query for folder windows: envelope plus the full body so the
/// text part and attachment list can be extracted locally
const SUMMARY_FETCH_QUERY: &str = "(UID ENVELOPE INTERNALDATE BODY.PEEK[])";

fn server_err(e: impl ToString) -> ImapError {
    ImapError::Server(e.to_string())
}

/// IMAP client holding one authenticated connection.
///
/// Callers open a connection, run the operations for a single client
/// request and log out; the connection is never shared or kept around.
pub struct ImapClient {
    host: String,
    port: u16,
    session: Option<Session<Secured>>,
}

impl ImapClient {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            session: None,
        }
    }

    async fn secure_stream(&self) -> ImapResult<Secured> {
        info!("Opening TLS connection to {}:{}", self.host, self.port);

        let socket = TcpStream::connect((self.host.as_str(), self.port))
            .await
            .map_err(|e| ImapError::Connect(e.to_string()))?;

        async_native_tls::TlsConnector::new()
            .connect(&self.host, socket)
            .await
            .map_err(|e| ImapError::Tls(e.to_string()))
    }

    /// Connect and authenticate with LOGIN (username/password)
    pub async fn authenticate_login(&mut self, username: &str, password: &str) -> ImapResult<()> {
        let stream = self.secure_stream().await?;

        let session = async_imap::Client::new(stream)
            .login(username, password)
            .await
            .map_err(|(e, _)| ImapError::Login(e.to_string()))?;

        debug!("Logged in as {}", username);
        self.session = Some(session);
        Ok(())
    }

    fn active(&mut self) -> ImapResult<&mut Session<Secured>> {
        self.session.as_mut().ok_or(ImapError::NotConnected)
    }

    /// List every folder the server reports, with LIST attributes
    pub async fn list_folders(&mut self) -> ImapResult<Vec<ServerFolder>> {
        let session = self.active()?;

        let names = session
            .list(None, Some("*"))
            .await
            .map_err(server_err)?
            .try_collect::<Vec<_>>()
            .await
            .map_err(server_err)?;

        let folders: Vec<ServerFolder> = names
            .iter()
            .map(|n| {
                let attributes = n.attributes().iter().map(attribute_text).collect();
                ServerFolder::new(n.name(), attributes)
            })
            .collect();

        debug!("Server listed {} folders", folders.len());
        Ok(folders)
    }

    /// Select a folder, returning the number of messages it holds
    pub async fn select_folder(&mut self, server_name: &str) -> ImapResult<u32> {
        let selected = self
            .active()?
            .select(server_name)
            .await
            .map_err(|e| ImapError::FolderNotFound(format!("{}: {}", server_name, e)))?;

        debug!("{} holds {} messages", server_name, selected.exists);
        Ok(selected.exists)
    }

    /// Create a folder on the server
    pub async fn create_folder(&mut self, server_name: &str) -> ImapResult<()> {
        self.active()?
            .create(server_name)
            .await
            .map_err(|e| ImapError::CreateRejected {
                name: server_name.to_string(),
                reason: e.to_string(),
            })?;

        info!("Created folder {}", server_name);
        Ok(())
    }

    /// Fetch up to `limit` of the most recent messages in a folder,
    /// newest first. Each call re-queries the server; no cursor is
    /// kept between calls.
    pub async fn fetch_last(
        &mut self,
        server_name: &str,
        limit: u32,
    ) -> ImapResult<Vec<MessageSummary>> {
        let total = self.select_folder(server_name).await?;
        if total == 0 || limit == 0 {
            return Ok(Vec::new());
        }

        // Window over the highest sequence numbers
        let first = total.saturating_sub(limit - 1).max(1);
        let window = format!("{}:{}", first, total);

        let session = self.active()?;
        let mut stream = session
            .fetch(&window, SUMMARY_FETCH_QUERY)
            .await
            .map_err(server_err)?;

        let mut summaries = Vec::new();
        while let Some(fetch) = stream
            .try_next()
            .await
            .map_err(|e| ImapError::BadResponse(e.to_string()))?
        {
            summaries.push(MessageSummary::from_fetch(&fetch)?);
        }

        summaries.sort_by(|a, b| b.uid.cmp(&a.uid));
        debug!("Fetched {} messages from {}", summaries.len(), server_name);
        Ok(summaries)
    }

    /// Move a message out of the currently selected folder
    pub async fn move_message(&mut self, uid: u32, destination: &str) -> ImapResult<()> {
        self.active()?
            .uid_copy(uid.to_string(), destination)
            .await
            .map_err(server_err)?;

        // The copy succeeded; clear the original
        self.flag_deleted(uid).await?;
        self.expunge().await
    }

    /// Permanently remove a message from the currently selected folder
    pub async fn delete_message(&mut self, uid: u32) -> ImapResult<()> {
        self.flag_deleted(uid).await?;
        self.expunge().await
    }

    /// Append a raw message to a folder. `flags` uses the IMAP flag
    /// list syntax, e.g. `(\Draft)`. The server assigns a UID but this
    /// call does not report it back.
    pub async fn append(
        &mut self,
        server_name: &str,
        flags: Option<&str>,
        content: &[u8],
    ) -> ImapResult<()> {
        self.active()?
            .append(server_name, flags, None, content)
            .await
            .map_err(server_err)?;

        debug!("Appended {} bytes to {}", content.len(), server_name);
        Ok(())
    }

    /// Search the currently selected folder, returning matching UIDs
    /// in ascending order
    pub async fn uid_search(&mut self, query: &str) -> ImapResult<Vec<u32>> {
        let matches = self
            .active()?
            .uid_search(query)
            .await
            .map_err(server_err)?;

        let mut uids: Vec<u32> = matches.into_iter().collect();
        uids.sort_unstable();
        Ok(uids)
    }

    async fn flag_deleted(&mut self, uid: u32) -> ImapResult<()> {
        self.active()?
            .uid_store(uid.to_string(), "+FLAGS (\\Deleted)")
            .await
            .map_err(server_err)?
            .try_collect::<Vec<_>>()
            .await
            .map_err(server_err)?;
        Ok(())
    }

    async fn expunge(&mut self) -> ImapResult<()> {
        self.active()?
            .expunge()
            .await
            .map_err(server_err)?
            .try_collect::<Vec<_>>()
            .await
            .map_err(server_err)?;
        Ok(())
    }

    /// Say goodbye and drop the connection. Safe to call twice; the
    /// second call is a no-op.
    pub async fn logout(&mut self) -> ImapResult<()> {
        if let Some(mut session) = self.session.take() {
            session.logout().await.map_err(server_err)?;
            debug!("Logged out from {}", self.host);
        }
        Ok(())
    }
}

fn attribute_text(attr: &NameAttribute) -> String {
    match attr {
        NameAttribute::Extension(s) => s.to_string(),
        known => format!("\\{:?}", known),
    }
}
