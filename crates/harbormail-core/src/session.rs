//! One authenticated mailbox connection serving a single request

use harbormail_imap::{CanonicalFolder, FolderMapping, ImapClient, MessageSummary};
use harbormail_smtp::OutgoingMessage;
use tracing::{debug, info};
use uuid::Uuid;

use crate::provider::{Provider, ProviderRegistry};
use crate::CoreResult;

/// An authenticated IMAP connection scoped to one client request.
///
/// Opened with `login`, used for one command, then closed with
/// `logout`. Sessions are never pooled or shared across requests, so
/// concurrent requests cannot race on connection state.
pub struct MailboxSession {
    client: ImapClient,
    provider: Provider,
    email: String,
}

impl MailboxSession {
    /// Resolve the provider for `email` and authenticate against its
    /// IMAP server. Credential validity is exactly "the LOGIN
    /// handshake succeeded".
    pub async fn login(
        registry: &ProviderRegistry,
        email: &str,
        password: &str,
    ) -> CoreResult<Self> {
        let provider = registry.for_address(email)?.clone();

        let mut client = ImapClient::new(provider.imap_host, provider.imap_port);
        client.authenticate_login(email, password).await?;

        info!("Mailbox session opened for {}", email);
        Ok(Self {
            client,
            provider,
            email: email.to_string(),
        })
    }

    /// Address the session was opened for
    pub fn email(&self) -> &str {
        &self.email
    }

    /// Provider preset backing this session
    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Build a fresh folder mapping from a live LIST. Another client
    /// can create or rename folders at any moment, so every operation
    /// starts from a new listing instead of a cached one.
    async fn mapping(&mut self) -> CoreResult<FolderMapping> {
        let listing = self.client.list_folders().await?;
        Ok(FolderMapping::build(&self.provider.folder_layout, &listing))
    }

    /// All canonical folders currently on the server, defaults first
    pub async fn list_canonical_folders(&mut self) -> CoreResult<Vec<CanonicalFolder>> {
        let mapping = self.mapping().await?;
        Ok(mapping.canonical_folders().cloned().collect())
    }

    /// Names of the user folders currently on the server
    pub async fn user_folder_names(&mut self) -> CoreResult<Vec<String>> {
        let mapping = self.mapping().await?;
        Ok(mapping.user_folders().map(str::to_string).collect())
    }

    /// Create a folder on the server. The name is used as-is; the
    /// server rejects duplicates.
    pub async fn create_folder(&mut self, name: &str) -> CoreResult<()> {
        self.client.create_folder(name).await?;
        Ok(())
    }

    /// Up to `limit` newest messages in a canonical folder
    pub async fn fetch_recent(
        &mut self,
        folder: &CanonicalFolder,
        limit: u32,
    ) -> CoreResult<Vec<MessageSummary>> {
        let mapping = self.mapping().await?;
        let server_name = mapping.server_name(folder)?.to_string();
        Ok(self.client.fetch_last(&server_name, limit).await?)
    }

    /// Move a message between canonical folders
    pub async fn move_message(
        &mut self,
        uid: u32,
        from: &CanonicalFolder,
        to: &CanonicalFolder,
    ) -> CoreResult<()> {
        let mapping = self.mapping().await?;
        let source = mapping.server_name(from)?.to_string();
        let dest = mapping.server_name(to)?.to_string();

        self.client.select_folder(&source).await?;
        self.client.move_message(uid, &dest).await?;
        Ok(())
    }

    /// Permanently remove a message from a canonical folder
    pub async fn delete_message(
        &mut self,
        uid: u32,
        folder: &CanonicalFolder,
    ) -> CoreResult<()> {
        let mapping = self.mapping().await?;
        let server_name = mapping.server_name(folder)?.to_string();

        self.client.select_folder(&server_name).await?;
        self.client.delete_message(uid).await?;
        Ok(())
    }

    /// Store a composed message in the drafts folder, flagged `\Draft`.
    ///
    /// APPEND does not report the assigned UID, so the message gets a
    /// generated Message-ID and is searched for right afterwards. When
    /// that search fails or comes back empty the draft is still
    /// stored; the caller just receives no UID.
    pub async fn append_draft(&mut self, mut message: OutgoingMessage) -> CoreResult<Option<u32>> {
        let mapping = self.mapping().await?;
        let drafts = mapping.server_name(&CanonicalFolder::Drafts)?.to_string();

        let message_id = match message.message_id.clone() {
            Some(id) => id,
            None => {
                let id = generate_message_id(&self.email);
                message = message.message_id(id.clone());
                id
            }
        };

        let raw = message.formatted()?;
        self.client.append(&drafts, Some("(\\Draft)"), &raw).await?;

        match self.find_uid_by_message_id(&drafts, &message_id).await {
            Ok(uid) => Ok(uid),
            Err(e) => {
                debug!("Draft stored but UID lookup failed: {}", e);
                Ok(None)
            }
        }
    }

    async fn find_uid_by_message_id(
        &mut self,
        server_name: &str,
        message_id: &str,
    ) -> CoreResult<Option<u32>> {
        self.client.select_folder(server_name).await?;
        let query = format!("HEADER Message-ID \"{}\"", message_id);
        let uids = self.client.uid_search(&query).await?;
        Ok(uids.last().copied())
    }

    /// Log out and drop the connection
    pub async fn logout(mut self) -> CoreResult<()> {
        self.client.logout().await?;
        Ok(())
    }
}

/// Message-ID in the account's own domain, unique per draft
fn generate_message_id(email: &str) -> String {
    let domain = email.rsplit_once('@').map(|(_, d)| d).unwrap_or("localhost");
    format!("<{}@{}>", Uuid::new_v4(), domain)
}
