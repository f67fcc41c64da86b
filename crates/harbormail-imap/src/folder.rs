//! Canonical folder vocabulary and server folder mapping

use std::collections::BTreeMap;
use std::fmt;

use tracing::warn;

use crate::{ImapError, ImapResult};

/// The four folder keys every mailbox exposes to the client.
pub const DEFAULT_FOLDER_KEYS: [&str; 4] = ["inbox", "sent", "drafts", "bin"];

/// Client-side folder identifier, independent of provider naming.
///
/// The `Ord` derive keeps the defaults ahead of user folders when
/// mappings are iterated, with user folders in name order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CanonicalFolder {
    /// Incoming mail
    Inbox,
    /// Sent messages
    Sent,
    /// Draft messages
    Drafts,
    /// Deleted messages
    Bin,
    /// User-created folder, addressed by its server name
    User(String),
}

impl CanonicalFolder {
    /// Parse a client-supplied folder key. The four default keys are
    /// matched exactly; anything else addresses a user folder by name.
    pub fn from_key(key: &str) -> Self {
        match key {
            "inbox" => CanonicalFolder::Inbox,
            "sent" => CanonicalFolder::Sent,
            "drafts" => CanonicalFolder::Drafts,
            "bin" => CanonicalFolder::Bin,
            other => CanonicalFolder::User(other.to_string()),
        }
    }

    /// The key used in client requests and responses
    pub fn key(&self) -> &str {
        match self {
            CanonicalFolder::Inbox => "inbox",
            CanonicalFolder::Sent => "sent",
            CanonicalFolder::Drafts => "drafts",
            CanonicalFolder::Bin => "bin",
            CanonicalFolder::User(name) => name,
        }
    }

    /// Whether this is one of the four default folders
    pub fn is_default(&self) -> bool {
        !matches!(self, CanonicalFolder::User(_))
    }
}

impl fmt::Display for CanonicalFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// A folder as reported by the server's LIST response
#[derive(Debug, Clone)]
pub struct ServerFolder {
    /// Full folder path, e.g. "[Gmail]/Sent Mail"
    pub name: String,
    /// LIST attributes, e.g. "\\Sent", "\\HasNoChildren"
    pub attributes: Vec<String>,
}

impl ServerFolder {
    /// Create a folder entry from a LIST response line
    pub fn new(name: impl Into<String>, attributes: Vec<String>) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }

    /// Check for an attribute, ignoring case and the leading backslash
    /// (some servers send "Trash" instead of "\Trash")
    pub fn has_attribute(&self, wanted: &str) -> bool {
        let wanted = wanted.trim_start_matches('\\');
        self.attributes
            .iter()
            .any(|attr| attr.trim_start_matches('\\').eq_ignore_ascii_case(wanted))
    }
}

/// How a provider arranges its special folders
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FolderLayout {
    /// Special folders sit under a marker path and are recognized by
    /// their special-use attributes; the inbox is literally `INBOX`.
    /// Special-path folders without a recognized attribute (All Mail,
    /// Starred, the bare container) are not exposed at all.
    FlagClassified {
        /// Path fragment marking the special folder subtree
        special_path: &'static str,
    },
    /// The four defaults carry fixed server names and are mapped
    /// unconditionally; `hidden` names are system folders the client
    /// never sees; everything else is a user folder.
    FixedNames {
        inbox: &'static str,
        sent: &'static str,
        drafts: &'static str,
        bin: &'static str,
        hidden: &'static [&'static str],
    },
}

/// Mapping between canonical folder keys and server folder names.
///
/// Built from a live LIST response at the start of every server
/// operation and dropped when the operation ends. Another client can
/// rename or create folders mid-session, so the mapping is never
/// cached across operations or persisted.
#[derive(Debug, Clone, Default)]
pub struct FolderMapping {
    entries: BTreeMap<CanonicalFolder, String>,
}

impl FolderMapping {
    /// Build the mapping for one provider layout from a folder listing
    pub fn build(layout: &FolderLayout, folders: &[ServerFolder]) -> Self {
        let mut mapping = FolderMapping::default();

        match layout {
            FolderLayout::FlagClassified { special_path } => {
                for folder in folders {
                    if folder.name == "INBOX" {
                        mapping.insert(CanonicalFolder::Inbox, &folder.name);
                    } else if folder.name.contains(special_path) {
                        if folder.has_attribute("\\Sent") {
                            mapping.insert(CanonicalFolder::Sent, &folder.name);
                        } else if folder.has_attribute("\\Drafts") {
                            mapping.insert(CanonicalFolder::Drafts, &folder.name);
                        } else if folder.has_attribute("\\Trash") {
                            mapping.insert(CanonicalFolder::Bin, &folder.name);
                        }
                    } else {
                        mapping.insert_user(&folder.name);
                    }
                }
            }
            FolderLayout::FixedNames {
                inbox,
                sent,
                drafts,
                bin,
                hidden,
            } => {
                mapping.insert(CanonicalFolder::Inbox, inbox);
                mapping.insert(CanonicalFolder::Sent, sent);
                mapping.insert(CanonicalFolder::Drafts, drafts);
                mapping.insert(CanonicalFolder::Bin, bin);

                for folder in folders {
                    let system = folder.name == *inbox
                        || folder.name == *sent
                        || folder.name == *drafts
                        || folder.name == *bin
                        || hidden.contains(&folder.name.as_str());
                    if !system {
                        mapping.insert_user(&folder.name);
                    }
                }
            }
        }

        mapping
    }

    fn insert(&mut self, canonical: CanonicalFolder, server_name: &str) {
        self.entries.insert(canonical, server_name.to_string());
    }

    /// User folders map identity-to-identity. A server folder named
    /// exactly like a default key would shadow that default, so the
    /// binding is ambiguous and the folder is left out of the mapping.
    fn insert_user(&mut self, server_name: &str) {
        if DEFAULT_FOLDER_KEYS.contains(&server_name) {
            warn!(
                "ignoring server folder {:?}: name collides with a default folder key",
                server_name
            );
            return;
        }
        self.entries.insert(
            CanonicalFolder::User(server_name.to_string()),
            server_name.to_string(),
        );
    }

    /// Resolve a canonical folder to its server name
    pub fn server_name(&self, folder: &CanonicalFolder) -> ImapResult<&str> {
        self.entries
            .get(folder)
            .map(String::as_str)
            .ok_or_else(|| ImapError::FolderNotFound(folder.key().to_string()))
    }

    /// Whether a canonical folder is present in the mapping
    pub fn contains(&self, folder: &CanonicalFolder) -> bool {
        self.entries.contains_key(folder)
    }

    /// All canonical folders, defaults first, then user folders in name order
    pub fn canonical_folders(&self) -> impl Iterator<Item = &CanonicalFolder> {
        self.entries.keys()
    }

    /// Names of the user-created folders in the mapping
    pub fn user_folders(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().filter_map(|key| match key {
            CanonicalFolder::User(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Number of mapped folders
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the mapping holds no folders at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
