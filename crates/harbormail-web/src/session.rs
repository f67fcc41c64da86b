//! Server-side login sessions.
//!
//! A session holds the plaintext credentials that every request replays
//! against the provider. Sessions live in memory only, expire after a
//! sliding inactivity window, and are dropped lazily on access.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UserSession {
    pub email: String,
    pub password: String,
    last_seen: Instant,
}

/// In-memory session store keyed by opaque cookie tokens.
#[derive(Debug, Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, UserSession>>>,
    timeout: Duration,
}

impl SessionStore {
    pub fn new(timeout: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            timeout,
        }
    }

    /// Start a session and hand back its token.
    pub async fn create(&self, email: String, password: String) -> String {
        let token = Uuid::new_v4().simple().to_string();
        let mut sessions = self.sessions.write().await;
        info!("Opened session for {}", email);
        sessions.insert(
            token.clone(),
            UserSession {
                email,
                password,
                last_seen: Instant::now(),
            },
        );
        token
    }

    /// Look up a live session and slide its inactivity window.
    ///
    /// An entry past the timeout is removed here and reported as absent,
    /// so an idle user has to log in again.
    pub async fn resolve(&self, token: &str) -> Option<UserSession> {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.get_mut(token) {
            if session.last_seen.elapsed() <= self.timeout {
                session.last_seen = Instant::now();
                return Some(session.clone());
            }
        }
        if let Some(expired) = sessions.remove(token) {
            debug!("Session for {} timed out", expired.email);
        }
        None
    }

    /// Drop a session. Unknown tokens are ignored.
    pub async fn remove(&self, token: &str) {
        let mut sessions = self.sessions.write().await;
        if let Some(session) = sessions.remove(token) {
            info!("Closed session for {}", session.email);
        }
    }
}
