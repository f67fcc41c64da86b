//! Runtime configuration, parsed once in `main` and passed around by
//! value. Nothing in here is read from global state after startup.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use harbormail_core::DEFAULT_FETCH_LIMIT;

#[derive(Parser, Debug, Clone)]
#[command(name = "harbormail", version, about = "Web mail client backend")]
pub struct AppConfig {
    /// Address the HTTP server binds to
    #[arg(long, env = "HARBORMAIL_HOST", default_value = "127.0.0.1")]
    pub host: String,

    /// Port the HTTP server binds to
    #[arg(long, env = "HARBORMAIL_PORT", default_value_t = 8080)]
    pub port: u16,

    /// Path of the SQLite cache database
    #[arg(long, env = "HARBORMAIL_DATABASE", default_value = "harbormail.db")]
    pub database: PathBuf,

    /// Minutes of inactivity before a login session expires
    #[arg(long, env = "HARBORMAIL_SESSION_TIMEOUT", default_value_t = 20)]
    pub session_timeout_minutes: u64,

    /// Messages fetched when the client does not ask for a count
    #[arg(long, env = "HARBORMAIL_FETCH_LIMIT", default_value_t = DEFAULT_FETCH_LIMIT)]
    pub fetch_limit: u32,
}

impl AppConfig {
    pub fn session_timeout(&self) -> Duration {
        Duration::from_secs(self.session_timeout_minutes * 60)
    }
}
