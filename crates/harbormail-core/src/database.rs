//! SQLite-backed cache of fetched mail

use crate::{CoreError, CoreResult};
use sqlx::{sqlite::SqlitePoolOptions, Pool, Row, Sqlite};
use std::path::Path;
use tracing::{debug, info};

/// Cached email row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbEmail {
    pub id: i64,
    pub user_id: i64,
    /// Canonical folder key the message belongs to
    pub folder: String,
    /// Server-assigned UID at fetch time
    pub uid: i64,
    /// Unix timestamp for date sorting
    pub date_epoch: Option<i64>,
    pub from_address: Option<String>,
    pub to_addresses: Option<String>,
    pub subject: Option<String>,
    pub body_text: Option<String>,
}

/// Cached attachment metadata row
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DbAttachment {
    pub id: i64,
    pub email_id: i64,
    pub filename: String,
    pub mime_type: Option<String>,
}

/// Database connection pool
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open or create a database file at the given path
    pub async fn open(path: impl AsRef<Path>) -> CoreResult<Self> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| CoreError::Persistence(e.to_string()))?;
        }

        info!("Opening cache database at {}", path.display());
        Self::connect(&format!("sqlite:{}?mode=rwc", path.display()), 5).await
    }

    /// In-memory database, used by tests
    pub async fn open_memory() -> CoreResult<Self> {
        // One connection only: each sqlite :memory: connection is its
        // own separate database
        Self::connect("sqlite::memory:", 1).await
    }

    async fn connect(url: &str, max_connections: u32) -> CoreResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Initialize the database schema
    async fn initialize(&self) -> CoreResult<()> {
        debug!("Initializing cache schema");

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                created_at TEXT DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS folders (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                name TEXT NOT NULL CHECK (length(name) <= 64),
                created_at TEXT DEFAULT (datetime('now')),
                UNIQUE(user_id, name)
            );

            CREATE TABLE IF NOT EXISTS emails (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
                folder TEXT NOT NULL,
                uid INTEGER NOT NULL,
                date_epoch INTEGER,
                from_address TEXT,
                to_addresses TEXT,
                subject TEXT,
                body_text TEXT,
                created_at TEXT DEFAULT (datetime('now')),
                UNIQUE(user_id, uid)
            );

            CREATE TABLE IF NOT EXISTS attachments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email_id INTEGER NOT NULL REFERENCES emails(id) ON DELETE CASCADE,
                filename TEXT NOT NULL CHECK (length(filename) <= 255),
                mime_type TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_folders_user ON folders(user_id);
            CREATE INDEX IF NOT EXISTS idx_emails_user ON emails(user_id);
            CREATE INDEX IF NOT EXISTS idx_emails_date ON emails(date_epoch DESC);
            CREATE INDEX IF NOT EXISTS idx_attachments_email ON attachments(email_id);
            "#,
        )
        .execute(&self.pool)
        .await?;

        debug!("Cache schema ready");
        Ok(())
    }

    pub(crate) fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Find or create the user row for an address, returning its id
    pub async fn ensure_user(&self, email: &str) -> CoreResult<i64> {
        sqlx::query("INSERT INTO users (email) VALUES (?) ON CONFLICT(email) DO NOTHING")
            .bind(email)
            .execute(&self.pool)
            .await?;

        let row = sqlx::query("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("id"))
    }

    /// Record a user folder. Duplicate and over-long names are
    /// rejected by the schema constraints.
    pub async fn insert_folder(&self, user_id: i64, name: &str) -> CoreResult<()> {
        sqlx::query("INSERT INTO folders (user_id, name) VALUES (?, ?)")
            .bind(user_id)
            .bind(name)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Names of the user folders recorded for a user
    pub async fn user_folders(&self, user_id: i64) -> CoreResult<Vec<String>> {
        let rows = sqlx::query("SELECT name FROM folders WHERE user_id = ? ORDER BY name")
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(|r| r.get::<String, _>("name")).collect())
    }

    /// Cached emails for one folder, newest first
    pub async fn cached_emails(
        &self,
        user_id: i64,
        folder: &str,
        limit: i64,
    ) -> CoreResult<Vec<DbEmail>> {
        let emails = sqlx::query_as::<_, DbEmail>(
            r#"
            SELECT id, user_id, folder, uid, date_epoch, from_address,
                   to_addresses, subject, body_text
            FROM emails
            WHERE user_id = ? AND folder = ?
            ORDER BY date_epoch DESC, uid DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(folder)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(emails)
    }

    /// Attachment metadata cached for an email
    pub async fn attachments_for(&self, email_id: i64) -> CoreResult<Vec<DbAttachment>> {
        let attachments = sqlx::query_as::<_, DbAttachment>(
            "SELECT id, email_id, filename, mime_type FROM attachments WHERE email_id = ? ORDER BY id",
        )
        .bind(email_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attachments)
    }

    /// Point a cached email at another folder
    pub async fn move_cached_email(
        &self,
        user_id: i64,
        uid: u32,
        folder: &str,
    ) -> CoreResult<()> {
        sqlx::query("UPDATE emails SET folder = ? WHERE user_id = ? AND uid = ?")
            .bind(folder)
            .bind(user_id)
            .bind(uid as i64)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Drop a cached email; attachment rows cascade
    pub async fn delete_cached_email(&self, user_id: i64, uid: u32) -> CoreResult<()> {
        sqlx::query("DELETE FROM emails WHERE user_id = ? AND uid = ?")
            .bind(user_id)
            .bind(uid as i64)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Number of cached emails for a user across all folders
    pub async fn email_count(&self, user_id: i64) -> CoreResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as count FROM emails WHERE user_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.get::<i64, _>("count"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ensure_user_is_idempotent() {
        let db = Database::open_memory().await.unwrap();

        let first = db.ensure_user("kate@gmail.com").await.unwrap();
        let second = db.ensure_user("kate@gmail.com").await.unwrap();
        assert_eq!(first, second);

        let other = db.ensure_user("olena@ukr.net").await.unwrap();
        assert_ne!(first, other);
    }

    #[tokio::test]
    async fn test_insert_folder_rejects_duplicates() {
        let db = Database::open_memory().await.unwrap();
        let user = db.ensure_user("kate@gmail.com").await.unwrap();

        db.insert_folder(user, "Work").await.unwrap();
        let duplicate = db.insert_folder(user, "Work").await;
        assert!(matches!(duplicate, Err(CoreError::Persistence(_))));

        assert_eq!(db.user_folders(user).await.unwrap(), vec!["Work"]);
    }

    #[tokio::test]
    async fn test_folder_name_length_constraint() {
        let db = Database::open_memory().await.unwrap();
        let user = db.ensure_user("kate@gmail.com").await.unwrap();

        let at_limit = "x".repeat(64);
        db.insert_folder(user, &at_limit).await.unwrap();

        let over_limit = "x".repeat(65);
        assert!(matches!(
            db.insert_folder(user, &over_limit).await,
            Err(CoreError::Persistence(_))
        ));
    }

    #[tokio::test]
    async fn test_move_and_delete_cached_email() {
        let db = Database::open_memory().await.unwrap();
        let user = db.ensure_user("kate@gmail.com").await.unwrap();

        sqlx::query(
            "INSERT INTO emails (user_id, folder, uid, subject) VALUES (?, 'inbox', 7, 'hello')",
        )
        .bind(user)
        .execute(db.pool())
        .await
        .unwrap();

        db.move_cached_email(user, 7, "bin").await.unwrap();
        assert!(db.cached_emails(user, "inbox", 10).await.unwrap().is_empty());
        let binned = db.cached_emails(user, "bin", 10).await.unwrap();
        assert_eq!(binned.len(), 1);
        assert_eq!(binned[0].uid, 7);

        db.delete_cached_email(user, 7).await.unwrap();
        assert_eq!(db.email_count(user).await.unwrap(), 0);
    }
}
