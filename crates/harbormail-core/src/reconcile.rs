//! Insert-only reconciliation of fetched mail into the local cache

use harbormail_imap::{CanonicalFolder, MessageSummary};
use sqlx::Row;
use tracing::debug;

use crate::{CoreResult, Database};

/// What one reconciliation batch changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// New email rows written
    pub inserted: usize,
    /// Summaries whose (user, uid) key already had a row
    pub skipped: usize,
    /// User folder names recorded for the first time
    pub folders_recorded: usize,
}

/// Mirror a fetched batch into the cache.
///
/// Emails are keyed by (user, uid): a summary whose key already has a
/// row is skipped, never updated, so server-side edits do not
/// overwrite cached rows. Newly discovered user folders are recorded
/// in the same transaction. Any failure rolls the whole batch back;
/// the server-side state is already mutated by then and is left
/// alone.
pub async fn reconcile(
    db: &Database,
    user_id: i64,
    folder: &CanonicalFolder,
    discovered_folders: &[String],
    summaries: &[MessageSummary],
) -> CoreResult<ReconcileReport> {
    let mut tx = db.pool().begin().await?;
    let mut report = ReconcileReport::default();

    for name in discovered_folders {
        let result = sqlx::query(
            "INSERT INTO folders (user_id, name) VALUES (?, ?) ON CONFLICT(user_id, name) DO NOTHING",
        )
        .bind(user_id)
        .bind(name)
        .execute(&mut *tx)
        .await?;
        report.folders_recorded += result.rows_affected() as usize;
    }

    for summary in summaries {
        let existing = sqlx::query("SELECT id FROM emails WHERE user_id = ? AND uid = ?")
            .bind(user_id)
            .bind(summary.uid as i64)
            .fetch_optional(&mut *tx)
            .await?;
        if existing.is_some() {
            report.skipped += 1;
            continue;
        }

        let email_id = sqlx::query(
            r#"
            INSERT INTO emails (user_id, folder, uid, date_epoch, from_address, to_addresses, subject, body_text)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(user_id)
        .bind(folder.key())
        .bind(summary.uid as i64)
        .bind(summary.date.map(|d| d.timestamp()))
        .bind(summary.from_display())
        .bind(summary.to_display())
        .bind(&summary.subject)
        .bind(&summary.text)
        .fetch_one(&mut *tx)
        .await?
        .get::<i64, _>("id");

        for attachment in &summary.attachments {
            sqlx::query("INSERT INTO attachments (email_id, filename, mime_type) VALUES (?, ?, ?)")
                .bind(email_id)
                .bind(&attachment.filename)
                .bind(&attachment.mime_type)
                .execute(&mut *tx)
                .await?;
        }

        report.inserted += 1;
    }

    // An early return above drops the transaction, rolling it back.
    tx.commit().await?;

    debug!(
        "Reconciled {} summaries into {}: {} inserted, {} skipped",
        summaries.len(),
        folder.key(),
        report.inserted,
        report.skipped
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CoreError, Database};
    use harbormail_imap::{AttachmentMeta, EmailAddress};

    fn summary(uid: u32, subject: &str) -> MessageSummary {
        MessageSummary {
            uid,
            date: chrono::DateTime::parse_from_rfc2822("Tue, 1 Jul 2025 10:52:37 +0300").ok(),
            from: vec![EmailAddress::new(None, "sender@example.com".into())],
            to: vec![EmailAddress::new(None, "kate@gmail.com".into())],
            subject: Some(subject.to_string()),
            text: Some("body".to_string()),
            attachments: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent_on_uid() {
        let db = Database::open_memory().await.unwrap();
        let user = db.ensure_user("kate@gmail.com").await.unwrap();
        let batch = vec![summary(301, "first"), summary(302, "second")];

        let first = reconcile(&db, user, &CanonicalFolder::Inbox, &[], &batch)
            .await
            .unwrap();
        assert_eq!(first.inserted, 2);
        assert_eq!(first.skipped, 0);

        let second = reconcile(&db, user, &CanonicalFolder::Inbox, &[], &batch)
            .await
            .unwrap();
        assert_eq!(second.inserted, 0);
        assert_eq!(second.skipped, 2);

        assert_eq!(db.cached_emails(user, "inbox", 10).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_existing_rows_are_never_updated() {
        let db = Database::open_memory().await.unwrap();
        let user = db.ensure_user("kate@gmail.com").await.unwrap();

        reconcile(&db, user, &CanonicalFolder::Inbox, &[], &[summary(301, "original")])
            .await
            .unwrap();
        reconcile(&db, user, &CanonicalFolder::Inbox, &[], &[summary(301, "rewritten")])
            .await
            .unwrap();

        let cached = db.cached_emails(user, "inbox", 10).await.unwrap();
        assert_eq!(cached.len(), 1);
        assert_eq!(cached[0].subject.as_deref(), Some("original"));
    }

    #[tokio::test]
    async fn test_attachment_metadata_is_cached() {
        let db = Database::open_memory().await.unwrap();
        let user = db.ensure_user("kate@gmail.com").await.unwrap();

        let mut with_attachment = summary(400, "report");
        with_attachment.attachments = vec![AttachmentMeta {
            filename: "report.pdf".into(),
            mime_type: "application/pdf".into(),
        }];

        reconcile(&db, user, &CanonicalFolder::Inbox, &[], &[with_attachment])
            .await
            .unwrap();

        let cached = db.cached_emails(user, "inbox", 10).await.unwrap();
        let attachments = db.attachments_for(cached[0].id).await.unwrap();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename, "report.pdf");
        assert_eq!(attachments[0].mime_type.as_deref(), Some("application/pdf"));
    }

    #[tokio::test]
    async fn test_discovered_folders_recorded_once() {
        let db = Database::open_memory().await.unwrap();
        let user = db.ensure_user("kate@gmail.com").await.unwrap();
        let discovered = vec!["Work".to_string(), "Receipts".to_string()];

        let first = reconcile(&db, user, &CanonicalFolder::Inbox, &discovered, &[])
            .await
            .unwrap();
        assert_eq!(first.folders_recorded, 2);

        let second = reconcile(&db, user, &CanonicalFolder::Inbox, &discovered, &[])
            .await
            .unwrap();
        assert_eq!(second.folders_recorded, 0);

        assert_eq!(
            db.user_folders(user).await.unwrap(),
            vec!["Receipts", "Work"]
        );
    }

    #[tokio::test]
    async fn test_constraint_violation_rolls_back_whole_batch() {
        let db = Database::open_memory().await.unwrap();
        let user = db.ensure_user("kate@gmail.com").await.unwrap();

        let mut oversized = summary(402, "bad attachment");
        oversized.attachments = vec![AttachmentMeta {
            filename: "x".repeat(256),
            mime_type: "application/pdf".into(),
        }];
        let batch = vec![summary(401, "fine"), oversized];

        let result = reconcile(&db, user, &CanonicalFolder::Inbox, &[], &batch).await;
        assert!(matches!(result, Err(CoreError::Persistence(_))));

        // The row inserted before the failure must be gone too
        assert!(db.cached_emails(user, "inbox", 10).await.unwrap().is_empty());
    }
}
