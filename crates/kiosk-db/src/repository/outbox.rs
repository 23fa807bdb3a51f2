//! # Notification Outbox Repository
//!
//! Rendered notifications waiting for an external delivery worker.
//!
//! ## Outbox Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  command commits business change                                       │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  queue(notification)      ← failure here is logged, never propagated   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  notification_outbox (delivered_at IS NULL)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  worker: get_pending → send → mark_delivered / mark_failed             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Duration, Utc};
use kiosk_core::notification::Notification;
use kiosk_core::{NotificationKind, NotificationOutboxEntry};
use sqlx::SqlitePool;
use tracing::debug;

use super::new_id;
use crate::error::{DbError, DbResult};

/// Repository for the notification outbox.
#[derive(Debug, Clone)]
pub struct NotificationOutboxRepository {
    pool: SqlitePool,
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: String,
    kind: NotificationKind,
    recipient: Option<String>,
    subject: String,
    text: String,
    html: String,
    chat_payload: String,
    attempts: i64,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    attempted_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,
}

impl From<OutboxRow> for NotificationOutboxEntry {
    fn from(row: OutboxRow) -> Self {
        NotificationOutboxEntry {
            id: row.id,
            kind: row.kind,
            recipient: row.recipient,
            subject: row.subject,
            text: row.text,
            html: row.html,
            chat_payload: row.chat_payload,
            attempts: row.attempts,
            last_error: row.last_error,
            created_at: row.created_at,
            attempted_at: row.attempted_at,
            delivered_at: row.delivered_at,
        }
    }
}

impl NotificationOutboxRepository {
    /// Creates a new NotificationOutboxRepository.
    pub fn new(pool: SqlitePool) -> Self {
        NotificationOutboxRepository { pool }
    }

    /// Queues a rendered notification.
    pub async fn queue(&self, notification: &Notification) -> DbResult<NotificationOutboxEntry> {
        let entry = NotificationOutboxEntry {
            id: new_id(),
            kind: notification.kind,
            recipient: notification.recipient.clone(),
            subject: notification.subject.clone(),
            text: notification.text.clone(),
            html: notification.html.clone(),
            chat_payload: serde_json::to_string(&notification.chat_payload)?,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
            attempted_at: None,
            delivered_at: None,
        };

        sqlx::query(
            r#"
            INSERT INTO notification_outbox (
                id, kind, recipient, subject, text, html, chat_payload,
                attempts, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8)
            "#,
        )
        .bind(&entry.id)
        .bind(entry.kind)
        .bind(&entry.recipient)
        .bind(&entry.subject)
        .bind(&entry.text)
        .bind(&entry.html)
        .bind(&entry.chat_payload)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        debug!(id = %entry.id, kind = ?entry.kind, recipient = ?entry.recipient, "Notification queued");
        Ok(entry)
    }

    /// Undelivered entries, oldest first.
    pub async fn get_pending(&self, limit: u32) -> DbResult<Vec<NotificationOutboxEntry>> {
        let rows: Vec<OutboxRow> = sqlx::query_as(
            r#"
            SELECT
                id, kind, recipient, subject, text, html, chat_payload,
                attempts, last_error, created_at, attempted_at, delivered_at
            FROM notification_outbox
            WHERE delivered_at IS NULL
            ORDER BY created_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(NotificationOutboxEntry::from).collect())
    }

    /// Marks an entry as delivered.
    pub async fn mark_delivered(&self, id: &str) -> DbResult<()> {
        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE notification_outbox SET delivered_at = ?2, attempted_at = ?2 WHERE id = ?1",
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("NotificationOutboxEntry", id));
        }
        Ok(())
    }

    /// Records a delivery failure.
    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE notification_outbox SET
                attempts = attempts + 1,
                last_error = ?2,
                attempted_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("NotificationOutboxEntry", id));
        }
        Ok(())
    }

    /// Counts undelivered entries.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notification_outbox WHERE delivered_at IS NULL")
                .fetch_one(&self.pool)
                .await?;

        Ok(count)
    }

    /// Deletes entries delivered more than `days_old` days ago.
    pub async fn cleanup_old_entries(&self, days_old: u32) -> DbResult<u64> {
        let cutoff = Utc::now() - Duration::days(i64::from(days_old));

        let result = sqlx::query(
            "DELETE FROM notification_outbox WHERE delivered_at IS NOT NULL AND delivered_at < ?1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::db;
    use kiosk_core::notification;

    #[tokio::test]
    async fn test_queue_deliver_cycle() {
        let db = db().await;
        let outbox = db.outbox();

        let note = notification::product_request("Cola", Some("Lime")).addressed_to("admin@example.com");
        let entry = outbox.queue(&note).await.unwrap();
        assert_eq!(entry.kind, NotificationKind::ProductRequest);
        assert_eq!(outbox.count_pending().await.unwrap(), 1);

        outbox.mark_failed(&entry.id, "smtp down").await.unwrap();
        let pending = outbox.get_pending(10).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].attempts, 1);
        assert_eq!(pending[0].last_error.as_deref(), Some("smtp down"));
        assert_eq!(pending[0].recipient.as_deref(), Some("admin@example.com"));

        let payload: serde_json::Value = serde_json::from_str(&pending[0].chat_payload).unwrap();
        assert_eq!(payload, note.chat_payload);

        outbox.mark_delivered(&entry.id).await.unwrap();
        assert_eq!(outbox.count_pending().await.unwrap(), 0);

        // Delivered just now: not old enough to clean up
        assert_eq!(outbox.cleanup_old_entries(1).await.unwrap(), 0);
        assert_eq!(outbox.cleanup_old_entries(0).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_entry() {
        let db = db().await;
        assert!(matches!(
            db.outbox().mark_delivered("missing").await,
            Err(DbError::NotFound { .. })
        ));
    }
}
