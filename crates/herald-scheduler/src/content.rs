use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use herald_core::time::format_ts;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{Result, SchedulerError};

/// Status pushed to a linked content record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentStatus {
    Scheduled,
    Published,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentStatus::Scheduled => "scheduled",
            ContentStatus::Published => "published",
        }
    }
}

impl std::fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for content-status notifications.
///
/// Calls are best-effort: the scheduler logs a returned error and moves on,
/// the scheduled item's own state stays authoritative.
#[async_trait]
pub trait ContentStatusSink: Send + Sync {
    /// Only content owned by `user_id` may change. `at` is the scheduled
    /// time for `Scheduled` and the publish time for `Published`.
    async fn set_status(
        &self,
        user_id: &str,
        content_id: &str,
        status: ContentStatus,
        at: DateTime<Utc>,
    ) -> Result<()>;
}

/// Sink for deployments without a content table.
pub struct NoopContentStatus;

#[async_trait]
impl ContentStatusSink for NoopContentStatus {
    async fn set_status(
        &self,
        _: &str,
        _: &str,
        _: ContentStatus,
        _: DateTime<Utc>,
    ) -> Result<()> {
        Ok(())
    }
}

/// Updates rows of a `content` table living in the same database.
pub struct SqliteContentStatus {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteContentStatus {
    /// Ensures the columns this sink writes exist. An existing `content`
    /// table owned by another service is left untouched.
    pub fn new(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS content (
                id            TEXT NOT NULL PRIMARY KEY,
                user_id       TEXT NOT NULL,
                status        TEXT NOT NULL DEFAULT 'draft',
                scheduled_for TEXT,
                published_at  TEXT,
                updated_at    TEXT
            );",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl ContentStatusSink for SqliteContentStatus {
    async fn set_status(
        &self,
        user_id: &str,
        content_id: &str,
        status: ContentStatus,
        at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn.lock().map_err(|_| SchedulerError::LockPoisoned)?;
        let sql = match status {
            ContentStatus::Scheduled => {
                "UPDATE content SET status = ?2, scheduled_for = ?3, updated_at = ?4
                 WHERE id = ?1 AND user_id = ?5"
            }
            ContentStatus::Published => {
                "UPDATE content SET status = ?2, published_at = ?3, updated_at = ?4
                 WHERE id = ?1 AND user_id = ?5"
            }
        };
        let n = conn.execute(
            sql,
            params![
                content_id,
                status.as_str(),
                format_ts(at),
                format_ts(Utc::now()),
                user_id
            ],
        )?;
        if n == 0 {
            debug!(content_id, user_id, %status, "no content row owned by user");
        }
        Ok(())
    }
}
