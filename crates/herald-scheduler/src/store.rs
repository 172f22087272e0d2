use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use herald_core::time::format_ts;
use herald_core::Platform;
use rusqlite::{params, params_from_iter, Connection};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::db::{init_db, row_to_item, ITEM_COLUMNS};
use crate::error::{Result, SchedulerError};
use crate::types::{ItemStatus, ListFilter, NewSchedule, ScheduledItem};

/// Error message recorded on items a crashed sweep left in `processing`.
pub const INTERRUPTED_MESSAGE: &str = "dispatch interrupted before completion";

/// Owner of the `scheduled_content` table.
///
/// Every status change goes through one conditional `UPDATE` here, so each
/// transition is atomic per row and only fires from the expected source
/// state.
pub struct ScheduledItemStore {
    conn: Arc<Mutex<Connection>>,
}

impl ScheduledItemStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| SchedulerError::LockPoisoned)
    }

    /// Validate and insert a new item in `pending`.
    pub fn create(&self, user_id: &str, new: NewSchedule) -> Result<ScheduledItem> {
        let scheduled_for = new
            .scheduled_for
            .ok_or_else(|| SchedulerError::Validation("scheduledFor is required".into()))?;
        if new.post_text.trim().is_empty() {
            return Err(SchedulerError::Validation("postText must not be empty".into()));
        }
        let platform: Platform = new
            .platform
            .parse()
            .map_err(|e: herald_core::HeraldError| SchedulerError::Validation(e.to_string()))?;
        if user_id.trim().is_empty() {
            return Err(SchedulerError::Validation("user id is required".into()));
        }

        let now = Utc::now();
        let options = new.platform_options.unwrap_or_default();
        let item = ScheduledItem {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            business_id: non_empty(new.business_id),
            content_id: non_empty(new.content_id),
            platform: platform.as_str().to_string(),
            post_text: new.post_text,
            media_url: non_empty(new.media_url),
            platform_options: options,
            scheduled_for,
            status: ItemStatus::Pending,
            error_message: None,
            retry_count: 0,
            published_at: None,
            platform_post_id: None,
            platform_post_url: None,
            created_at: now,
            updated_at: now,
        };

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO scheduled_content
             (id, user_id, business_id, content_id, platform, post_text, media_url,
              platform_options, scheduled_for, status, retry_count, created_at, updated_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,'pending',0,?10,?10)",
            params![
                item.id,
                item.user_id,
                item.business_id,
                item.content_id,
                item.platform,
                item.post_text,
                item.media_url,
                serde_json::to_string(&item.platform_options)?,
                format_ts(item.scheduled_for),
                format_ts(now),
            ],
        )?;
        info!(item_id = %item.id, user_id, platform = %item.platform, scheduled_for = %item.scheduled_for, "item scheduled");
        Ok(item)
    }

    pub fn get(&self, id: &str) -> Result<ScheduledItem> {
        let conn = self.conn()?;
        let sql = format!("SELECT {ITEM_COLUMNS} FROM scheduled_content WHERE id = ?1");
        match conn.query_row(&sql, [id], row_to_item) {
            Ok(item) => Ok(item),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(SchedulerError::NotFound {
                id: id.to_string(),
            }),
            Err(e) => Err(SchedulerError::Database(e)),
        }
    }

    /// `pending → cancelled`, only for the owner.
    pub fn cancel(&self, id: &str, user_id: &str) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE scheduled_content SET status = 'cancelled', updated_at = ?3
             WHERE id = ?1 AND user_id = ?2 AND status = 'pending'",
            params![id, user_id, format_ts(Utc::now())],
        )?;
        if n == 0 {
            return Err(SchedulerError::NotFound { id: id.to_string() });
        }
        info!(item_id = %id, user_id, "item cancelled");
        Ok(())
    }

    /// Move a `pending` or `failed` item back to `pending` at `new_time`.
    /// Clears `error_message`; `retry_count` is kept.
    pub fn reschedule(&self, id: &str, user_id: &str, new_time: DateTime<Utc>) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE scheduled_content
             SET status = 'pending', scheduled_for = ?3, error_message = NULL, updated_at = ?4
             WHERE id = ?1 AND user_id = ?2 AND status IN ('pending', 'failed')",
            params![id, user_id, format_ts(new_time), format_ts(Utc::now())],
        )?;
        if n == 0 {
            return Err(SchedulerError::NotFound { id: id.to_string() });
        }
        info!(item_id = %id, user_id, scheduled_for = %new_time, "item rescheduled");
        Ok(())
    }

    /// A user's items, oldest `scheduled_for` first.
    pub fn list(&self, user_id: &str, filter: &ListFilter) -> Result<Vec<ScheduledItem>> {
        let mut sql = format!("SELECT {ITEM_COLUMNS} FROM scheduled_content WHERE user_id = ?1");
        let mut args: Vec<String> = vec![user_id.to_string()];

        if let Some(status) = filter.status {
            args.push(status.as_str().to_string());
            sql.push_str(&format!(" AND status = ?{}", args.len()));
        }
        if let Some(from) = filter.from {
            args.push(format_ts(from));
            sql.push_str(&format!(" AND scheduled_for >= ?{}", args.len()));
        }
        if let Some(to) = filter.to {
            args.push(format_ts(to));
            sql.push_str(&format!(" AND scheduled_for <= ?{}", args.len()));
        }
        if let Some(business_id) = &filter.business_id {
            args.push(business_id.clone());
            sql.push_str(&format!(" AND business_id = ?{}", args.len()));
        }
        sql.push_str(" ORDER BY scheduled_for ASC, created_at ASC");

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql)?;
        let items = stmt
            .query_map(params_from_iter(args.iter()), row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Read-only view of what the next sweep would pick up.
    pub fn list_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledItem>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM scheduled_content
             WHERE status = 'pending' AND scheduled_for <= ?1
             ORDER BY scheduled_for ASC
             LIMIT ?2"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let items = stmt
            .query_map(params![format_ts(now), limit as i64], row_to_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }

    /// Atomically move up to `limit` due items from `pending` to
    /// `processing` and return them, oldest first.
    ///
    /// Select and update run as one statement, so two overlapping sweeps
    /// can never claim the same row.
    pub fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<ScheduledItem>> {
        let conn = self.conn()?;
        let sql = format!(
            "UPDATE scheduled_content SET status = 'processing', updated_at = ?3
             WHERE status = 'pending' AND id IN (
                 SELECT id FROM scheduled_content
                 WHERE status = 'pending' AND scheduled_for <= ?1
                 ORDER BY scheduled_for ASC
                 LIMIT ?2
             )
             RETURNING {ITEM_COLUMNS}"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        let mut items = stmt
            .query_map(
                params![format_ts(now), limit as i64, format_ts(Utc::now())],
                row_to_item,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        // RETURNING order is unspecified.
        items.sort_by(|a, b| a.scheduled_for.cmp(&b.scheduled_for));
        if !items.is_empty() {
            debug!(count = items.len(), "claimed due items");
        }
        Ok(items)
    }

    /// `pending → processing` for a single item.
    pub fn mark_processing(&self, id: &str) -> Result<()> {
        self.transition(
            id,
            ItemStatus::Processing,
            "UPDATE scheduled_content SET status = 'processing', updated_at = ?2
             WHERE id = ?1 AND status = 'pending'",
            params![id, format_ts(Utc::now())],
        )
    }

    /// `processing → published`, recording the platform's post id.
    pub fn mark_published(
        &self,
        id: &str,
        platform_post_id: &str,
        platform_post_url: Option<&str>,
    ) -> Result<ScheduledItem> {
        let now = format_ts(Utc::now());
        self.transition(
            id,
            ItemStatus::Published,
            "UPDATE scheduled_content
             SET status = 'published', published_at = ?2, platform_post_id = ?3,
                 platform_post_url = ?4, error_message = NULL, updated_at = ?2
             WHERE id = ?1 AND status = 'processing'",
            params![id, now, platform_post_id, platform_post_url],
        )?;
        self.get(id)
    }

    /// `processing → failed`, incrementing `retry_count`.
    pub fn mark_failed(&self, id: &str, error_message: &str) -> Result<()> {
        self.transition(
            id,
            ItemStatus::Failed,
            "UPDATE scheduled_content
             SET status = 'failed', error_message = ?2, retry_count = retry_count + 1,
                 updated_at = ?3
             WHERE id = ?1 AND status = 'processing'",
            params![id, error_message, format_ts(Utc::now())],
        )
    }

    /// Fail items stuck in `processing` since before `cutoff`, left behind
    /// by a sweep that died mid-dispatch. Returns how many were released.
    pub fn release_stale(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE scheduled_content
             SET status = 'failed', error_message = ?2, retry_count = retry_count + 1,
                 updated_at = ?3
             WHERE status = 'processing' AND updated_at < ?1",
            params![format_ts(cutoff), INTERRUPTED_MESSAGE, format_ts(Utc::now())],
        )?;
        if n > 0 {
            warn!(count = n, "stale processing items marked failed");
        }
        Ok(n)
    }

    fn transition(
        &self,
        id: &str,
        to: ItemStatus,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(sql, args)?;
        if n == 0 {
            return Err(SchedulerError::InvalidTransition {
                id: id.to_string(),
                to,
            });
        }
        debug!(item_id = %id, status = %to, "item transitioned");
        Ok(())
    }
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}
