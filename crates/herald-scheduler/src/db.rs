use herald_core::time::parse_ts;
use rusqlite::{types::Type, Connection};

use crate::error::Result;
use crate::types::{ItemStatus, ScheduledItem};

/// Column order shared by every SELECT / RETURNING in this crate.
pub(crate) const ITEM_COLUMNS: &str = "id, user_id, business_id, content_id, platform, post_text,
     media_url, platform_options, scheduled_for, status, error_message, retry_count,
     published_at, platform_post_id, platform_post_url, created_at, updated_at";

/// Initialise the scheduler schema in `conn`. Idempotent.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS scheduled_content (
            id                 TEXT    NOT NULL PRIMARY KEY,
            user_id            TEXT    NOT NULL,
            business_id        TEXT,
            content_id         TEXT,
            platform           TEXT    NOT NULL,
            post_text          TEXT    NOT NULL,
            media_url          TEXT,
            platform_options   TEXT    NOT NULL DEFAULT '{}',   -- JSON object
            scheduled_for      TEXT    NOT NULL,                -- RFC 3339 UTC
            status             TEXT    NOT NULL DEFAULT 'pending',
            error_message      TEXT,
            retry_count        INTEGER NOT NULL DEFAULT 0,
            published_at       TEXT,
            platform_post_id   TEXT,
            platform_post_url  TEXT,
            created_at         TEXT    NOT NULL,
            updated_at         TEXT    NOT NULL
        ) STRICT;

        -- Sweep: WHERE status = 'pending' AND scheduled_for <= ? ORDER BY scheduled_for
        CREATE INDEX IF NOT EXISTS idx_scheduled_due
            ON scheduled_content (status, scheduled_for);

        -- Listing: WHERE user_id = ? ORDER BY scheduled_for
        CREATE INDEX IF NOT EXISTS idx_scheduled_user
            ON scheduled_content (user_id, scheduled_for);
        ",
    )?;
    Ok(())
}

fn conversion_error(
    idx: usize,
    e: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn ts_at(row: &rusqlite::Row<'_>, idx: usize) -> rusqlite::Result<chrono::DateTime<chrono::Utc>> {
    let s: String = row.get(idx)?;
    parse_ts(&s).map_err(|e| conversion_error(idx, e))
}

fn opt_ts_at(
    row: &rusqlite::Row<'_>,
    idx: usize,
) -> rusqlite::Result<Option<chrono::DateTime<chrono::Utc>>> {
    row.get::<_, Option<String>>(idx)?
        .map(|s| parse_ts(&s).map_err(|e| conversion_error(idx, e)))
        .transpose()
}

pub(crate) fn row_to_item(row: &rusqlite::Row<'_>) -> rusqlite::Result<ScheduledItem> {
    let options: String = row.get(7)?;
    let status: String = row.get(9)?;
    Ok(ScheduledItem {
        id: row.get(0)?,
        user_id: row.get(1)?,
        business_id: row.get(2)?,
        content_id: row.get(3)?,
        platform: row.get(4)?,
        post_text: row.get(5)?,
        media_url: row.get(6)?,
        platform_options: serde_json::from_str(&options).map_err(|e| conversion_error(7, e))?,
        scheduled_for: ts_at(row, 8)?,
        status: status
            .parse::<ItemStatus>()
            .map_err(|e| conversion_error(9, std::io::Error::other(e)))?,
        error_message: row.get(10)?,
        retry_count: row.get(11)?,
        published_at: opt_ts_at(row, 12)?,
        platform_post_id: row.get(13)?,
        platform_post_url: row.get(14)?,
        created_at: ts_at(row, 15)?,
        updated_at: ts_at(row, 16)?,
    })
}
