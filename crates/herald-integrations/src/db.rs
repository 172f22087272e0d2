use rusqlite::{types::Type, Connection};

use crate::error::Result;
use crate::types::Integration;

/// Column order shared by every SELECT in this crate; see [`row_to_integration`].
pub(crate) const INTEGRATION_COLUMNS: &str = "id, user_id, business_id, platform, access_token,
     refresh_token, token_expires_at, account_id, location_id, metadata,
     is_active, created_at, updated_at";

/// Initialise the `user_integrations` table. Idempotent.
///
/// One row per (user, business, platform family key). `business_id` may be
/// NULL, so uniqueness is enforced on `IFNULL(business_id, '')`.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS user_integrations (
            id                INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id           TEXT    NOT NULL,
            business_id       TEXT,
            platform          TEXT    NOT NULL,   -- google_business | late_aggregator
            access_token      TEXT,
            refresh_token     TEXT,
            token_expires_at  TEXT,               -- RFC 3339 UTC or NULL
            account_id        TEXT,
            location_id       TEXT,
            metadata          TEXT    NOT NULL DEFAULT '{}',
            is_active         INTEGER NOT NULL DEFAULT 1,
            created_at        TEXT    NOT NULL,
            updated_at        TEXT    NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_integrations_owner
            ON user_integrations (user_id, IFNULL(business_id, ''), platform);
        ",
    )?;
    Ok(())
}

pub(crate) fn row_to_integration(row: &rusqlite::Row<'_>) -> rusqlite::Result<Integration> {
    let expires: Option<String> = row.get(6)?;
    let token_expires_at = expires
        .map(|s| herald_core::time::parse_ts(&s))
        .transpose()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(e)))?;
    let metadata: String = row.get(9)?;
    Ok(Integration {
        id: row.get(0)?,
        user_id: row.get(1)?,
        business_id: row.get(2)?,
        platform: row.get(3)?,
        access_token: row.get(4)?,
        refresh_token: row.get(5)?,
        token_expires_at,
        account_id: row.get(7)?,
        location_id: row.get(8)?,
        metadata: serde_json::from_str(&metadata).unwrap_or_default(),
        is_active: row.get::<_, i32>(10)? != 0,
        created_at: row.get(11)?,
        updated_at: row.get(12)?,
    })
}
