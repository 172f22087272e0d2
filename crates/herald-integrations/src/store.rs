use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use herald_core::time::format_ts;
use herald_core::PlatformFamily;
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::db::{init_db, row_to_integration, INTEGRATION_COLUMNS};
use crate::error::{IntegrationError, Result};
use crate::types::{Integration, NewIntegration};

/// SQLite-backed store of per-user platform credentials.
///
/// Rows are never deleted: disconnecting a platform flips `is_active` so the
/// credential history stays auditable.
pub struct IntegrationStore {
    db: Arc<Mutex<Connection>>,
}

impl IntegrationStore {
    pub fn new(conn: Connection) -> Result<Self> {
        init_db(&conn)?;
        Ok(Self {
            db: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.db.lock().map_err(|_| IntegrationError::LockPoisoned)
    }

    /// Active integration for (user, business, family), if connected.
    pub fn get(
        &self,
        user_id: &str,
        business_id: Option<&str>,
        family: PlatformFamily,
    ) -> Result<Option<Integration>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {INTEGRATION_COLUMNS} FROM user_integrations
             WHERE user_id = ?1 AND business_id IS ?2 AND platform = ?3 AND is_active = 1"
        );
        let mut stmt = conn.prepare_cached(&sql)?;
        match stmt.query_row(
            params![user_id, business_id, family.integration_key()],
            row_to_integration,
        ) {
            Ok(i) => Ok(Some(i)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(IntegrationError::Database(e)),
        }
    }

    pub fn get_by_id(&self, id: i64) -> Result<Integration> {
        let conn = self.conn()?;
        let sql = format!("SELECT {INTEGRATION_COLUMNS} FROM user_integrations WHERE id = ?1");
        match conn.query_row(&sql, [id], row_to_integration) {
            Ok(i) => Ok(i),
            Err(rusqlite::Error::QueryReturnedNoRows) => Err(IntegrationError::NotFound { id }),
            Err(e) => Err(IntegrationError::Database(e)),
        }
    }

    /// Connect or reconnect a platform. An existing row for the same owner
    /// and platform is overwritten and re-activated.
    pub fn upsert(&self, new: &NewIntegration) -> Result<Integration> {
        let mut conn = self.conn()?;
        let now = format_ts(Utc::now());
        let expires = new.token_expires_at.map(format_ts);
        let metadata = new.metadata_json();

        let tx = conn.transaction()?;
        let existing: Option<i64> = match tx.query_row(
            "SELECT id FROM user_integrations
             WHERE user_id = ?1 AND business_id IS ?2 AND platform = ?3",
            params![new.user_id, new.business_id, new.platform],
            |row| row.get(0),
        ) {
            Ok(id) => Some(id),
            Err(rusqlite::Error::QueryReturnedNoRows) => None,
            Err(e) => return Err(IntegrationError::Database(e)),
        };

        let id = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE user_integrations SET
                        access_token = ?2, refresh_token = ?3, token_expires_at = ?4,
                        account_id = ?5, location_id = ?6, metadata = ?7,
                        is_active = 1, updated_at = ?8
                     WHERE id = ?1",
                    params![
                        id,
                        new.access_token,
                        new.refresh_token,
                        expires,
                        new.account_id,
                        new.location_id,
                        metadata,
                        now
                    ],
                )?;
                id
            }
            None => {
                tx.execute(
                    "INSERT INTO user_integrations
                     (user_id, business_id, platform, access_token, refresh_token,
                      token_expires_at, account_id, location_id, metadata, is_active,
                      created_at, updated_at)
                     VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,1,?10,?10)",
                    params![
                        new.user_id,
                        new.business_id,
                        new.platform,
                        new.access_token,
                        new.refresh_token,
                        expires,
                        new.account_id,
                        new.location_id,
                        metadata,
                        now
                    ],
                )?;
                tx.last_insert_rowid()
            }
        };
        tx.commit()?;
        drop(conn);

        info!(integration_id = id, user_id = %new.user_id, platform = %new.platform, "integration connected");
        self.get_by_id(id)
    }

    /// Persist a refreshed access token. A rotated refresh token replaces the
    /// stored one; `None` keeps it.
    pub fn update_tokens(
        &self,
        id: i64,
        access_token: &str,
        refresh_token: Option<&str>,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE user_integrations SET
                access_token = ?2,
                refresh_token = COALESCE(?3, refresh_token),
                token_expires_at = ?4,
                updated_at = ?5
             WHERE id = ?1",
            params![
                id,
                access_token,
                refresh_token,
                format_ts(expires_at),
                format_ts(Utc::now())
            ],
        )?;
        if n == 0 {
            return Err(IntegrationError::NotFound { id });
        }
        debug!(integration_id = id, "stored refreshed token");
        Ok(())
    }

    /// Soft-invalidate on disconnect.
    pub fn deactivate(&self, id: i64) -> Result<()> {
        let conn = self.conn()?;
        let n = conn.execute(
            "UPDATE user_integrations SET is_active = 0, updated_at = ?2 WHERE id = ?1",
            params![id, format_ts(Utc::now())],
        )?;
        if n == 0 {
            return Err(IntegrationError::NotFound { id });
        }
        info!(integration_id = id, "integration deactivated");
        Ok(())
    }
}

impl NewIntegration {
    fn metadata_json(&self) -> String {
        if self.metadata.is_null() {
            "{}".to_string()
        } else {
            self.metadata.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn store() -> IntegrationStore {
        IntegrationStore::new(Connection::open_in_memory().unwrap()).unwrap()
    }

    fn google(user: &str, business: Option<&str>) -> NewIntegration {
        NewIntegration {
            user_id: user.into(),
            business_id: business.map(String::from),
            platform: "google_business".into(),
            access_token: Some("at-1".into()),
            refresh_token: Some("rt-1".into()),
            token_expires_at: Some(Utc::now() + Duration::hours(1)),
            location_id: Some("accounts/1/locations/2".into()),
            ..Default::default()
        }
    }

    #[test]
    fn get_matches_owner_business_and_family() {
        let s = store();
        s.upsert(&google("u1", Some("b1"))).unwrap();

        let found = s.get("u1", Some("b1"), PlatformFamily::Direct).unwrap().unwrap();
        assert_eq!(found.location_id.as_deref(), Some("accounts/1/locations/2"));
        assert!(found.is_active);

        assert!(s.get("u1", Some("b2"), PlatformFamily::Direct).unwrap().is_none());
        assert!(s.get("u1", None, PlatformFamily::Direct).unwrap().is_none());
        assert!(s.get("u1", Some("b1"), PlatformFamily::Aggregator).unwrap().is_none());
        assert!(s.get("u2", Some("b1"), PlatformFamily::Direct).unwrap().is_none());
    }

    #[test]
    fn null_business_is_a_distinct_scope() {
        let s = store();
        s.upsert(&google("u1", None)).unwrap();
        assert!(s.get("u1", None, PlatformFamily::Direct).unwrap().is_some());
        assert!(s.get("u1", Some("b1"), PlatformFamily::Direct).unwrap().is_none());
    }

    #[test]
    fn upsert_overwrites_existing_row() {
        let s = store();
        let first = s.upsert(&google("u1", None)).unwrap();
        let mut again = google("u1", None);
        again.access_token = Some("at-2".into());
        let second = s.upsert(&again).unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.access_token.as_deref(), Some("at-2"));
    }

    #[test]
    fn update_tokens_keeps_refresh_token_unless_rotated() {
        let s = store();
        let i = s.upsert(&google("u1", None)).unwrap();
        let exp = Utc::now() + Duration::hours(2);

        s.update_tokens(i.id, "at-new", None, exp).unwrap();
        let got = s.get_by_id(i.id).unwrap();
        assert_eq!(got.access_token.as_deref(), Some("at-new"));
        assert_eq!(got.refresh_token.as_deref(), Some("rt-1"));
        assert_eq!(got.token_expires_at.map(format_ts), Some(format_ts(exp)));

        s.update_tokens(i.id, "at-3", Some("rt-2"), exp).unwrap();
        assert_eq!(s.get_by_id(i.id).unwrap().refresh_token.as_deref(), Some("rt-2"));
    }

    #[test]
    fn deactivate_hides_row_but_keeps_it() {
        let s = store();
        let i = s.upsert(&google("u1", None)).unwrap();
        s.deactivate(i.id).unwrap();
        assert!(s.get("u1", None, PlatformFamily::Direct).unwrap().is_none());
        assert!(!s.get_by_id(i.id).unwrap().is_active);

        // Reconnecting re-activates the same row.
        let back = s.upsert(&google("u1", None)).unwrap();
        assert_eq!(back.id, i.id);
        assert!(back.is_active);
    }

    #[test]
    fn missing_rows_are_not_found() {
        let s = store();
        assert!(matches!(
            s.update_tokens(42, "x", None, Utc::now()),
            Err(IntegrationError::NotFound { id: 42 })
        ));
        assert!(matches!(s.deactivate(7), Err(IntegrationError::NotFound { id: 7 })));
    }
}
