use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{IntegrationError, Result};
use crate::oauth::TokenEndpoint;
use crate::store::IntegrationStore;
use crate::types::{Integration, ValidToken};

#[derive(Debug, Default)]
enum Slot {
    #[default]
    Empty,
    Valid(ValidToken),
    /// Refresh was rejected; later dispatches in the sweep fail fast.
    Rejected(String),
}

/// Refresh results shared by all dispatches of one sweep.
///
/// Each credential gets a single-flight slot: the first dispatch that finds
/// the token expired refreshes it while holding the slot's lock, and every
/// other dispatch for the same credential waits and reuses the outcome.
/// Build a fresh cache per sweep and drop it when the sweep ends.
#[derive(Debug, Default)]
pub struct TokenCache {
    slots: DashMap<i64, Arc<Mutex<Slot>>>,
}

impl TokenCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self, integration_id: i64) -> Arc<Mutex<Slot>> {
        self.slots.entry(integration_id).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Hands out access tokens that are valid right now, refreshing and
/// persisting them when the stored one has expired or is about to.
pub struct TokenRefresher {
    store: Arc<IntegrationStore>,
    endpoint: Arc<dyn TokenEndpoint>,
    skew: Duration,
}

impl TokenRefresher {
    pub fn new(
        store: Arc<IntegrationStore>,
        endpoint: Arc<dyn TokenEndpoint>,
        refresh_skew_secs: i64,
    ) -> Self {
        Self {
            store,
            endpoint,
            skew: Duration::try_seconds(refresh_skew_secs.max(0)).unwrap_or(Duration::MAX),
        }
    }

    pub fn store(&self) -> &IntegrationStore {
        &self.store
    }

    fn is_fresh(&self, expires_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match expires_at {
            Some(exp) => exp.checked_sub_signed(self.skew).is_some_and(|t| t > now),
            // Unknown expiry: trust the token until the platform says otherwise.
            None => true,
        }
    }

    pub async fn get_valid_token(
        &self,
        integration: &Integration,
        cache: &TokenCache,
    ) -> Result<ValidToken> {
        let slot = cache.slot(integration.id);
        let mut slot = slot.lock().await;

        let now = Utc::now();
        match &*slot {
            Slot::Valid(tok) if self.is_fresh(tok.expires_at, now) => {
                return Ok(ValidToken {
                    refreshed: false,
                    ..tok.clone()
                });
            }
            Slot::Rejected(reason) => return Err(IntegrationError::AuthExpired(reason.clone())),
            _ => {}
        }

        if let Some(token) = &integration.access_token {
            if self.is_fresh(integration.token_expires_at, now) {
                return Ok(ValidToken {
                    access_token: token.clone(),
                    refreshed: false,
                    expires_at: integration.token_expires_at,
                });
            }
        }

        let Some(refresh_token) = integration.refresh_token.as_deref() else {
            let reason = "access token expired and no refresh token is stored".to_string();
            *slot = Slot::Rejected(reason.clone());
            return Err(IntegrationError::AuthExpired(reason));
        };

        info!(
            integration_id = integration.id,
            endpoint = self.endpoint.name(),
            "refreshing access token"
        );
        let grant = match self.endpoint.refresh(refresh_token).await {
            Ok(g) => g,
            Err(IntegrationError::AuthExpired(reason)) => {
                warn!(integration_id = integration.id, %reason, "refresh token rejected");
                *slot = Slot::Rejected(reason.clone());
                return Err(IntegrationError::AuthExpired(reason));
            }
            // Transient failures are not cached; the next dispatch may retry.
            Err(e) => return Err(e),
        };

        let Some(expires_at) = Duration::try_seconds(grant.expires_in)
            .filter(|ttl| *ttl > Duration::zero())
            .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        else {
            let reason = format!("invalid expires_in in token response: {}", grant.expires_in);
            warn!(integration_id = integration.id, %reason, "refresh grant discarded");
            *slot = Slot::Rejected(reason.clone());
            return Err(IntegrationError::AuthExpired(reason));
        };
        self.store.update_tokens(
            integration.id,
            &grant.access_token,
            grant.refresh_token.as_deref(),
            expires_at,
        )?;
        debug!(integration_id = integration.id, %expires_at, "token persisted");

        let token = ValidToken {
            access_token: grant.access_token,
            refreshed: true,
            expires_at: Some(expires_at),
        };
        *slot = Slot::Valid(token.clone());
        Ok(token)
    }
}
