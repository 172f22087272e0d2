//! OAuth refresh-token exchange.
//!
//! The pipeline only ever needs `grant_type=refresh_token`; the initial
//! authorization-code exchange belongs to the connect flow in the web layer.

use async_trait::async_trait;
use herald_core::config::GoogleConfig;
use tracing::{debug, warn};

use crate::error::{IntegrationError, Result};
use crate::types::TokenGrant;

/// A provider endpoint that trades a refresh token for a new access token.
#[async_trait]
pub trait TokenEndpoint: Send + Sync {
    /// Endpoint name for logging.
    fn name(&self) -> &str;

    /// Returns `AuthExpired` when the provider rejects the refresh token.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant>;
}

/// Google's OAuth 2.0 token endpoint.
pub struct GoogleTokenEndpoint {
    client: reqwest::Client,
    token_url: String,
    client_id: Option<String>,
    client_secret: Option<String>,
}

impl GoogleTokenEndpoint {
    /// `client` should carry the sweep's request timeout.
    pub fn new(client: reqwest::Client, config: &GoogleConfig) -> Self {
        Self {
            client,
            token_url: config.token_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
        }
    }
}

#[async_trait]
impl TokenEndpoint for GoogleTokenEndpoint {
    fn name(&self) -> &str {
        "google"
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant> {
        let (Some(client_id), Some(client_secret)) = (&self.client_id, &self.client_secret) else {
            return Err(IntegrationError::NotConfigured(
                "google.client_id / google.client_secret are not set".into(),
            ));
        };

        let body = format!(
            "grant_type=refresh_token&refresh_token={}&client_id={}&client_secret={}",
            urlencoding::encode(refresh_token),
            urlencoding::encode(client_id),
            urlencoding::encode(client_secret),
        );

        let resp = self
            .client
            .post(&self.token_url)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("Accept", "application/json")
            .body(body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "google token refresh rejected");
            return Err(IntegrationError::AuthExpired(format!(
                "Google token refresh failed ({status}); reconnect Google Business Profile"
            )));
        }

        let grant: TokenGrant = resp.json().await.map_err(|e| {
            IntegrationError::AuthExpired(format!("unreadable token refresh response: {e}"))
        })?;
        debug!(expires_in = grant.expires_in, "google token refreshed");
        Ok(grant)
    }
}
