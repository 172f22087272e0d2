//! Social-posting aggregator: one API fronting every non-direct platform.
//!
//! The aggregator answers one call with a per-platform result map. HTTP 200
//! only means the aggregator accepted the request; the entry for the
//! requested platform decides success.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use herald_core::config::AggregatorConfig;
use herald_core::PlatformFamily;
use herald_integrations::{IntegrationStore, TokenCache};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::adapter::{upstream_message, PublishAdapter, PublishError, PublishRequest, Published};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreatePost<'a> {
    profile_id: &'a str,
    content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    media_urls: Option<Vec<&'a str>>,
    platforms: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CreatePostResponse {
    #[serde(rename = "_id")]
    id: Option<String>,
    #[serde(default)]
    platforms: HashMap<String, PlatformResult>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlatformResult {
    post_id: Option<String>,
    post_url: Option<String>,
    error: Option<String>,
}

pub struct AggregatorAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    integrations: Arc<IntegrationStore>,
}

impl AggregatorAdapter {
    pub fn new(
        client: reqwest::Client,
        config: &AggregatorConfig,
        integrations: Arc<IntegrationStore>,
    ) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            integrations,
        }
    }
}

#[async_trait]
impl PublishAdapter for AggregatorAdapter {
    fn name(&self) -> &str {
        "aggregator"
    }

    async fn publish(
        &self,
        req: &PublishRequest,
        _tokens: &TokenCache,
    ) -> Result<Published, PublishError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| PublishError::NotConfigured("aggregator API key is not set".into()))?;

        let profile_id = self
            .integrations
            .get(&req.user_id, req.business_id.as_deref(), PlatformFamily::Aggregator)?
            .and_then(|i| i.account_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                PublishError::IntegrationMissing("Social accounts not connected".into())
            })?;

        let platform = req.platform.as_str();
        let body = CreatePost {
            profile_id: &profile_id,
            content: &req.post_text,
            media_urls: req.media_url.as_deref().map(|u| vec![u]),
            platforms: vec![platform],
        };

        debug!(item_id = %req.item_id, platform, "posting through aggregator");
        let resp = self
            .client
            .post(format!("{}/posts", self.base_url))
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(item_id = %req.item_id, status, body = %text, "aggregator request failed");
            return Err(PublishError::PlatformRejected {
                status,
                message: upstream_message(&text),
            });
        }

        let mut created: CreatePostResponse = resp.json().await?;
        let result = created.platforms.remove(platform).unwrap_or_default();
        if let Some(error) = result.error.filter(|e| !e.is_empty()) {
            warn!(item_id = %req.item_id, platform, %error, "aggregator reported platform failure");
            return Err(PublishError::PlatformRejected {
                status,
                message: error,
            });
        }

        let post_id = result
            .post_id
            .filter(|id| !id.is_empty())
            .or(created.id.filter(|id| !id.is_empty()))
            .ok_or_else(|| {
                PublishError::InvalidResponse("aggregator response has no post id".into())
            })?;
        Ok(Published {
            post_id,
            post_url: result.post_url,
        })
    }
}
