//! Google Business Profile: the one platform published to directly.
//!
//! Flow per item:
//!   1. Look up the user's `google_business` integration for the business.
//!   2. Get a valid access token (refreshing through the sweep's cache).
//!   3. POST a local post to `{posts_api_base}/{location}/localPosts`.

use std::sync::Arc;

use async_trait::async_trait;
use herald_core::config::GoogleConfig;
use herald_core::PlatformFamily;
use herald_integrations::{TokenCache, TokenRefresher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapter::{upstream_message, PublishAdapter, PublishError, PublishRequest, Published};

const DEFAULT_TOPIC_TYPE: &str = "STANDARD";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct LocalPost<'a> {
    language_code: &'a str,
    summary: &'a str,
    topic_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    call_to_action: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    media: Option<Vec<MediaItem<'a>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    event: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    offer: Option<&'a Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MediaItem<'a> {
    media_format: &'static str,
    source_url: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LocalPostResponse {
    name: Option<String>,
    search_url: Option<String>,
}

pub struct GoogleBusinessAdapter {
    client: reqwest::Client,
    posts_api_base: String,
    language_code: String,
    tokens: Arc<TokenRefresher>,
}

impl GoogleBusinessAdapter {
    pub fn new(client: reqwest::Client, config: &GoogleConfig, tokens: Arc<TokenRefresher>) -> Self {
        Self {
            client,
            posts_api_base: config.posts_api_base.trim_end_matches('/').to_string(),
            language_code: config.language_code.clone(),
            tokens,
        }
    }

    fn build_post<'a>(&'a self, req: &'a PublishRequest) -> LocalPost<'a> {
        let opts = &req.platform_options;
        let topic_type = opts
            .get("topicType")
            .and_then(Value::as_str)
            .map(str::to_ascii_uppercase)
            .unwrap_or_else(|| DEFAULT_TOPIC_TYPE.to_string());

        LocalPost {
            language_code: &self.language_code,
            summary: &req.post_text,
            topic_type,
            call_to_action: opts.get("callToAction").filter(|v| !v.is_null()),
            media: req.media_url.as_deref().map(|url| {
                vec![MediaItem {
                    media_format: "PHOTO",
                    source_url: url,
                }]
            }),
            event: opts.get("event").filter(|v| !v.is_null()),
            offer: opts.get("offer").filter(|v| !v.is_null()),
        }
    }
}

#[async_trait]
impl PublishAdapter for GoogleBusinessAdapter {
    fn name(&self) -> &str {
        "google-business"
    }

    async fn publish(
        &self,
        req: &PublishRequest,
        tokens: &TokenCache,
    ) -> Result<Published, PublishError> {
        let integration = self
            .tokens
            .store()
            .get(&req.user_id, req.business_id.as_deref(), PlatformFamily::Direct)?
            .ok_or_else(|| {
                PublishError::IntegrationMissing(
                    "Google Business Profile not connected for this business".into(),
                )
            })?;
        let location = integration
            .location_id
            .clone()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| {
                PublishError::IntegrationMissing(
                    "Google Business Profile has no location selected".into(),
                )
            })?;

        let token = self.tokens.get_valid_token(&integration, tokens).await?;
        if token.refreshed {
            debug!(item_id = %req.item_id, integration_id = integration.id, "used refreshed google token");
        }

        let url = format!(
            "{}/{}/localPosts",
            self.posts_api_base,
            location.trim_start_matches('/')
        );
        let body = self.build_post(req);

        debug!(item_id = %req.item_id, %url, "creating google local post");
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&token.access_token)
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(item_id = %req.item_id, status, body = %text, "google rejected local post");
            return Err(PublishError::PlatformRejected {
                status,
                message: upstream_message(&text),
            });
        }

        let created: LocalPostResponse = resp.json().await?;
        let post_id = created.name.filter(|n| !n.is_empty()).ok_or_else(|| {
            PublishError::InvalidResponse("local post response has no name".into())
        })?;
        Ok(Published {
            post_id,
            post_url: created.search_url,
        })
    }
}
