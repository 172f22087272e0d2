use chrono::{DateTime, Utc};
use herald_core::Platform;
use herald_publish::PublishRequest;
use serde::{Deserialize, Serialize};

pub type PlatformOptions = serde_json::Map<String, serde_json::Value>;

/// Lifecycle state of a scheduled item.
///
/// ```text
/// pending ──claim──▶ processing ──▶ published
///    │  ▲                 └───────▶ failed ──reschedule──┐
///    │  └────────────────────────────────────────────────┘
///    └──cancel──▶ cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting for `scheduled_for`.
    Pending,
    /// Claimed by a sweep; a dispatch is in flight.
    Processing,
    Published,
    /// Last attempt failed; stays here until rescheduled.
    Failed,
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Processing => "processing",
            ItemStatus::Published => "published",
            ItemStatus::Failed => "failed",
            ItemStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ItemStatus::Pending),
            "processing" => Ok(ItemStatus::Processing),
            "published" => Ok(ItemStatus::Published),
            "failed" => Ok(ItemStatus::Failed),
            "cancelled" => Ok(ItemStatus::Cancelled),
            other => Err(format!("unknown item status: {other}")),
        }
    }
}

/// A persisted request to publish one post to one platform at one time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduledItem {
    /// UUID v4 string, primary key.
    pub id: String,
    pub user_id: String,
    pub business_id: Option<String>,
    /// Linked content record, notified when the post goes out.
    pub content_id: Option<String>,
    /// Platform wire name. Validated on insert, re-parsed at dispatch.
    pub platform: String,
    pub post_text: String,
    pub media_url: Option<String>,
    pub platform_options: PlatformOptions,
    pub scheduled_for: DateTime<Utc>,
    pub status: ItemStatus,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub published_at: Option<DateTime<Utc>>,
    pub platform_post_id: Option<String>,
    pub platform_post_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduledItem {
    pub fn to_publish_request(&self, platform: Platform) -> PublishRequest {
        PublishRequest {
            item_id: self.id.clone(),
            user_id: self.user_id.clone(),
            business_id: self.business_id.clone(),
            platform,
            post_text: self.post_text.clone(),
            media_url: self.media_url.clone(),
            platform_options: self.platform_options.clone(),
        }
    }
}

/// Input to [`crate::store::ScheduledItemStore::create`]. Fields are
/// optional where the API layer may omit them; validation happens in the
/// store so nothing malformed is ever inserted.
#[derive(Debug, Clone, Default)]
pub struct NewSchedule {
    pub business_id: Option<String>,
    pub content_id: Option<String>,
    pub platform: String,
    pub post_text: String,
    pub media_url: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub platform_options: Option<PlatformOptions>,
}

/// Optional filters for listing a user's items. Bounds are inclusive.
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub status: Option<ItemStatus>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub business_id: Option<String>,
}

/// Counters returned by one sweep, for logs and alerting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub processed: usize,
    pub succeeded: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for s in [
            ItemStatus::Pending,
            ItemStatus::Processing,
            ItemStatus::Published,
            ItemStatus::Failed,
            ItemStatus::Cancelled,
        ] {
            assert_eq!(s.to_string().parse::<ItemStatus>().unwrap(), s);
        }
        assert!("done".parse::<ItemStatus>().is_err());
    }
}
