use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user's connection to one platform family, including OAuth credentials
/// and the account identifiers needed to address the right resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Integration {
    pub id: i64,
    pub user_id: String,
    pub business_id: Option<String>,
    /// Family key, e.g. `google_business` or `late_aggregator`.
    pub platform: String,
    #[serde(skip_serializing)]
    pub access_token: Option<String>,
    #[serde(skip_serializing)]
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    /// Aggregator profile id, or the direct platform's account name.
    pub account_id: Option<String>,
    /// Direct platform location resource, e.g. `accounts/1/locations/2`.
    pub location_id: Option<String>,
    pub metadata: serde_json::Value,
    pub is_active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields supplied when a user connects (or reconnects) a platform.
#[derive(Debug, Clone, Default)]
pub struct NewIntegration {
    pub user_id: String,
    pub business_id: Option<String>,
    pub platform: String,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_expires_at: Option<DateTime<Utc>>,
    pub account_id: Option<String>,
    pub location_id: Option<String>,
    pub metadata: serde_json::Value,
}

/// Response of a successful `grant_type=refresh_token` exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Some providers rotate the refresh token; most keep the old one.
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// An access token that is safe to use right now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidToken {
    pub access_token: String,
    /// True when this call performed the refresh.
    pub refreshed: bool,
    pub expires_at: Option<DateTime<Utc>>,
}
