use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::HeraldError;

/// How a platform is reached: through its own API, or through the aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformFamily {
    Direct,
    Aggregator,
}

impl PlatformFamily {
    /// `platform` column value of the integration row that holds this
    /// family's credentials.
    pub fn integration_key(&self) -> &'static str {
        match self {
            PlatformFamily::Direct => "google_business",
            PlatformFamily::Aggregator => "late_aggregator",
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlatformFamily::Direct => write!(f, "direct"),
            PlatformFamily::Aggregator => write!(f, "aggregator"),
        }
    }
}

/// Every publish target the pipeline knows about.
///
/// Parsed once at the API boundary; rows holding a string that no longer
/// parses are failed at dispatch time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Platform {
    /// Google Business Profile, published through its own API.
    GoogleBusiness,
    Facebook,
    Instagram,
    LinkedIn,
    Twitter,
    TikTok,
    YouTube,
    Threads,
    Reddit,
    Pinterest,
    Bluesky,
    Telegram,
    Snapchat,
}

impl Platform {
    pub const ALL: [Platform; 13] = [
        Platform::GoogleBusiness,
        Platform::Facebook,
        Platform::Instagram,
        Platform::LinkedIn,
        Platform::Twitter,
        Platform::TikTok,
        Platform::YouTube,
        Platform::Threads,
        Platform::Reddit,
        Platform::Pinterest,
        Platform::Bluesky,
        Platform::Telegram,
        Platform::Snapchat,
    ];

    /// Canonical wire name, stored in the `platform` column and sent to the
    /// aggregator as the target platform.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::GoogleBusiness => "gmb",
            Platform::Facebook => "facebook",
            Platform::Instagram => "instagram",
            Platform::LinkedIn => "linkedin",
            Platform::Twitter => "twitter",
            Platform::TikTok => "tiktok",
            Platform::YouTube => "youtube",
            Platform::Threads => "threads",
            Platform::Reddit => "reddit",
            Platform::Pinterest => "pinterest",
            Platform::Bluesky => "bluesky",
            Platform::Telegram => "telegram",
            Platform::Snapchat => "snapchat",
        }
    }

    pub fn family(&self) -> PlatformFamily {
        match self {
            Platform::GoogleBusiness => PlatformFamily::Direct,
            _ => PlatformFamily::Aggregator,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = HeraldError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "gmb" | "google_business" | "googlebusiness" => Ok(Platform::GoogleBusiness),
            // "x" is the aggregator's newer name for the same network.
            "twitter" | "x" => Ok(Platform::Twitter),
            other => Platform::ALL
                .iter()
                .copied()
                .find(|p| p.as_str() == other)
                .ok_or_else(|| HeraldError::UnknownPlatform(s.to_string())),
        }
    }
}

impl TryFrom<String> for Platform {
    type Error = HeraldError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Platform> for String {
    fn from(p: Platform) -> Self {
        p.as_str().to_string()
    }
}
