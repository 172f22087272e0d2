use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_PORT: u16 = 8787;
pub const DEFAULT_BIND: &str = "127.0.0.1";
/// Upper bound on items claimed by one sweep; the rest wait for the next tick.
pub const DEFAULT_BATCH_LIMIT: usize = 50;
pub const DEFAULT_CONCURRENCY: usize = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
/// Items left in `processing` longer than this are treated as interrupted.
pub const DEFAULT_STALE_AFTER_SECS: u64 = 900;
/// Tokens expiring within this window are refreshed ahead of use.
pub const DEFAULT_REFRESH_SKEW_SECS: i64 = 60;

/// Top-level config (herald.toml + HERALD_* env overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HeraldConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub google: GoogleConfig,
    #[serde(default)]
    pub aggregator: AggregatorConfig,
    #[serde(default)]
    pub cron: CronConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            bind: DEFAULT_BIND.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Sweep tuning. All limits apply per `process_due` invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_batch_limit")]
    pub batch_limit: usize,
    /// Maximum dispatches in flight at once within a sweep.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Deadline for every outbound call (token refresh and publish).
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_stale_after_secs")]
    pub stale_after_secs: u64,
    #[serde(default = "default_refresh_skew_secs")]
    pub refresh_skew_secs: i64,
    /// When set, `herald serve` triggers a sweep on this interval itself.
    /// Leave unset when an external cron calls /api/cron/publish.
    #[serde(default)]
    pub sweep_interval_secs: Option<u64>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            batch_limit: DEFAULT_BATCH_LIMIT,
            concurrency: DEFAULT_CONCURRENCY,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            refresh_skew_secs: DEFAULT_REFRESH_SKEW_SECS,
            sweep_interval_secs: None,
        }
    }
}

/// Google Business Profile, the direct-publish platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleConfig {
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    #[serde(default = "default_google_token_url")]
    pub token_url: String,
    /// Base for `/{location}/localPosts` (v4 API).
    #[serde(default = "default_google_posts_api_base")]
    pub posts_api_base: String,
    #[serde(default = "default_language_code")]
    pub language_code: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            token_url: default_google_token_url(),
            posts_api_base: default_google_posts_api_base(),
            language_code: default_language_code(),
        }
    }
}

/// Social-posting aggregator that fronts every non-direct platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Publishing to aggregator platforms is disabled while this is unset.
    pub api_key: Option<String>,
    #[serde(default = "default_aggregator_base_url")]
    pub base_url: String,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_aggregator_base_url(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CronConfig {
    /// Bearer secret required on /api/cron/publish. Unset means open.
    pub secret: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_batch_limit() -> usize {
    DEFAULT_BATCH_LIMIT
}
fn default_concurrency() -> usize {
    DEFAULT_CONCURRENCY
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_stale_after_secs() -> u64 {
    DEFAULT_STALE_AFTER_SECS
}
fn default_refresh_skew_secs() -> i64 {
    DEFAULT_REFRESH_SKEW_SECS
}
fn default_google_token_url() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}
fn default_google_posts_api_base() -> String {
    "https://mybusiness.googleapis.com/v4".to_string()
}
fn default_language_code() -> String {
    "en".to_string()
}
fn default_aggregator_base_url() -> String {
    "https://getlate.dev/api/v1".to_string()
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.herald/herald.db", home)
}

impl HeraldConfig {
    /// Load config from a TOML file with HERALD_* env var overrides.
    ///
    /// Path resolution: explicit argument, then `~/.herald/herald.toml`.
    /// Nested keys use a double underscore: `HERALD_CRON__SECRET`.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);
        debug!(path = %path, "loading config");

        Self::from_figment(
            Figment::new()
                .merge(Toml::file(&path))
                .merge(Env::prefixed("HERALD_").split("__")),
        )
    }

    pub fn from_figment(figment: Figment) -> crate::error::Result<Self> {
        figment
            .extract()
            .map_err(|e| crate::error::HeraldError::Config(e.to_string()))
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{}/.herald/herald.toml", home)
}
