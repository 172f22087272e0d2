//! `herald-publish`: per-platform publish adapters.
//!
//! | Family       | Adapter                          | Auth                          |
//! |--------------|----------------------------------|-------------------------------|
//! | `Direct`     | [`google::GoogleBusinessAdapter`] | user OAuth token, refreshed on demand |
//! | `Aggregator` | [`aggregator::AggregatorAdapter`] | server API key + user profile id |
//!
//! Adapters never retry. Every outbound call shares one `reqwest::Client`
//! carrying the configured request timeout; see [`build_client`].

use std::time::Duration;

pub mod adapter;
pub mod aggregator;
pub mod google;
pub mod registry;

pub use adapter::{PublishAdapter, PublishError, PublishRequest, Published};
pub use aggregator::AggregatorAdapter;
pub use google::GoogleBusinessAdapter;
pub use registry::AdapterRegistry;

/// HTTP client for token refreshes and publish calls.
pub fn build_client(request_timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(request_timeout)
        .connect_timeout(request_timeout.min(Duration::from_secs(10)))
        .user_agent(concat!("herald/", env!("CARGO_PKG_VERSION")))
        .build()
}
