//! `herald-integrations`: stored platform credentials and the OAuth refresh
//! flow the publish adapters depend on.
//!
//! [`store::IntegrationStore`] owns the `user_integrations` table.
//! [`tokens::TokenRefresher`] turns a stored credential into an access token
//! that is valid right now, refreshing through a [`oauth::TokenEndpoint`] and
//! persisting the result immediately. Refreshes are de-duplicated per
//! credential for the lifetime of a [`tokens::TokenCache`] (one sweep).

pub mod db;
pub mod error;
pub mod oauth;
pub mod store;
pub mod tokens;
pub mod types;

pub use error::{IntegrationError, Result};
pub use oauth::{GoogleTokenEndpoint, TokenEndpoint};
pub use store::IntegrationStore;
pub use tokens::{TokenCache, TokenRefresher};
pub use types::{Integration, NewIntegration, TokenGrant, ValidToken};
