use std::sync::Arc;
use std::time::Duration;

use axum::{
    routing::{get, post},
    Router,
};
use herald_core::HeraldConfig;
use herald_integrations::{GoogleTokenEndpoint, IntegrationStore, TokenRefresher};
use herald_publish::{build_client, AdapterRegistry, AggregatorAdapter, GoogleBusinessAdapter};
use herald_scheduler::{ScheduledItemStore, SchedulerService, SqliteContentStatus, SweepConfig};
use rusqlite::Connection;

/// Central shared state, passed as `Arc<AppState>` to all Axum handlers.
pub struct AppState {
    pub config: HeraldConfig,
    pub scheduler: SchedulerService,
}

impl AppState {
    /// Wire every subsystem. `open` is called once per subsystem so each
    /// gets its own SQLite connection.
    pub fn build(
        config: HeraldConfig,
        open: impl Fn() -> rusqlite::Result<Connection>,
    ) -> anyhow::Result<Self> {
        let client = build_client(Duration::from_secs(config.scheduler.request_timeout_secs))?;

        let integrations = Arc::new(IntegrationStore::new(open()?)?);
        let endpoint = Arc::new(GoogleTokenEndpoint::new(client.clone(), &config.google));
        let refresher = Arc::new(TokenRefresher::new(
            integrations.clone(),
            endpoint,
            config.scheduler.refresh_skew_secs,
        ));
        let adapters = AdapterRegistry::new(
            Arc::new(GoogleBusinessAdapter::new(
                client.clone(),
                &config.google,
                refresher,
            )),
            Arc::new(AggregatorAdapter::new(
                client,
                &config.aggregator,
                integrations,
            )),
        );

        let store = Arc::new(ScheduledItemStore::new(open()?)?);
        let content = Arc::new(SqliteContentStatus::new(open()?)?);
        let scheduler = SchedulerService::new(
            store,
            adapters,
            content,
            SweepConfig::from(&config.scheduler),
        );

        Ok(Self { config, scheduler })
    }
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route(
            "/api/schedule",
            get(crate::http::schedule::list_handler)
                .post(crate::http::schedule::create_handler)
                .delete(crate::http::schedule::cancel_handler),
        )
        .route(
            "/api/schedule/{id}",
            get(crate::http::schedule::get_handler),
        )
        .route(
            "/api/schedule/{id}/reschedule",
            post(crate::http::schedule::reschedule_handler),
        )
        .route(
            "/api/cron/publish",
            get(crate::http::cron::publish_handler).post(crate::http::cron::publish_handler),
        )
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

#[cfg(test)]
pub(crate) fn test_state(config: HeraldConfig) -> Arc<AppState> {
    Arc::new(AppState::build(config, Connection::open_in_memory).unwrap())
}
