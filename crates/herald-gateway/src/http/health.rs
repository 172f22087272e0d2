use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::app::AppState;

/// GET /health: liveness check, returns server metadata.
pub async fn health_handler(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "aggregator_configured": state.config.aggregator.api_key.is_some(),
        "google_configured": state.config.google.client_id.is_some(),
        "cron_protected": state.config.cron.secret.is_some(),
    }))
}
