//! Sweep trigger for an external scheduler: GET|POST /api/cron/publish.

use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chrono::Utc;
use herald_core::time::format_ts;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use super::ApiError;
use crate::app::AppState;

/// Runs one sweep. When `cron.secret` is configured the caller must send it
/// as a bearer token.
pub async fn publish_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<Value>, ApiError> {
    if let Some(secret) = state.config.cron.secret.as_deref() {
        verify_bearer_token(&headers, secret).map_err(|e| {
            warn!(reason = %e, "cron trigger rejected");
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Unauthorized"})),
            )
        })?;
    }

    let now = Utc::now();
    let report = state.scheduler.process_due(now).await.map_err(|e| {
        error!(error = %e, "sweep aborted");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": e.to_string(), "code": e.code()})),
        )
    })?;
    info!(
        processed = report.processed,
        succeeded = report.succeeded,
        failed = report.failed,
        "cron sweep complete"
    );

    Ok(Json(json!({
        "success": true,
        "processed": report.processed,
        "succeeded": report.succeeded,
        "failed": report.failed,
        "processedAt": format_ts(now),
    })))
}

fn verify_bearer_token(headers: &HeaderMap, expected: &str) -> Result<(), String> {
    let auth_header = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| "missing Authorization header".to_string())?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| "Authorization header must use Bearer scheme".to_string())?;

    if token == expected {
        Ok(())
    } else {
        Err("bearer token mismatch".to_string())
    }
}
