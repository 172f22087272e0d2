pub mod cron;
pub mod health;
pub mod schedule;

use axum::{
    http::{HeaderMap, StatusCode},
    Json,
};
use herald_scheduler::SchedulerError;
use serde_json::{json, Value};
use tracing::error;

pub type ApiError = (StatusCode, Json<Value>);

/// Header carrying the caller's user id, set by the auth layer in front of
/// this service.
pub const USER_ID_HEADER: &str = "x-user-id";

pub fn user_id(headers: &HeaderMap) -> Result<String, ApiError> {
    headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(String::from)
        .ok_or_else(|| {
            (
                StatusCode::UNAUTHORIZED,
                Json(json!({"error": "Unauthorized"})),
            )
        })
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message.into(), "code": "VALIDATION_ERROR"})),
    )
}

/// Map a scheduler error onto an HTTP status and `{error, code}` body.
pub fn scheduler_error(e: SchedulerError) -> ApiError {
    let status = match &e {
        SchedulerError::Validation(_) => StatusCode::BAD_REQUEST,
        SchedulerError::NotFound { .. } => StatusCode::NOT_FOUND,
        SchedulerError::InvalidTransition { .. } => StatusCode::CONFLICT,
        SchedulerError::Database(_)
        | SchedulerError::Serialization(_)
        | SchedulerError::LockPoisoned => {
            error!(error = %e, "scheduler request failed");
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "internal error", "code": e.code()})),
            );
        }
    };
    (status, Json(json!({"error": e.to_string(), "code": e.code()})))
}
