//! Schedule management for the signed-in user: `/api/schedule`.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    Json,
};
use chrono::{DateTime, Utc};
use herald_core::time::parse_ts;
use herald_scheduler::{ItemStatus, ListFilter, NewSchedule};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{bad_request, scheduler_error, user_id, ApiError};
use crate::app::AppState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListQuery {
    status: Option<String>,
    from: Option<String>,
    to: Option<String>,
    business_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleBody {
    business_id: Option<String>,
    content_id: Option<String>,
    #[serde(default)]
    platform: String,
    #[serde(default)]
    post_text: String,
    media_url: Option<String>,
    scheduled_for: Option<String>,
    platform_options: Option<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelBody {
    schedule_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleBody {
    scheduled_for: Option<String>,
}

fn timestamp(field: &str, value: Option<&str>) -> Result<Option<DateTime<Utc>>, ApiError> {
    value
        .map(|v| parse_ts(v).map_err(|_| bad_request(format!("{field} must be an RFC 3339 timestamp"))))
        .transpose()
}

/// GET /api/schedule
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<ListQuery>,
) -> Result<Json<Value>, ApiError> {
    let user = user_id(&headers)?;
    let status = query
        .status
        .as_deref()
        .map(|s| s.parse::<ItemStatus>().map_err(bad_request))
        .transpose()?;
    let filter = ListFilter {
        status,
        from: timestamp("from", query.from.as_deref())?,
        to: timestamp("to", query.to.as_deref())?,
        business_id: query.business_id,
    };
    let items = state
        .scheduler
        .list(&user, &filter)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "items": items })))
}

/// GET /api/schedule/{id}
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let user = user_id(&headers)?;
    let item = state.scheduler.get(&user, &id).map_err(scheduler_error)?;
    Ok(Json(json!(item)))
}

/// POST /api/schedule
pub async fn create_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<ScheduleBody>,
) -> Result<Json<Value>, ApiError> {
    let user = user_id(&headers)?;
    let new = NewSchedule {
        business_id: body.business_id,
        content_id: body.content_id,
        platform: body.platform,
        post_text: body.post_text,
        media_url: body.media_url,
        scheduled_for: timestamp("scheduledFor", body.scheduled_for.as_deref())?,
        platform_options: body.platform_options,
    };
    let item = state
        .scheduler
        .schedule(&user, new)
        .await
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "success": true, "scheduleId": item.id })))
}

/// DELETE /api/schedule
pub async fn cancel_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<CancelBody>,
) -> Result<Json<Value>, ApiError> {
    let user = user_id(&headers)?;
    let id = body
        .schedule_id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| bad_request("scheduleId required"))?;
    state
        .scheduler
        .cancel(&user, &id)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "success": true })))
}

/// POST /api/schedule/{id}/reschedule
pub async fn reschedule_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<RescheduleBody>,
) -> Result<Json<Value>, ApiError> {
    let user = user_id(&headers)?;
    let new_time = timestamp("scheduledFor", body.scheduled_for.as_deref())?
        .ok_or_else(|| bad_request("scheduledFor required"))?;
    state
        .scheduler
        .reschedule(&user, &id, new_time)
        .map_err(scheduler_error)?;
    Ok(Json(json!({ "success": true })))
}
