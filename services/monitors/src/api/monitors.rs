//! Monitor API handlers.
//!
//! # Purpose
//! Translates REST calls into admission requests and reads stored monitors
//! back with their revision metadata.
//!
//! # Key invariants and assumptions
//! - Enable times are normalized here, before admission: an enabled monitor
//!   without a time gets the current time, a disabled monitor never keeps one.
//! - Create answers 201 and update answers 200; both bodies report the
//!   `created` status.
use crate::api::error::{ApiError, api_internal, api_not_found, api_validation_error};
use crate::api::types::{MonitorDocument, MonitorWriteParams};
use crate::app::AppState;
use crate::model::document::monitor_from_source;
use crate::model::{IndexMonitorResponse, Monitor, MonitorRequest};
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use std::time::{SystemTime, UNIX_EPOCH};

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

fn build_request(
    request: MonitorRequest,
    params: &MonitorWriteParams,
) -> Result<MonitorRequest, ApiError> {
    let revision = params
        .revision()
        .map_err(|err| api_validation_error(&err))?;
    let refresh = params
        .refresh_policy()
        .map_err(|err| api_validation_error(&err))?;
    let timeout = params.timeout().map_err(|err| api_validation_error(&err))?;
    Ok(request
        .with_revision(revision)
        .with_refresh(refresh)
        .with_timeout(timeout))
}

#[utoipa::path(
    post,
    path = "/v1/monitors",
    tag = "monitors",
    params(
        ("refresh" = Option<String>, Query, description = "Visibility policy: true, false or wait_for"),
        ("timeout_ms" = Option<u64>, Query, description = "Timeout for read-side store calls")
    ),
    request_body = Monitor,
    responses(
        (status = 201, description = "Monitor created", body = IndexMonitorResponse),
        (status = 400, description = "Invalid monitor or quota exceeded", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Source index or destination not permitted", body = crate::api::types::ErrorResponse),
        (status = 500, description = "Store failure", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn create_monitor(
    State(state): State<AppState>,
    Query(params): Query<MonitorWriteParams>,
    Json(mut monitor): Json<Monitor>,
) -> Result<impl IntoResponse, ApiError> {
    monitor.normalize_enabled_time(now_millis());
    let request = build_request(MonitorRequest::create(monitor), &params)?;
    let response = state.admission.admit(request).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[utoipa::path(
    put,
    path = "/v1/monitors/{monitor_id}",
    tag = "monitors",
    params(
        ("monitor_id" = String, Path, description = "Monitor identifier"),
        ("if_seq_no" = Option<i64>, Query, description = "Expected sequence number"),
        ("if_primary_term" = Option<u64>, Query, description = "Expected primary term"),
        ("refresh" = Option<String>, Query, description = "Visibility policy: true, false or wait_for"),
        ("timeout_ms" = Option<u64>, Query, description = "Timeout for read-side store calls")
    ),
    request_body = Monitor,
    responses(
        (status = 200, description = "Monitor updated", body = IndexMonitorResponse),
        (status = 400, description = "Invalid monitor", body = crate::api::types::ErrorResponse),
        (status = 403, description = "Source index or destination not permitted", body = crate::api::types::ErrorResponse),
        (status = 404, description = "Monitor not found", body = crate::api::types::ErrorResponse),
        (status = 409, description = "Revision is stale", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn update_monitor(
    Path(monitor_id): Path<String>,
    State(state): State<AppState>,
    Query(params): Query<MonitorWriteParams>,
    Json(mut monitor): Json<Monitor>,
) -> Result<Json<IndexMonitorResponse>, ApiError> {
    monitor.normalize_enabled_time(now_millis());
    let request = build_request(MonitorRequest::update(monitor_id, monitor), &params)?;
    let response = state.admission.admit(request).await?;
    Ok(Json(response))
}

#[utoipa::path(
    get,
    path = "/v1/monitors/{monitor_id}",
    tag = "monitors",
    params(
        ("monitor_id" = String, Path, description = "Monitor identifier")
    ),
    responses(
        (status = 200, description = "Fetch monitor", body = MonitorDocument),
        (status = 404, description = "Monitor not found", body = crate::api::types::ErrorResponse)
    )
)]
pub(crate) async fn get_monitor(
    Path(monitor_id): Path<String>,
    State(state): State<AppState>,
) -> Result<Json<MonitorDocument>, ApiError> {
    let index = state.admission.index();
    let exists = state
        .store
        .index_exists(index)
        .await
        .map_err(|err| api_internal("failed to check monitor index", &err))?;
    let missing = format!("Monitor with {monitor_id} is not found");
    if !exists {
        return Err(api_not_found(&missing));
    }
    let document = state
        .store
        .get(index, &monitor_id)
        .await
        .map_err(|err| api_internal("failed to fetch monitor", &err))?
        .ok_or_else(|| api_not_found(&missing))?;
    let monitor = monitor_from_source(&document.source).map_err(|err| {
        tracing::warn!(monitor_id = %monitor_id, error = %err, "stored document is not a monitor");
        api_not_found(&missing)
    })?;
    Ok(Json(MonitorDocument {
        id: document.id,
        version: document.version,
        seq_no: document.seq_no,
        primary_term: document.primary_term,
        monitor,
    }))
}
