//! API error types and helpers.
//!
//! # Purpose and responsibility
//! Keeps error bodies uniform across the monitor endpoints and maps admission
//! failures onto HTTP status codes.
//!
//! # Key invariants and assumptions
//! - Every error body carries a stable `code` and a human-readable `message`.
//! - Admission failures keep their classification as the `code`, except store
//!   version conflicts, which are reported as `version_conflict` with 409.
use crate::admission::{AdmissionError, ErrorKind};
use crate::api::types::ErrorResponse;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use jobstore::StoreError;

/// Structured API error returned by handlers.
///
/// # Invariants
/// - `status` must match the semantics of `body.code`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorResponse,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        (self.status, Json(self.body)).into_response()
    }
}

fn api_error(status: StatusCode, code: &str, message: &str) -> ApiError {
    ApiError {
        status,
        body: ErrorResponse {
            code: code.to_string(),
            message: message.to_string(),
            resource: None,
            request_id: None,
        },
    }
}

/// Build a 404 Not Found error.
pub fn api_not_found(message: &str) -> ApiError {
    api_error(StatusCode::NOT_FOUND, "not_found", message)
}

/// Build a 409 Conflict error with a caller-provided code.
pub fn api_conflict(code: &str, message: &str) -> ApiError {
    api_error(StatusCode::CONFLICT, code, message)
}

/// Build a 500 error from a store failure.
///
/// The store detail is logged server-side and also returned, since callers
/// need it to tell operational failures apart.
pub fn api_internal(message: &str, err: &StoreError) -> ApiError {
    tracing::error!(error = ?err, "monitor storage error");
    api_error(
        StatusCode::INTERNAL_SERVER_ERROR,
        "internal",
        &format!("{message}: {err}"),
    )
}

/// Build a 403 Forbidden error naming the offending resource.
pub fn api_forbidden(message: &str, resource: &str) -> ApiError {
    let mut err = api_error(StatusCode::FORBIDDEN, "forbidden", message);
    err.body.resource = Some(resource.to_string());
    err
}

/// Build a 400 Bad Request validation error.
pub fn api_validation_error(message: &str) -> ApiError {
    api_error(StatusCode::BAD_REQUEST, "validation", message)
}

impl From<AdmissionError> for ApiError {
    fn from(err: AdmissionError) -> Self {
        let message = err.to_string();
        if err.is_version_conflict() {
            return api_conflict("version_conflict", &message);
        }
        match err {
            AdmissionError::Forbidden { message, resource } => api_forbidden(&message, &resource),
            other => {
                let kind = other.kind();
                let status = match kind {
                    ErrorKind::Validation | ErrorKind::CapacityExceeded => StatusCode::BAD_REQUEST,
                    ErrorKind::Forbidden => StatusCode::FORBIDDEN,
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
                };
                api_error(status, kind.as_str(), &message)
            }
        }
    }
}
