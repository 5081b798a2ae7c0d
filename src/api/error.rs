//! API error types with structured JSON responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::core_state::CoreError;
use crate::error::ClinicError;

/// Seconds a client should wait before retrying a `BUSY` response.
const BUSY_RETRY_AFTER_SECS: u64 = 1;

/// Structured error response body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict: Option<ConflictDetail>,
}

/// The appointment that blocked a booking or reschedule.
#[derive(Debug, Serialize)]
pub struct ConflictDetail {
    pub appointment_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

/// API-level errors with HTTP status mapping.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Clinic(#[from] ClinicError),
    #[error("Invalid request: {0}")]
    BadRequest(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let mut conflict = None;
        let (status, code, message) = match &self {
            ApiError::Clinic(err) => match err {
                ClinicError::Validation(_) => {
                    (StatusCode::BAD_REQUEST, "VALIDATION", err.to_string())
                }
                ClinicError::NotFound { .. } => (StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string()),
                ClinicError::SchedulingConflict {
                    conflicting_id,
                    conflicting_start,
                    conflicting_end,
                } => {
                    conflict = Some(ConflictDetail {
                        appointment_id: *conflicting_id,
                        start_at: *conflicting_start,
                        end_at: *conflicting_end,
                    });
                    (StatusCode::CONFLICT, "SCHEDULING_CONFLICT", err.to_string())
                }
                ClinicError::IllegalTransition { .. } => {
                    (StatusCode::CONFLICT, "ILLEGAL_TRANSITION", err.to_string())
                }
                ClinicError::InvalidCorrection(_) => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "INVALID_CORRECTION",
                    err.to_string(),
                ),
                ClinicError::VisitClosed(_) => (StatusCode::CONFLICT, "VISIT_CLOSED", err.to_string()),
                ClinicError::OutOfRange { .. } => (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    "OUT_OF_RANGE",
                    err.to_string(),
                ),
                ClinicError::Busy(_) => (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "BUSY",
                    "Storage is busy, retry shortly".to_string(),
                ),
                ClinicError::Database(e) => internal(&e.to_string()),
            },
            ApiError::BadRequest(detail) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", detail.clone()),
            ApiError::Internal(detail) => internal(detail),
        };

        let body = ErrorBody {
            error: ErrorDetail {
                code,
                message,
                conflict,
            },
        };

        let mut response = (status, Json(body)).into_response();
        if matches!(self, ApiError::Clinic(ClinicError::Busy(_))) {
            response.headers_mut().insert(
                axum::http::header::RETRY_AFTER,
                axum::http::HeaderValue::from(BUSY_RETRY_AFTER_SECS),
            );
        }
        response
    }
}

fn internal(detail: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(detail, "API internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL",
        "An internal error occurred".to_string(),
    )
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Database(e) => ApiError::Clinic(e.into()),
            CoreError::Io(e) => ApiError::Internal(e.to_string()),
        }
    }
}

impl From<crate::db::DatabaseError> for ApiError {
    fn from(err: crate::db::DatabaseError) -> Self {
        ApiError::Clinic(err.into())
    }
}
