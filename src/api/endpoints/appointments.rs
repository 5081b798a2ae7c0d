//! Appointment endpoints.
//!
//! - `POST /api/appointments`: book
//! - `GET /api/appointments/:id`: detail
//! - `GET /api/appointments/:id/history`: status and interval changes
//! - `POST /api/appointments/:id/transition`: status change
//! - `POST /api/appointments/:id/reschedule`: move to a new interval
//! - `GET /api/practitioners/:id/appointments`: practitioner schedule

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{Appointment, AppointmentEvent, AppointmentStatus, DateRange};
use crate::registry::SqliteRegistry;
use crate::scheduler::{self, NewAppointment};

#[derive(Deserialize)]
pub struct TransitionRequest {
    pub status: AppointmentStatus,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
}

#[derive(Deserialize)]
pub struct RescheduleRequest {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Serialize)]
pub struct AppointmentsResponse {
    pub appointments: Vec<Appointment>,
}

#[derive(Serialize)]
pub struct HistoryResponse {
    pub events: Vec<AppointmentEvent>,
}

/// `POST /api/appointments`
pub async fn create(
    State(ctx): State<ApiContext>,
    Json(req): Json<NewAppointment>,
) -> Result<(StatusCode, Json<Appointment>), ApiError> {
    let appointment = ctx
        .run(move |conn, _| scheduler::create_appointment(conn, &SqliteRegistry::new(conn), &req))
        .await?;
    Ok((StatusCode::CREATED, Json(appointment)))
}

/// `GET /api/appointments/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id)?;
    let appointment = ctx.run(move |conn, _| scheduler::get_appointment(conn, &id)).await?;
    Ok(Json(appointment))
}

/// `GET /api/appointments/:id/history`
pub async fn history(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let id = parse_id(&id)?;
    let events = ctx
        .run(move |conn, _| scheduler::appointment_history(conn, &id))
        .await?;
    Ok(Json(HistoryResponse { events }))
}

/// `POST /api/appointments/:id/transition`
pub async fn transition(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id)?;
    let appointment = ctx
        .run(move |conn, _| {
            scheduler::transition_appointment(conn, &id, req.status, req.cancellation_reason.as_deref())
        })
        .await?;
    Ok(Json(appointment))
}

/// `POST /api/appointments/:id/reschedule`
pub async fn reschedule(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(req): Json<RescheduleRequest>,
) -> Result<Json<Appointment>, ApiError> {
    let id = parse_id(&id)?;
    let appointment = ctx
        .run(move |conn, _| scheduler::reschedule_appointment(conn, &id, req.start_at, req.end_at))
        .await?;
    Ok(Json(appointment))
}

/// `GET /api/practitioners/:id/appointments?from=&to=`
pub async fn list_for_practitioner(
    State(ctx): State<ApiContext>,
    Path(practitioner_id): Path<String>,
    Query(range): Query<DateRange>,
) -> Result<Json<AppointmentsResponse>, ApiError> {
    let practitioner_id = parse_id(&practitioner_id)?;
    let appointments = ctx
        .run(move |conn, _| scheduler::list_appointments(conn, &practitioner_id, &range))
        .await?;
    Ok(Json(AppointmentsResponse { appointments }))
}
