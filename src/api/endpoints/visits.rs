//! Visit endpoints.
//!
//! - `POST /api/visits`: open (walk-in or from an appointment)
//! - `GET /api/visits/:id`: detail
//! - `GET /api/visits/:id/history`: status changes
//! - `GET /api/open-visits`: visits not yet completed
//! - `POST /api/visits/:id/advance`: move forward
//! - `POST /api/visits/:id/complete`: close

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::{Visit, VisitEvent, VisitStatus};
use crate::registry::SqliteRegistry;
use crate::visits::{self, OpenVisitRequest, VisitOutcome};

#[derive(Deserialize)]
pub struct AdvanceRequest {
    pub status: VisitStatus,
}

#[derive(Serialize)]
pub struct VisitsResponse {
    pub visits: Vec<Visit>,
}

#[derive(Serialize)]
pub struct VisitHistoryResponse {
    pub events: Vec<VisitEvent>,
}

/// `POST /api/visits`
pub async fn open(
    State(ctx): State<ApiContext>,
    Json(req): Json<OpenVisitRequest>,
) -> Result<(StatusCode, Json<VisitOutcome>), ApiError> {
    let outcome = ctx
        .run(move |conn, _| visits::open_visit(conn, &SqliteRegistry::new(conn), &req))
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// `GET /api/visits/:id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<Visit>, ApiError> {
    let id = parse_id(&id)?;
    let visit = ctx.run(move |conn, _| visits::get_visit(conn, &id)).await?;
    Ok(Json(visit))
}

/// `GET /api/visits/:id/history`
pub async fn history(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<VisitHistoryResponse>, ApiError> {
    let id = parse_id(&id)?;
    let events = ctx.run(move |conn, _| visits::visit_history(conn, &id)).await?;
    Ok(Json(VisitHistoryResponse { events }))
}

/// `GET /api/open-visits`
pub async fn list_open(State(ctx): State<ApiContext>) -> Result<Json<VisitsResponse>, ApiError> {
    let visits = ctx.run(|conn, _| visits::list_open_visits(conn)).await?;
    Ok(Json(VisitsResponse { visits }))
}

/// `POST /api/visits/:id/advance`
pub async fn advance(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<VisitOutcome>, ApiError> {
    let id = parse_id(&id)?;
    let outcome = ctx
        .run(move |conn, policy| visits::advance_visit(conn, &id, req.status, policy))
        .await?;
    Ok(Json(outcome))
}

/// `POST /api/visits/:id/complete`
pub async fn complete(
    State(ctx): State<ApiContext>,
    Path(id): Path<String>,
) -> Result<Json<VisitOutcome>, ApiError> {
    let id = parse_id(&id)?;
    let outcome = ctx
        .run(move |conn, policy| visits::complete_visit(conn, &id, policy))
        .await?;
    Ok(Json(outcome))
}
