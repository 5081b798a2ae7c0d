//! Vitals endpoints.
//!
//! - `POST /api/visits/:id/vitals`: record a snapshot
//! - `GET /api/visits/:id/vitals`: chronological readings

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::models::VitalReading;
use crate::registry::SqliteRegistry;
use crate::vitals::{self, NewVitals};

#[derive(Serialize)]
pub struct VitalsResponse {
    pub readings: Vec<VitalReading>,
}

/// `POST /api/visits/:id/vitals`
pub async fn record(
    State(ctx): State<ApiContext>,
    Path(visit_id): Path<String>,
    Json(req): Json<NewVitals>,
) -> Result<(StatusCode, Json<VitalReading>), ApiError> {
    let visit_id = parse_id(&visit_id)?;
    let reading = ctx
        .run(move |conn, _| vitals::record_vitals(conn, &SqliteRegistry::new(conn), &visit_id, &req))
        .await?;
    Ok((StatusCode::CREATED, Json(reading)))
}

/// `GET /api/visits/:id/vitals`
pub async fn list(
    State(ctx): State<ApiContext>,
    Path(visit_id): Path<String>,
) -> Result<Json<VitalsResponse>, ApiError> {
    let visit_id = parse_id(&visit_id)?;
    let readings = ctx.run(move |conn, _| vitals::list_vitals(conn, &visit_id)).await?;
    Ok(Json(VitalsResponse { readings }))
}
