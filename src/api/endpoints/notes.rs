//! Clinical note endpoints. Append and read only; there is no route that
//! edits or removes a note, so `PUT`/`PATCH`/`DELETE` answer 405.
//!
//! - `POST /api/visits/:id/notes`: append a note or correction
//! - `GET /api/visits/:id/notes`: resolved view, one entry per lineage
//! - `GET /api/visits/:id/notes/raw`: full history
//! - `GET /api/visits/:id/notes/verify`: content hash check
//! - `GET /api/visits/:id/notes/:note_id`: single note

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use super::parse_id;
use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::config::CorrectionResolution;
use crate::ledger::{self, LedgerVerification, Lineage, NewNote};
use crate::models::ClinicalNote;
use crate::registry::SqliteRegistry;

#[derive(Deserialize)]
pub struct ResolveQuery {
    /// Overrides the configured resolution for this request.
    pub resolution: Option<CorrectionResolution>,
}

#[derive(Serialize)]
pub struct ResolvedNotesResponse {
    pub resolution: CorrectionResolution,
    pub lineages: Vec<Lineage>,
}

#[derive(Serialize)]
pub struct RawNotesResponse {
    pub notes: Vec<ClinicalNote>,
}

/// `POST /api/visits/:id/notes`
pub async fn append(
    State(ctx): State<ApiContext>,
    Path(visit_id): Path<String>,
    Json(req): Json<NewNote>,
) -> Result<(StatusCode, Json<ClinicalNote>), ApiError> {
    let visit_id = parse_id(&visit_id)?;
    let note = ctx
        .run(move |conn, policy| {
            ledger::append_note(conn, &SqliteRegistry::new(conn), &visit_id, &req, policy)
        })
        .await?;
    Ok((StatusCode::CREATED, Json(note)))
}

/// `GET /api/visits/:id/notes`
pub async fn resolved(
    State(ctx): State<ApiContext>,
    Path(visit_id): Path<String>,
    Query(query): Query<ResolveQuery>,
) -> Result<Json<ResolvedNotesResponse>, ApiError> {
    let visit_id = parse_id(&visit_id)?;
    let resolution = query
        .resolution
        .unwrap_or(ctx.core.policy.correction_resolution);
    let lineages = ctx
        .run(move |conn, _| ledger::list_notes(conn, &visit_id, resolution))
        .await?;
    Ok(Json(ResolvedNotesResponse {
        resolution,
        lineages,
    }))
}

/// `GET /api/visits/:id/notes/raw`
pub async fn raw(
    State(ctx): State<ApiContext>,
    Path(visit_id): Path<String>,
) -> Result<Json<RawNotesResponse>, ApiError> {
    let visit_id = parse_id(&visit_id)?;
    let notes = ctx
        .run(move |conn, _| ledger::list_notes_raw(conn, &visit_id))
        .await?;
    Ok(Json(RawNotesResponse { notes }))
}

/// `GET /api/visits/:id/notes/verify`
pub async fn verify(
    State(ctx): State<ApiContext>,
    Path(visit_id): Path<String>,
) -> Result<Json<LedgerVerification>, ApiError> {
    let visit_id = parse_id(&visit_id)?;
    let report = ctx
        .run(move |conn, _| ledger::verify_ledger(conn, &visit_id))
        .await?;
    Ok(Json(report))
}

/// `GET /api/visits/:id/notes/:note_id`
pub async fn detail(
    State(ctx): State<ApiContext>,
    Path((visit_id, note_id)): Path<(String, String)>,
) -> Result<Json<ClinicalNote>, ApiError> {
    let visit_id = parse_id(&visit_id)?;
    let note_id = parse_id(&note_id)?;
    let note = ctx
        .run(move |conn, _| ledger::get_note(conn, &visit_id, &note_id))
        .await?;
    Ok(Json(note))
}
