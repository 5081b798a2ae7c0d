//! Vitals recorder: immutable measurement snapshots per visit.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, repository, timestamp};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{VitalMeasurements, VitalReading, VisitStatus};
use crate::registry::IdentityRegistry;

/// Accepted range per measurement. Scores use their clinical scales; the
/// physiological limits only reject values no animal can present.
const BOUNDS: [(&str, f64, f64); 6] = [
    ("weight_kg", 0.001, 10_000.0),
    ("temperature_c", 20.0, 46.0),
    ("heart_rate_bpm", 1.0, 1_000.0),
    ("respiratory_rate", 1.0, 300.0),
    ("body_condition_score", 1.0, 9.0),
    ("pain_score", 0.0, 10.0),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewVitals {
    pub recorder_id: Uuid,
    #[serde(flatten)]
    pub measurements: VitalMeasurements,
}

fn check_bounds(m: &VitalMeasurements) -> ClinicResult<()> {
    if m.is_empty() {
        return Err(ClinicError::Validation(
            "at least one measurement is required".into(),
        ));
    }
    let values = [
        m.weight_kg,
        m.temperature_c,
        m.heart_rate_bpm.map(|v| v as f64),
        m.respiratory_rate.map(|v| v as f64),
        m.body_condition_score.map(|v| v as f64),
        m.pain_score.map(|v| v as f64),
    ];
    for ((field, min, max), value) in BOUNDS.iter().zip(values) {
        let Some(value) = value else { continue };
        if !value.is_finite() {
            return Err(ClinicError::Validation(format!("{field} must be a finite number")));
        }
        if value < *min || value > *max {
            return Err(ClinicError::OutOfRange {
                field: *field,
                value,
                min: *min,
                max: *max,
            });
        }
    }
    Ok(())
}

/// Record one snapshot against an open or in-progress visit.
pub fn record_vitals<R: IdentityRegistry + ?Sized>(
    conn: &Connection,
    registry: &R,
    visit_id: &Uuid,
    req: &NewVitals,
) -> ClinicResult<VitalReading> {
    check_bounds(&req.measurements)?;

    let tx = db::begin_write(conn)?;
    let visit = repository::get_visit(&tx, visit_id)?
        .ok_or_else(|| ClinicError::not_found("visit", visit_id))?;
    if visit.status == VisitStatus::Completed {
        return Err(ClinicError::VisitClosed(*visit_id));
    }
    registry.resolve_practitioner(&req.recorder_id)?;

    let mut reading = VitalReading {
        id: Uuid::new_v4(),
        seq: 0,
        visit_id: *visit_id,
        recorder_id: req.recorder_id,
        measurements: req.measurements.clone(),
        recorded_at: timestamp::now(),
    };
    reading.seq = repository::insert_vital_reading(&tx, &reading)?;
    tx.commit()?;

    tracing::info!(reading_id = %reading.id, visit_id = %visit_id, "Vitals recorded");
    Ok(reading)
}

/// All readings of a visit, oldest first.
pub fn list_vitals(conn: &Connection, visit_id: &Uuid) -> ClinicResult<Vec<VitalReading>> {
    repository::get_visit(conn, visit_id)?.ok_or_else(|| ClinicError::not_found("visit", visit_id))?;
    Ok(repository::get_vitals_for_visit(conn, visit_id)?)
}
