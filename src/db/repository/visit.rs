use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_column, optional_enum_column, optional_uuid_column, uuid_column};
use crate::db::timestamp;
use crate::db::DatabaseError;
use crate::models::{Visit, VisitEvent, VisitStatus};

const VISIT_COLUMNS: &str = "id, patient_id, client_id, practitioner_id, appointment_id, status,
     chief_complaint, opened_at, completed_at";

pub fn insert_visit(conn: &Connection, v: &Visit) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO visits (id, patient_id, client_id, practitioner_id, appointment_id, status,
                             chief_complaint, opened_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            v.id.to_string(),
            v.patient_id.to_string(),
            v.client_id.to_string(),
            v.practitioner_id.to_string(),
            v.appointment_id.map(|id| id.to_string()),
            v.status.as_str(),
            v.chief_complaint,
            timestamp::to_db(&v.opened_at),
            v.completed_at.as_ref().map(timestamp::to_db),
        ],
    )?;
    Ok(())
}

pub fn get_visit(conn: &Connection, id: &Uuid) -> Result<Option<Visit>, DatabaseError> {
    let sql = format!("SELECT {VISIT_COLUMNS} FROM visits WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_visit)
        .optional()
        .map_err(DatabaseError::from)
}

/// The visit opened from `appointment_id`, if any.
pub fn get_visit_for_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Option<Visit>, DatabaseError> {
    let sql = format!("SELECT {VISIT_COLUMNS} FROM visits WHERE appointment_id = ?1");
    conn.query_row(&sql, params![appointment_id.to_string()], row_to_visit)
        .optional()
        .map_err(DatabaseError::from)
}

/// Visits not yet completed, oldest first.
pub fn get_open_visits(conn: &Connection) -> Result<Vec<Visit>, DatabaseError> {
    let sql = format!(
        "SELECT {VISIT_COLUMNS} FROM visits
         WHERE status != 'completed'
         ORDER BY opened_at ASC, id ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], row_to_visit)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Move a visit forward. Completed visits are never touched.
pub fn update_visit_status(
    conn: &Connection,
    id: &Uuid,
    status: VisitStatus,
    completed_at: Option<&DateTime<Utc>>,
) -> Result<(), DatabaseError> {
    let affected = conn.execute(
        "UPDATE visits SET status = ?2, completed_at = ?3
         WHERE id = ?1 AND status != 'completed'",
        params![
            id.to_string(),
            status.as_str(),
            completed_at.map(timestamp::to_db),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "visit {id} is missing or completed"
        )));
    }
    Ok(())
}

pub fn insert_visit_event(
    conn: &Connection,
    visit_id: &Uuid,
    from_status: Option<VisitStatus>,
    to_status: VisitStatus,
    recorded_at: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO visit_events (visit_id, from_status, to_status, recorded_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            visit_id.to_string(),
            from_status.map(|s| s.as_str()),
            to_status.as_str(),
            timestamp::to_db(recorded_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_visit_events(conn: &Connection, visit_id: &Uuid) -> Result<Vec<VisitEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, visit_id, from_status, to_status, recorded_at
         FROM visit_events WHERE visit_id = ?1 ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![visit_id.to_string()], |row| {
        Ok(VisitEvent {
            seq: row.get(0)?,
            visit_id: uuid_column(row, 1)?,
            from_status: optional_enum_column(row, 2)?,
            to_status: enum_column(row, 3)?,
            recorded_at: timestamp::column(row, 4)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_visit(row: &rusqlite::Row) -> Result<Visit, rusqlite::Error> {
    Ok(Visit {
        id: uuid_column(row, 0)?,
        patient_id: uuid_column(row, 1)?,
        client_id: uuid_column(row, 2)?,
        practitioner_id: uuid_column(row, 3)?,
        appointment_id: optional_uuid_column(row, 4)?,
        status: enum_column(row, 5)?,
        chief_complaint: row.get(6)?,
        opened_at: timestamp::column(row, 7)?,
        completed_at: timestamp::optional_column(row, 8)?,
    })
}
