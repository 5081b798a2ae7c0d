use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_column, optional_enum_column, uuid_column};
use crate::db::timestamp;
use crate::db::DatabaseError;
use crate::models::{
    Appointment, AppointmentEvent, AppointmentEventKind, AppointmentStatus, DateRange,
    TimeInterval,
};

const APPOINTMENT_COLUMNS: &str = "id, practitioner_id, client_id, patient_id, start_at, end_at,
     appointment_type, status, reason, cancellation_reason, created_at, updated_at";

/// Statuses that free an appointment's slot. Kept in step with
/// `AppointmentStatus::occupies_slot`.
const SLOT_FREEING_STATUSES: &str = "('cancelled', 'no_show')";

/// Statuses no write may touch.
const TERMINAL_STATUSES: &str = "('completed', 'cancelled', 'no_show')";

pub fn insert_appointment(conn: &Connection, a: &Appointment) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO appointments (id, practitioner_id, client_id, patient_id, start_at, end_at,
                                   appointment_type, status, reason, cancellation_reason,
                                   created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            a.id.to_string(),
            a.practitioner_id.to_string(),
            a.client_id.to_string(),
            a.patient_id.to_string(),
            timestamp::to_db(&a.start_at),
            timestamp::to_db(&a.end_at),
            a.appointment_type.as_str(),
            a.status.as_str(),
            a.reason,
            a.cancellation_reason,
            timestamp::to_db(&a.created_at),
            timestamp::to_db(&a.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> Result<Option<Appointment>, DatabaseError> {
    let sql = format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_appointment)
        .optional()
        .map_err(DatabaseError::from)
}

/// Appointments of one practitioner that still occupy their slot and whose
/// interval intersects `window`, optionally excluding one appointment.
pub fn get_live_appointments_in_window(
    conn: &Connection,
    practitioner_id: &Uuid,
    window: &TimeInterval,
    exclude: Option<&Uuid>,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE practitioner_id = ?1
           AND status NOT IN {SLOT_FREEING_STATUSES}
           AND start_at < ?2
           AND end_at > ?3
           AND id != ?4
         ORDER BY start_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            practitioner_id.to_string(),
            timestamp::to_db(&window.end),
            timestamp::to_db(&window.start),
            exclude.map(|id| id.to_string()).unwrap_or_default(),
        ],
        row_to_appointment,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// All appointments of a practitioner (any status) intersecting the range,
/// ordered by start.
pub fn list_appointments_for_practitioner(
    conn: &Connection,
    practitioner_id: &Uuid,
    range: &DateRange,
) -> Result<Vec<Appointment>, DatabaseError> {
    let sql = format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE practitioner_id = ?1
           AND (?2 IS NULL OR end_at > ?2)
           AND (?3 IS NULL OR start_at < ?3)
         ORDER BY start_at ASC, created_at ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![
            practitioner_id.to_string(),
            range.from.as_ref().map(timestamp::to_db),
            range.to.as_ref().map(timestamp::to_db),
        ],
        row_to_appointment,
    )?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

/// Stamp a new status. Refuses rows already in a terminal status.
pub fn update_appointment_status(
    conn: &Connection,
    id: &Uuid,
    status: AppointmentStatus,
    cancellation_reason: Option<&str>,
    updated_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let sql = format!(
        "UPDATE appointments
         SET status = ?2, cancellation_reason = ?3, updated_at = ?4
         WHERE id = ?1 AND status NOT IN {TERMINAL_STATUSES}"
    );
    let affected = conn.execute(
        &sql,
        params![
            id.to_string(),
            status.as_str(),
            cancellation_reason,
            timestamp::to_db(updated_at),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "appointment {id} is missing or terminal"
        )));
    }
    Ok(())
}

/// Move a non-terminal appointment to a new interval.
pub fn update_appointment_interval(
    conn: &Connection,
    id: &Uuid,
    interval: &TimeInterval,
    updated_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let sql = format!(
        "UPDATE appointments
         SET start_at = ?2, end_at = ?3, updated_at = ?4
         WHERE id = ?1 AND status NOT IN {TERMINAL_STATUSES}"
    );
    let affected = conn.execute(
        &sql,
        params![
            id.to_string(),
            timestamp::to_db(&interval.start),
            timestamp::to_db(&interval.end),
            timestamp::to_db(updated_at),
        ],
    )?;
    if affected == 0 {
        return Err(DatabaseError::ConstraintViolation(format!(
            "appointment {id} is missing or terminal"
        )));
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn insert_appointment_event(
    conn: &Connection,
    appointment_id: &Uuid,
    kind: AppointmentEventKind,
    from_status: Option<AppointmentStatus>,
    to_status: AppointmentStatus,
    interval: &TimeInterval,
    detail: Option<&str>,
    recorded_at: &DateTime<Utc>,
) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO appointment_events
         (appointment_id, kind, from_status, to_status, start_at, end_at, detail, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            appointment_id.to_string(),
            kind.as_str(),
            from_status.map(|s| s.as_str()),
            to_status.as_str(),
            timestamp::to_db(&interval.start),
            timestamp::to_db(&interval.end),
            detail,
            timestamp::to_db(recorded_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_appointment_events(
    conn: &Connection,
    appointment_id: &Uuid,
) -> Result<Vec<AppointmentEvent>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, appointment_id, kind, from_status, to_status, start_at, end_at, detail, recorded_at
         FROM appointment_events
         WHERE appointment_id = ?1
         ORDER BY seq ASC",
    )?;
    let rows = stmt.query_map(params![appointment_id.to_string()], |row| {
        Ok(AppointmentEvent {
            seq: row.get(0)?,
            appointment_id: uuid_column(row, 1)?,
            kind: enum_column(row, 2)?,
            from_status: optional_enum_column(row, 3)?,
            to_status: enum_column(row, 4)?,
            start_at: timestamp::column(row, 5)?,
            end_at: timestamp::column(row, 6)?,
            detail: row.get(7)?,
            recorded_at: timestamp::column(row, 8)?,
        })
    })?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_appointment(row: &rusqlite::Row) -> Result<Appointment, rusqlite::Error> {
    Ok(Appointment {
        id: uuid_column(row, 0)?,
        practitioner_id: uuid_column(row, 1)?,
        client_id: uuid_column(row, 2)?,
        patient_id: uuid_column(row, 3)?,
        start_at: timestamp::column(row, 4)?,
        end_at: timestamp::column(row, 5)?,
        appointment_type: enum_column(row, 6)?,
        status: enum_column(row, 7)?,
        reason: row.get(8)?,
        cancellation_reason: row.get(9)?,
        created_at: timestamp::column(row, 10)?,
        updated_at: timestamp::column(row, 11)?,
    })
}
