//! Appointment scheduling: the overlap-free booking guarantee and the
//! appointment status machine.
//!
//! Lifecycle: `scheduled → confirmed → checked_in → in_progress → completed`.
//! A scheduled appointment may go straight to `checked_in` (patient arrives
//! without a confirmation call). `cancelled` and `no_show` are reachable from
//! any non-terminal status.
//!
//! Every write runs inside [`db::begin_write`], so the conflict scan and the
//! insert/update it guards are one atomic unit. Two bookings racing for the
//! same slot serialize on the write reservation; the loser sees the winner's
//! row and fails with `SchedulingConflict`.

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::{self, repository, timestamp};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{
    Appointment, AppointmentEvent, AppointmentEventKind, AppointmentStatus, AppointmentType,
    DateRange, TimeInterval,
};
use crate::registry::{self, IdentityRegistry};

// ─── Types ────────────────────────────────────────────────────────────────────

/// Booking request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewAppointment {
    pub practitioner_id: Uuid,
    pub client_id: Uuid,
    pub patient_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub appointment_type: AppointmentType,
    #[serde(default)]
    pub reason: Option<String>,
}

// ─── Status machine ───────────────────────────────────────────────────────────

/// Whether `from → to` is an allowed appointment transition.
pub fn is_legal_transition(from: AppointmentStatus, to: AppointmentStatus) -> bool {
    use AppointmentStatus::*;
    if from.is_terminal() {
        return false;
    }
    match to {
        Cancelled | NoShow => true,
        Confirmed => from == Scheduled,
        CheckedIn => matches!(from, Scheduled | Confirmed),
        InProgress => from == CheckedIn,
        Completed => from == InProgress,
        Scheduled => false,
    }
}

fn ensure_storable(field: &str, ts: &DateTime<Utc>) -> ClinicResult<()> {
    if timestamp::is_storable(ts) {
        Ok(())
    } else {
        Err(ClinicError::Validation(format!(
            "{field} ({ts}) is outside the supported years 0000-9999"
        )))
    }
}

fn validate_interval(start: DateTime<Utc>, end: DateTime<Utc>) -> ClinicResult<TimeInterval> {
    let (start, end) = (timestamp::truncate(start), timestamp::truncate(end));
    ensure_storable("start_at", &start)?;
    ensure_storable("end_at", &end)?;
    if end <= start {
        return Err(ClinicError::Validation(format!(
            "end ({end}) must be after start ({start})"
        )));
    }
    Ok(TimeInterval { start, end })
}

/// First live appointment of the practitioner overlapping `interval`.
fn find_conflict(
    conn: &Connection,
    practitioner_id: &Uuid,
    interval: &TimeInterval,
    exclude: Option<&Uuid>,
) -> ClinicResult<Option<Appointment>> {
    let candidates =
        repository::get_live_appointments_in_window(conn, practitioner_id, interval, exclude)?;
    Ok(candidates
        .into_iter()
        .find(|a| a.status.occupies_slot() && a.interval().overlaps(interval)))
}

fn conflict_error(other: &Appointment) -> ClinicError {
    ClinicError::SchedulingConflict {
        conflicting_id: other.id,
        conflicting_start: other.start_at,
        conflicting_end: other.end_at,
    }
}

fn load(conn: &Connection, id: &Uuid) -> ClinicResult<Appointment> {
    repository::get_appointment(conn, id)?.ok_or_else(|| ClinicError::not_found("appointment", id))
}

// ─── Operations ───────────────────────────────────────────────────────────────

/// Book an appointment. Times are stored as given or the request fails;
/// they are never shifted to fit.
pub fn create_appointment<R: IdentityRegistry + ?Sized>(
    conn: &Connection,
    registry: &R,
    req: &NewAppointment,
) -> ClinicResult<Appointment> {
    let interval = validate_interval(req.start_at, req.end_at)?;
    let parties =
        registry::resolve_parties(registry, &req.practitioner_id, &req.client_id, &req.patient_id)?;
    if !parties.practitioner.active {
        return Err(ClinicError::Validation(format!(
            "practitioner {} is not active",
            parties.practitioner.id
        )));
    }

    let tx = db::begin_write(conn)?;
    if let Some(other) = find_conflict(&tx, &req.practitioner_id, &interval, None)? {
        tracing::info!(
            practitioner_id = %req.practitioner_id,
            conflicting_id = %other.id,
            "Booking rejected: slot taken"
        );
        return Err(conflict_error(&other));
    }

    let now = timestamp::now();
    let appointment = Appointment {
        id: Uuid::new_v4(),
        practitioner_id: req.practitioner_id,
        client_id: req.client_id,
        patient_id: req.patient_id,
        start_at: interval.start,
        end_at: interval.end,
        appointment_type: req.appointment_type,
        status: AppointmentStatus::Scheduled,
        reason: req.reason.clone(),
        cancellation_reason: None,
        created_at: now,
        updated_at: now,
    };
    repository::insert_appointment(&tx, &appointment)?;
    repository::insert_appointment_event(
        &tx,
        &appointment.id,
        AppointmentEventKind::Created,
        None,
        AppointmentStatus::Scheduled,
        &interval,
        None,
        &now,
    )?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        practitioner_id = %appointment.practitioner_id,
        start = %appointment.start_at,
        end = %appointment.end_at,
        "Appointment booked"
    );
    Ok(appointment)
}

/// Move an appointment to `target`. A cancellation reason is accepted only
/// when cancelling.
pub fn transition_appointment(
    conn: &Connection,
    id: &Uuid,
    target: AppointmentStatus,
    cancellation_reason: Option<&str>,
) -> ClinicResult<Appointment> {
    if cancellation_reason.is_some() && target != AppointmentStatus::Cancelled {
        return Err(ClinicError::Validation(
            "cancellation_reason is only allowed when cancelling".into(),
        ));
    }

    let tx = db::begin_write(conn)?;
    let mut appointment = load(&tx, id)?;
    let from = appointment.status;
    if !is_legal_transition(from, target) {
        return Err(ClinicError::IllegalTransition {
            entity: "appointment",
            from: from.to_string(),
            to: target.to_string(),
        });
    }

    let now = timestamp::now();
    repository::update_appointment_status(&tx, id, target, cancellation_reason, &now)?;
    repository::insert_appointment_event(
        &tx,
        id,
        AppointmentEventKind::Transition,
        Some(from),
        target,
        &appointment.interval(),
        cancellation_reason,
        &now,
    )?;
    tx.commit()?;

    appointment.status = target;
    appointment.cancellation_reason = cancellation_reason.map(str::to_owned);
    appointment.updated_at = now;
    tracing::info!(appointment_id = %id, from = %from, to = %target, "Appointment transitioned");
    Ok(appointment)
}

/// Move a non-terminal appointment to a new interval. The conflict scan
/// ignores the appointment's own current row.
pub fn reschedule_appointment(
    conn: &Connection,
    id: &Uuid,
    start_at: DateTime<Utc>,
    end_at: DateTime<Utc>,
) -> ClinicResult<Appointment> {
    let interval = validate_interval(start_at, end_at)?;

    let tx = db::begin_write(conn)?;
    let mut appointment = load(&tx, id)?;
    if appointment.status.is_terminal() {
        return Err(ClinicError::IllegalTransition {
            entity: "appointment",
            from: appointment.status.to_string(),
            to: "rescheduled".into(),
        });
    }
    if let Some(other) = find_conflict(&tx, &appointment.practitioner_id, &interval, Some(id))? {
        tracing::info!(
            appointment_id = %id,
            conflicting_id = %other.id,
            "Reschedule rejected: slot taken"
        );
        return Err(conflict_error(&other));
    }

    let previous = appointment.interval();
    let now = timestamp::now();
    repository::update_appointment_interval(&tx, id, &interval, &now)?;
    let detail = format!(
        "moved from {} to {}",
        timestamp::to_db(&previous.start),
        timestamp::to_db(&previous.end)
    );
    repository::insert_appointment_event(
        &tx,
        id,
        AppointmentEventKind::Rescheduled,
        Some(appointment.status),
        appointment.status,
        &interval,
        Some(&detail),
        &now,
    )?;
    tx.commit()?;

    appointment.start_at = interval.start;
    appointment.end_at = interval.end;
    appointment.updated_at = now;
    tracing::info!(
        appointment_id = %id,
        start = %interval.start,
        end = %interval.end,
        "Appointment rescheduled"
    );
    Ok(appointment)
}

pub fn get_appointment(conn: &Connection, id: &Uuid) -> ClinicResult<Appointment> {
    load(conn, id)
}

/// Appointments of one practitioner intersecting `range`, any status.
pub fn list_appointments(
    conn: &Connection,
    practitioner_id: &Uuid,
    range: &DateRange,
) -> ClinicResult<Vec<Appointment>> {
    if let Some(from) = &range.from {
        ensure_storable("from", from)?;
    }
    if let Some(to) = &range.to {
        ensure_storable("to", to)?;
    }
    if let (Some(from), Some(to)) = (range.from, range.to) {
        if to <= from {
            return Err(ClinicError::Validation("range end must be after range start".into()));
        }
    }
    Ok(repository::list_appointments_for_practitioner(conn, practitioner_id, range)?)
}

/// Status and interval changes of one appointment, oldest first.
pub fn appointment_history(conn: &Connection, id: &Uuid) -> ClinicResult<Vec<AppointmentEvent>> {
    load(conn, id)?;
    Ok(repository::get_appointment_events(conn, id)?)
}
