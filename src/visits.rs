//! Visit lifecycle: `open → in_progress → completed`.
//!
//! Status only moves forward and `completed` is final. An appointment opens
//! at most one visit, for the same patient, client and practitioner. A
//! visit opened from an appointment nudges that appointment along (arrival,
//! then start of consultation), and completing the visit completes an
//! in-progress appointment. Those appointment moves run after the visit write has
//! committed; if one is refused the visit change stands and the refusal is
//! returned as a warning.

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::LedgerPolicy;
use crate::db::{self, repository, timestamp};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{AppointmentStatus, Visit, VisitEvent, VisitStatus};
use crate::registry::{self, IdentityRegistry};
use crate::scheduler;

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenVisitRequest {
    pub patient_id: Uuid,
    pub client_id: Uuid,
    pub practitioner_id: Uuid,
    #[serde(default)]
    pub appointment_id: Option<Uuid>,
    #[serde(default)]
    pub chief_complaint: Option<String>,
}

/// A visit write together with any non-fatal side-effect failures.
#[derive(Debug, Clone, Serialize)]
pub struct VisitOutcome {
    pub visit: Visit,
    pub warnings: Vec<String>,
}

// ─── Operations ───────────────────────────────────────────────────────────────

/// Open a visit, walk-in or from an appointment.
pub fn open_visit<R: IdentityRegistry + ?Sized>(
    conn: &Connection,
    registry: &R,
    req: &OpenVisitRequest,
) -> ClinicResult<VisitOutcome> {
    registry::resolve_parties(registry, &req.practitioner_id, &req.client_id, &req.patient_id)?;

    let tx = db::begin_write(conn)?;
    let appointment = match req.appointment_id {
        Some(appointment_id) => {
            let appointment = repository::get_appointment(&tx, &appointment_id)?
                .ok_or_else(|| ClinicError::not_found("appointment", appointment_id))?;
            for (role, booked, given) in [
                ("patient", appointment.patient_id, req.patient_id),
                ("client", appointment.client_id, req.client_id),
                ("practitioner", appointment.practitioner_id, req.practitioner_id),
            ] {
                if booked != given {
                    return Err(ClinicError::Validation(format!(
                        "appointment {appointment_id} is booked for {role} {booked}, not {given}"
                    )));
                }
            }
            if let Some(existing) = repository::get_visit_for_appointment(&tx, &appointment_id)? {
                return Err(ClinicError::Validation(format!(
                    "appointment {appointment_id} already opened visit {}",
                    existing.id
                )));
            }
            Some(appointment)
        }
        None => None,
    };

    let now = timestamp::now();
    let visit = Visit {
        id: Uuid::new_v4(),
        patient_id: req.patient_id,
        client_id: req.client_id,
        practitioner_id: req.practitioner_id,
        appointment_id: req.appointment_id,
        status: VisitStatus::Open,
        chief_complaint: req.chief_complaint.clone(),
        opened_at: now,
        completed_at: None,
    };
    repository::insert_visit(&tx, &visit)?;
    repository::insert_visit_event(&tx, &visit.id, None, VisitStatus::Open, &now)?;
    tx.commit()?;

    tracing::info!(
        visit_id = %visit.id,
        patient_id = %visit.patient_id,
        appointment_id = ?visit.appointment_id,
        "Visit opened"
    );

    let mut warnings = Vec::new();
    if let Some(appointment) = appointment {
        let target = match appointment.status {
            AppointmentStatus::Scheduled | AppointmentStatus::Confirmed => {
                Some(AppointmentStatus::CheckedIn)
            }
            AppointmentStatus::CheckedIn => Some(AppointmentStatus::InProgress),
            AppointmentStatus::InProgress => None,
            terminal => {
                warnings.push(format!(
                    "appointment {} is {terminal}; left unchanged",
                    appointment.id
                ));
                None
            }
        };
        if let Some(target) = target {
            move_appointment(conn, &appointment.id, target, &mut warnings);
        }
    }

    Ok(VisitOutcome { visit, warnings })
}

/// Move a visit forward to `target`.
pub fn advance_visit(
    conn: &Connection,
    id: &Uuid,
    target: VisitStatus,
    policy: &LedgerPolicy,
) -> ClinicResult<VisitOutcome> {
    let tx = db::begin_write(conn)?;
    let mut visit = load(&tx, id)?;
    let from = visit.status;
    if from.is_terminal() || target.rank() <= from.rank() {
        return Err(ClinicError::IllegalTransition {
            entity: "visit",
            from: from.to_string(),
            to: target.to_string(),
        });
    }
    if target == VisitStatus::Completed
        && policy.require_note_before_close
        && repository::count_notes_for_visit(&tx, id)? == 0
    {
        return Err(ClinicError::Validation(format!(
            "visit {id} has no clinical notes and cannot be completed"
        )));
    }

    let now = timestamp::now();
    let completed_at = (target == VisitStatus::Completed).then_some(now);
    repository::update_visit_status(&tx, id, target, completed_at.as_ref())?;
    repository::insert_visit_event(&tx, id, Some(from), target, &now)?;
    tx.commit()?;

    visit.status = target;
    visit.completed_at = completed_at;
    tracing::info!(visit_id = %id, from = %from, to = %target, "Visit advanced");

    let mut warnings = Vec::new();
    if target == VisitStatus::Completed {
        if let Some(appointment_id) = visit.appointment_id {
            match repository::get_appointment(conn, &appointment_id) {
                Ok(Some(a)) if a.status == AppointmentStatus::InProgress => {
                    move_appointment(conn, &appointment_id, AppointmentStatus::Completed, &mut warnings);
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!(visit_id = %id, error = %e, "Could not read linked appointment");
                    warnings.push(format!("linked appointment {appointment_id} unreadable: {e}"));
                }
            }
        }
    }

    Ok(VisitOutcome { visit, warnings })
}

pub fn complete_visit(conn: &Connection, id: &Uuid, policy: &LedgerPolicy) -> ClinicResult<VisitOutcome> {
    advance_visit(conn, id, VisitStatus::Completed, policy)
}

pub fn get_visit(conn: &Connection, id: &Uuid) -> ClinicResult<Visit> {
    load(conn, id)
}

pub fn list_open_visits(conn: &Connection) -> ClinicResult<Vec<Visit>> {
    Ok(repository::get_open_visits(conn)?)
}

pub fn visit_history(conn: &Connection, id: &Uuid) -> ClinicResult<Vec<VisitEvent>> {
    load(conn, id)?;
    Ok(repository::get_visit_events(conn, id)?)
}

fn load(conn: &Connection, id: &Uuid) -> ClinicResult<Visit> {
    repository::get_visit(conn, id)?.ok_or_else(|| ClinicError::not_found("visit", id))
}

fn move_appointment(
    conn: &Connection,
    appointment_id: &Uuid,
    target: AppointmentStatus,
    warnings: &mut Vec<String>,
) {
    if let Err(e) = scheduler::transition_appointment(conn, appointment_id, target, None) {
        tracing::warn!(
            appointment_id = %appointment_id,
            target = %target,
            error = %e,
            "Linked appointment not moved"
        );
        warnings.push(format!("appointment {appointment_id} not moved to {target}: {e}"));
    }
}
