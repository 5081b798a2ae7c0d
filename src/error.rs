//! Domain error taxonomy shared by the scheduler, visit manager, ledger and
//! vitals recorder.
//!
//! Every failure reaches the caller as one of these variants. Only `Busy`
//! is worth an automatic retry; the rest need the caller to change the
//! request first.

use chrono::{DateTime, Utc};
use thiserror::Error;
use uuid::Uuid;

use crate::db::DatabaseError;

#[derive(Error, Debug)]
pub enum ClinicError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error(
        "Scheduling conflict with appointment {conflicting_id} ({conflicting_start} to {conflicting_end})"
    )]
    SchedulingConflict {
        conflicting_id: Uuid,
        conflicting_start: DateTime<Utc>,
        conflicting_end: DateTime<Utc>,
    },

    #[error("Illegal {entity} transition from {from} to {to}")]
    IllegalTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("Invalid correction: {0}")]
    InvalidCorrection(String),

    #[error("Visit {0} is closed")]
    VisitClosed(Uuid),

    #[error("{field} out of range: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Storage busy, retry later: {0}")]
    Busy(String),

    #[error("Database error: {0}")]
    Database(DatabaseError),
}

impl ClinicError {
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        ClinicError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// True only for lock/timeout failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClinicError::Busy(_))
    }
}

impl From<DatabaseError> for ClinicError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Busy(detail) => ClinicError::Busy(detail),
            DatabaseError::NotFound { entity_type, id } => ClinicError::NotFound {
                entity: entity_label(&entity_type),
                id,
            },
            other => ClinicError::Database(other),
        }
    }
}

impl From<rusqlite::Error> for ClinicError {
    fn from(err: rusqlite::Error) -> Self {
        DatabaseError::from(err).into()
    }
}

fn entity_label(entity_type: &str) -> &'static str {
    match entity_type {
        "appointment" => "appointment",
        "visit" => "visit",
        "clinical_note" => "clinical_note",
        "practitioner" => "practitioner",
        "client" => "client",
        "patient" => "patient",
        _ => "entity",
    }
}

pub type ClinicResult<T> = Result<T, ClinicError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_busy_is_retryable() {
        assert!(ClinicError::Busy("locked".into()).is_retryable());
        assert!(!ClinicError::Validation("bad".into()).is_retryable());
        assert!(!ClinicError::VisitClosed(Uuid::nil()).is_retryable());
        assert!(!ClinicError::not_found("visit", Uuid::nil()).is_retryable());
    }

    #[test]
    fn database_busy_becomes_clinic_busy() {
        let err: ClinicError = DatabaseError::Busy("database is locked".into()).into();
        assert!(matches!(err, ClinicError::Busy(_)));
    }

    #[test]
    fn database_not_found_keeps_entity() {
        let err: ClinicError = DatabaseError::NotFound {
            entity_type: "visit".into(),
            id: "abc".into(),
        }
        .into();
        match err {
            ClinicError::NotFound { entity, id } => {
                assert_eq!(entity, "visit");
                assert_eq!(id, "abc");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn illegal_transition_message_names_both_states() {
        let err = ClinicError::IllegalTransition {
            entity: "appointment",
            from: "completed".into(),
            to: "confirmed".into(),
        };
        assert_eq!(
            err.to_string(),
            "Illegal appointment transition from completed to confirmed"
        );
    }
}
