pub mod repository;
pub mod sqlite;
pub mod timestamp;

pub use repository::*;
pub use sqlite::*;

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DatabaseError {
    #[error("SQLite error: {0}")]
    Sqlite(rusqlite::Error),

    /// The write lock could not be taken before the busy timeout elapsed.
    #[error("Database busy: {0}")]
    Busy(String),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid enum value for {field}: {value}")]
    InvalidEnum { field: String, value: String },

    #[error("Invalid stored value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Migration failed at version {version}: {reason}")]
    MigrationFailed { version: i64, reason: String },

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
                DatabaseError::Busy(err.to_string())
            }
            Some(ErrorCode::ConstraintViolation) => {
                DatabaseError::ConstraintViolation(err.to_string())
            }
            _ => DatabaseError::Sqlite(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sqlite_failure(code: ErrorCode, extended: i32) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error {
                code,
                extended_code: extended,
            },
            Some("simulated".into()),
        )
    }

    #[test]
    fn busy_code_maps_to_busy() {
        let err: DatabaseError = sqlite_failure(ErrorCode::DatabaseBusy, 5).into();
        assert!(matches!(err, DatabaseError::Busy(_)));
    }

    #[test]
    fn locked_code_maps_to_busy() {
        let err: DatabaseError = sqlite_failure(ErrorCode::DatabaseLocked, 6).into();
        assert!(matches!(err, DatabaseError::Busy(_)));
    }

    #[test]
    fn constraint_code_maps_to_constraint_violation() {
        let err: DatabaseError = sqlite_failure(ErrorCode::ConstraintViolation, 19).into();
        assert!(matches!(err, DatabaseError::ConstraintViolation(_)));
    }

    #[test]
    fn other_errors_stay_sqlite() {
        let err: DatabaseError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(err, DatabaseError::Sqlite(_)));
    }
}
