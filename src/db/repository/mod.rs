//! Repository layer: entity-scoped database operations.
//!
//! Free functions over `&Connection`, one sub-module per table family.
//! Callers that need atomic check-then-write run them inside
//! [`crate::db::begin_write`].

mod appointment;
mod clinical_note;
mod identity;
mod visit;
mod vital_sign;

use std::str::FromStr;

use rusqlite::types::Type;
use uuid::Uuid;

pub use appointment::*;
pub use clinical_note::*;
pub use identity::*;
pub use visit::*;
pub use vital_sign::*;

fn conversion_failure(
    idx: usize,
    err: impl std::error::Error + Send + Sync + 'static,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn uuid_column(row: &rusqlite::Row, idx: usize) -> Result<Uuid, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn optional_uuid_column(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<Uuid>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| Uuid::parse_str(&s).map_err(|e| conversion_failure(idx, e)))
        .transpose()
}

/// Parse a TEXT column through a `str_enum!` type.
pub(crate) fn enum_column<T>(row: &rusqlite::Row, idx: usize) -> Result<T, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    T::from_str(&raw).map_err(|e| conversion_failure(idx, e))
}

pub(crate) fn optional_enum_column<T>(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<T>, rusqlite::Error>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| T::from_str(&s).map_err(|e| conversion_failure(idx, e)))
        .transpose()
}
