//! Fixed-width UTC timestamp encoding for TEXT columns.
//!
//! Every instant is written with microsecond precision and a trailing `Z`,
//! so byte-wise string comparison in SQL matches chronological order.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};

use super::DatabaseError;

const DB_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Encode an instant for storage.
pub fn to_db(ts: &DateTime<Utc>) -> String {
    ts.format(DB_FORMAT).to_string()
}

/// Whether `ts` encodes with a four-digit year. Outside years 0000–9999
/// chrono emits a sign (`+10000-…`, `-0001-…`) and string order no longer
/// follows time order.
pub fn is_storable(ts: &DateTime<Utc>) -> bool {
    (0..=9999).contains(&ts.year())
}

/// Decode a stored instant.
pub fn from_db(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    NaiveDateTime::parse_from_str(value, DB_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| DatabaseError::InvalidValue {
            field: field.into(),
            value: value.into(),
        })
}

/// Current instant truncated to the stored precision, so a value read back
/// compares equal to the one that was written.
pub fn now() -> DateTime<Utc> {
    truncate(Utc::now())
}

/// Drop sub-microsecond precision.
pub fn truncate(ts: DateTime<Utc>) -> DateTime<Utc> {
    let micros = ts.timestamp_micros();
    DateTime::from_timestamp_micros(micros).unwrap_or(ts)
}

/// Adapter for `rusqlite` row mappers, which must return `rusqlite::Error`.
pub(crate) fn column(row: &rusqlite::Row, idx: usize) -> Result<DateTime<Utc>, rusqlite::Error> {
    let raw: String = row.get(idx)?;
    NaiveDateTime::parse_from_str(&raw, DB_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
}

pub(crate) fn optional_column(
    row: &rusqlite::Row,
    idx: usize,
) -> Result<Option<DateTime<Utc>>, rusqlite::Error> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|value| {
        NaiveDateTime::parse_from_str(&value, DB_FORMAT)
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    idx,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn encoding_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 15).unwrap();
        assert_eq!(to_db(&a).len(), to_db(&b).len());
        assert_eq!(to_db(&a), "2024-03-01T09:00:00.000000Z");
    }

    #[test]
    fn lexicographic_order_matches_time_order() {
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 9, 59, 59).unwrap();
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        assert!(to_db(&earlier) < to_db(&later));
    }

    #[test]
    fn decode_reverses_encode() {
        let ts = now();
        assert_eq!(from_db("created_at", &to_db(&ts)).unwrap(), ts);
    }

    #[test]
    fn storable_range_is_four_digit_years() {
        let last = Utc.with_ymd_and_hms(9999, 12, 31, 23, 59, 59).unwrap();
        let first = Utc.with_ymd_and_hms(0, 1, 1, 0, 0, 0).unwrap();
        assert!(is_storable(&last));
        assert!(is_storable(&first));
        assert_eq!(to_db(&last).len(), to_db(&first).len());

        let beyond = Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap();
        let before = Utc.with_ymd_and_hms(-1, 12, 31, 0, 0, 0).unwrap();
        assert!(!is_storable(&beyond));
        assert!(!is_storable(&before));
        // The signed form sorts before a real earlier date.
        assert!(to_db(&beyond) < to_db(&last));
    }

    #[test]
    fn decode_rejects_garbage() {
        let result = from_db("start_at", "yesterday");
        assert!(matches!(result, Err(DatabaseError::InvalidValue { .. })));
    }
}
