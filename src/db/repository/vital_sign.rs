use rusqlite::{params, Connection};
use uuid::Uuid;

use super::uuid_column;
use crate::db::timestamp;
use crate::db::DatabaseError;
use crate::models::{VitalMeasurements, VitalReading};

/// Insert a vitals snapshot and return its sequence number.
pub fn insert_vital_reading(conn: &Connection, v: &VitalReading) -> Result<i64, DatabaseError> {
    let m = &v.measurements;
    conn.execute(
        "INSERT INTO vital_readings (id, visit_id, recorder_id, weight_kg, temperature_c,
         heart_rate_bpm, respiratory_rate, body_condition_score, pain_score, notes, recorded_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        params![
            v.id.to_string(),
            v.visit_id.to_string(),
            v.recorder_id.to_string(),
            m.weight_kg,
            m.temperature_c,
            m.heart_rate_bpm,
            m.respiratory_rate,
            m.body_condition_score,
            m.pain_score,
            m.notes,
            timestamp::to_db(&v.recorded_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// All readings of a visit, oldest first.
pub fn get_vitals_for_visit(conn: &Connection, visit_id: &Uuid) -> Result<Vec<VitalReading>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT seq, id, visit_id, recorder_id, weight_kg, temperature_c, heart_rate_bpm,
                respiratory_rate, body_condition_score, pain_score, notes, recorded_at
         FROM vital_readings
         WHERE visit_id = ?1
         ORDER BY recorded_at ASC, seq ASC",
    )?;
    let rows = stmt.query_map(params![visit_id.to_string()], row_to_vital_reading)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

fn row_to_vital_reading(row: &rusqlite::Row) -> Result<VitalReading, rusqlite::Error> {
    Ok(VitalReading {
        seq: row.get(0)?,
        id: uuid_column(row, 1)?,
        visit_id: uuid_column(row, 2)?,
        recorder_id: uuid_column(row, 3)?,
        measurements: VitalMeasurements {
            weight_kg: row.get(4)?,
            temperature_c: row.get(5)?,
            heart_rate_bpm: row.get(6)?,
            respiratory_rate: row.get(7)?,
            body_condition_score: row.get(8)?,
            pain_score: row.get(9)?,
            notes: row.get(10)?,
        },
        recorded_at: timestamp::column(row, 11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::tests::seed_visit;
    use crate::db::sqlite::open_memory_database;

    fn reading(visit_id: Uuid, recorder_id: Uuid, weight: f64) -> VitalReading {
        VitalReading {
            id: Uuid::new_v4(),
            seq: 0,
            visit_id,
            recorder_id,
            measurements: VitalMeasurements {
                weight_kg: Some(weight),
                temperature_c: Some(38.6),
                heart_rate_bpm: Some(96),
                body_condition_score: Some(5),
                ..Default::default()
            },
            recorded_at: timestamp::now(),
        }
    }

    #[test]
    fn insert_and_list_in_order() {
        let conn = open_memory_database().unwrap();
        let (visit_id, recorder) = seed_visit(&conn);
        let mut first = reading(visit_id, recorder, 12.4);
        first.seq = insert_vital_reading(&conn, &first).unwrap();
        let mut second = reading(visit_id, recorder, 12.6);
        second.seq = insert_vital_reading(&conn, &second).unwrap();

        let listed = get_vitals_for_visit(&conn, &visit_id).unwrap();
        assert_eq!(listed, vec![first, second]);
    }

    #[test]
    fn schema_rejects_out_of_scale_scores() {
        let conn = open_memory_database().unwrap();
        let (visit_id, recorder) = seed_visit(&conn);
        let mut bad = reading(visit_id, recorder, 10.0);
        bad.measurements.body_condition_score = Some(12);
        assert!(insert_vital_reading(&conn, &bad).is_err());
    }

    #[test]
    fn other_visits_not_listed() {
        let conn = open_memory_database().unwrap();
        let (visit_id, recorder) = seed_visit(&conn);
        insert_vital_reading(&conn, &reading(visit_id, recorder, 4.2)).unwrap();
        assert!(get_vitals_for_visit(&conn, &Uuid::new_v4()).unwrap().is_empty());
    }
}
