use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::{enum_column, optional_uuid_column, uuid_column};
use crate::db::timestamp;
use crate::db::DatabaseError;
use crate::models::ClinicalNote;

// Append and read only. There is deliberately no update or delete here.

const NOTE_COLUMNS: &str =
    "seq, id, visit_id, author_id, note_type, content, corrects_note_id, content_hash, created_at";

/// Insert a note and return its insertion sequence number.
pub fn insert_clinical_note(conn: &Connection, note: &ClinicalNote) -> Result<i64, DatabaseError> {
    let content = serde_json::to_string(&note.content).map_err(|e| DatabaseError::InvalidValue {
        field: "content".into(),
        value: e.to_string(),
    })?;
    conn.execute(
        "INSERT INTO clinical_notes
         (id, visit_id, author_id, note_type, content, corrects_note_id, content_hash, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            note.id.to_string(),
            note.visit_id.to_string(),
            note.author_id.to_string(),
            note.note_type.as_str(),
            content,
            note.corrects_note_id.map(|id| id.to_string()),
            note.content_hash,
            timestamp::to_db(&note.created_at),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get_clinical_note(conn: &Connection, id: &Uuid) -> Result<Option<ClinicalNote>, DatabaseError> {
    let sql = format!("SELECT {NOTE_COLUMNS} FROM clinical_notes WHERE id = ?1");
    conn.query_row(&sql, params![id.to_string()], row_to_note)
        .optional()
        .map_err(DatabaseError::from)
}

/// Every note of a visit in ledger order (creation time, then sequence).
pub fn get_notes_for_visit(conn: &Connection, visit_id: &Uuid) -> Result<Vec<ClinicalNote>, DatabaseError> {
    let sql = format!(
        "SELECT {NOTE_COLUMNS} FROM clinical_notes
         WHERE visit_id = ?1
         ORDER BY created_at ASC, seq ASC"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![visit_id.to_string()], row_to_note)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(DatabaseError::from)
}

pub fn count_notes_for_visit(conn: &Connection, visit_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM clinical_notes WHERE visit_id = ?1",
        params![visit_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Number of notes whose `corrects_note_id` points directly at `note_id`.
pub fn count_direct_corrections(conn: &Connection, note_id: &Uuid) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM clinical_notes WHERE corrects_note_id = ?1",
        params![note_id.to_string()],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn row_to_note(row: &rusqlite::Row) -> Result<ClinicalNote, rusqlite::Error> {
    let content_raw: String = row.get(5)?;
    let content = serde_json::from_str(&content_raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(ClinicalNote {
        seq: row.get(0)?,
        id: uuid_column(row, 1)?,
        visit_id: uuid_column(row, 2)?,
        author_id: uuid_column(row, 3)?,
        note_type: enum_column(row, 4)?,
        content,
        corrects_note_id: optional_uuid_column(row, 6)?,
        content_hash: row.get(7)?,
        created_at: timestamp::column(row, 8)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::tests::seed_visit;
    use crate::db::sqlite::open_memory_database;
    use crate::models::NoteType;

    fn make_note(visit_id: Uuid, author_id: Uuid, corrects: Option<Uuid>) -> ClinicalNote {
        ClinicalNote {
            id: Uuid::new_v4(),
            seq: 0,
            visit_id,
            author_id,
            note_type: NoteType::Soap,
            content: serde_json::json!({ "subjective": "Lethargic for two days" }),
            corrects_note_id: corrects,
            content_hash: "test-hash".into(),
            created_at: timestamp::now(),
        }
    }

    #[test]
    fn insert_assigns_increasing_sequence() {
        let conn = open_memory_database().unwrap();
        let (visit_id, author) = seed_visit(&conn);
        let first = insert_clinical_note(&conn, &make_note(visit_id, author, None)).unwrap();
        let second = insert_clinical_note(&conn, &make_note(visit_id, author, None)).unwrap();
        assert!(second > first);
    }

    #[test]
    fn stored_note_matches_input() {
        let conn = open_memory_database().unwrap();
        let (visit_id, author) = seed_visit(&conn);
        let mut note = make_note(visit_id, author, None);
        note.seq = insert_clinical_note(&conn, &note).unwrap();
        assert_eq!(get_clinical_note(&conn, &note.id).unwrap().unwrap(), note);
    }

    #[test]
    fn equal_timestamps_fall_back_to_sequence() {
        let conn = open_memory_database().unwrap();
        let (visit_id, author) = seed_visit(&conn);
        let ts = timestamp::now();
        let mut ids = Vec::new();
        for _ in 0..3 {
            let mut note = make_note(visit_id, author, None);
            note.created_at = ts;
            insert_clinical_note(&conn, &note).unwrap();
            ids.push(note.id);
        }
        let listed: Vec<Uuid> = get_notes_for_visit(&conn, &visit_id)
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(listed, ids);
    }

    #[test]
    fn corrections_are_counted() {
        let conn = open_memory_database().unwrap();
        let (visit_id, author) = seed_visit(&conn);
        let original = make_note(visit_id, author, None);
        insert_clinical_note(&conn, &original).unwrap();
        insert_clinical_note(&conn, &make_note(visit_id, author, Some(original.id))).unwrap();
        insert_clinical_note(&conn, &make_note(visit_id, author, Some(original.id))).unwrap();

        assert_eq!(count_direct_corrections(&conn, &original.id).unwrap(), 2);
        assert_eq!(count_notes_for_visit(&conn, &visit_id).unwrap(), 3);
    }

    #[test]
    fn dangling_correction_link_rejected_by_schema() {
        let conn = open_memory_database().unwrap();
        let (visit_id, author) = seed_visit(&conn);
        let result = insert_clinical_note(&conn, &make_note(visit_id, author, Some(Uuid::new_v4())));
        assert!(result.is_err());
    }
}
