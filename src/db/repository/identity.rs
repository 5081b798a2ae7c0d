use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::uuid_column;
use crate::db::DatabaseError;
use crate::models::{Client, Patient, Practitioner};

// Inserts are the registry collaborator's write path; the core itself only
// reads these tables.

pub fn insert_practitioner(conn: &Connection, p: &Practitioner) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO practitioners (id, display_name, active) VALUES (?1, ?2, ?3)",
        params![p.id.to_string(), p.display_name, p.active],
    )?;
    Ok(())
}

pub fn insert_client(conn: &Connection, c: &Client) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO clients (id, display_name) VALUES (?1, ?2)",
        params![c.id.to_string(), c.display_name],
    )?;
    Ok(())
}

pub fn insert_patient(conn: &Connection, p: &Patient) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO patients (id, client_id, name, species) VALUES (?1, ?2, ?3, ?4)",
        params![p.id.to_string(), p.client_id.to_string(), p.name, p.species],
    )?;
    Ok(())
}

pub fn get_practitioner(conn: &Connection, id: &Uuid) -> Result<Option<Practitioner>, DatabaseError> {
    conn.query_row(
        "SELECT id, display_name, active FROM practitioners WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(Practitioner {
                id: uuid_column(row, 0)?,
                display_name: row.get(1)?,
                active: row.get(2)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn get_client(conn: &Connection, id: &Uuid) -> Result<Option<Client>, DatabaseError> {
    conn.query_row(
        "SELECT id, display_name FROM clients WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(Client {
                id: uuid_column(row, 0)?,
                display_name: row.get(1)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}

pub fn get_patient(conn: &Connection, id: &Uuid) -> Result<Option<Patient>, DatabaseError> {
    conn.query_row(
        "SELECT id, client_id, name, species FROM patients WHERE id = ?1",
        params![id.to_string()],
        |row| {
            Ok(Patient {
                id: uuid_column(row, 0)?,
                client_id: uuid_column(row, 1)?,
                name: row.get(2)?,
                species: row.get(3)?,
            })
        },
    )
    .optional()
    .map_err(DatabaseError::from)
}
