//! Identity lookups for practitioners, clients and patients.
//!
//! The registry is owned by the practice-management side; this crate only
//! resolves ids and never writes through this interface.

use rusqlite::Connection;
use uuid::Uuid;

use crate::db::repository;
use crate::error::{ClinicError, ClinicResult};
use crate::models::{Client, Patient, Practitioner};

pub trait IdentityRegistry {
    fn resolve_practitioner(&self, id: &Uuid) -> ClinicResult<Practitioner>;
    fn resolve_client(&self, id: &Uuid) -> ClinicResult<Client>;
    fn resolve_patient(&self, id: &Uuid) -> ClinicResult<Patient>;
}

/// Registry backed by the identity tables of the ledger database.
pub struct SqliteRegistry<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteRegistry<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }
}

impl IdentityRegistry for SqliteRegistry<'_> {
    fn resolve_practitioner(&self, id: &Uuid) -> ClinicResult<Practitioner> {
        repository::get_practitioner(self.conn, id)?
            .ok_or_else(|| ClinicError::not_found("practitioner", id))
    }

    fn resolve_client(&self, id: &Uuid) -> ClinicResult<Client> {
        repository::get_client(self.conn, id)?.ok_or_else(|| ClinicError::not_found("client", id))
    }

    fn resolve_patient(&self, id: &Uuid) -> ClinicResult<Patient> {
        repository::get_patient(self.conn, id)?
            .ok_or_else(|| ClinicError::not_found("patient", id))
    }
}

/// The three parties of an appointment or visit, all resolved.
#[derive(Debug, Clone)]
pub struct Parties {
    pub practitioner: Practitioner,
    pub client: Client,
    pub patient: Patient,
}

/// Resolve all three ids and check that the patient belongs to the client.
pub fn resolve_parties<R: IdentityRegistry + ?Sized>(
    registry: &R,
    practitioner_id: &Uuid,
    client_id: &Uuid,
    patient_id: &Uuid,
) -> ClinicResult<Parties> {
    let practitioner = registry.resolve_practitioner(practitioner_id)?;
    let client = registry.resolve_client(client_id)?;
    let patient = registry.resolve_patient(patient_id)?;
    if patient.client_id != client.id {
        return Err(ClinicError::Validation(format!(
            "patient {} does not belong to client {}",
            patient.id, client.id
        )));
    }
    Ok(Parties {
        practitioner,
        client,
        patient,
    })
}
