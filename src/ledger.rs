//! Append-only clinical note ledger.
//!
//! Notes are inserted and read, never updated or deleted. A correction is a
//! new note whose `corrects_note_id` points at the note it supersedes, in the
//! same visit. The links form a forest: each tree is a *lineage* rooted at
//! an original note, and its leaves are the current version(s) of that
//! documentation.
//!
//! Each note carries a SHA-256 digest of its immutable fields, so
//! [`verify_ledger`] can detect rows altered outside this module.

use std::collections::{HashMap, HashSet};

use base64::Engine;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::config::{CorrectionResolution, LedgerPolicy};
use crate::db::{self, repository, timestamp};
use crate::error::{ClinicError, ClinicResult};
use crate::models::{ClinicalNote, NoteType, VisitStatus};
use crate::registry::IdentityRegistry;

// ─── Types ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNote {
    pub author_id: Uuid,
    pub note_type: NoteType,
    pub content: serde_json::Value,
    #[serde(default)]
    pub corrects_note_id: Option<Uuid>,
}

/// Current documentation of one lineage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Lineage {
    pub root_id: Uuid,
    pub root_created_at: DateTime<Utc>,
    /// Leaves of the lineage, most recent first.
    pub notes: Vec<ClinicalNote>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerVerification {
    pub visit_id: Uuid,
    pub checked: usize,
    pub mismatched: Vec<Uuid>,
}

impl LedgerVerification {
    pub fn is_intact(&self) -> bool {
        self.mismatched.is_empty()
    }
}

// ─── Hashing ─────────────────────────────────────────────────────────────────

/// Digest of every immutable field of a note, base64-encoded.
pub fn content_hash(
    visit_id: &Uuid,
    author_id: &Uuid,
    note_type: NoteType,
    content: &serde_json::Value,
    corrects_note_id: Option<&Uuid>,
    created_at: &DateTime<Utc>,
) -> String {
    let mut hasher = Sha256::new();
    for part in [
        visit_id.to_string(),
        author_id.to_string(),
        note_type.as_str().to_owned(),
        content.to_string(),
        corrects_note_id.map(Uuid::to_string).unwrap_or_default(),
        timestamp::to_db(created_at),
    ] {
        hasher.update(part.as_bytes());
        hasher.update([0u8]);
    }
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

fn hash_of(note: &ClinicalNote) -> String {
    content_hash(
        &note.visit_id,
        &note.author_id,
        note.note_type,
        &note.content,
        note.corrects_note_id.as_ref(),
        &note.created_at,
    )
}

// ─── Append ──────────────────────────────────────────────────────────────────

/// Append a note (or a correction) to a visit's ledger.
pub fn append_note<R: IdentityRegistry + ?Sized>(
    conn: &Connection,
    registry: &R,
    visit_id: &Uuid,
    req: &NewNote,
    policy: &LedgerPolicy,
) -> ClinicResult<ClinicalNote> {
    if req.content.is_null() {
        return Err(ClinicError::Validation("note content is required".into()));
    }

    let tx = db::begin_write(conn)?;
    let visit = repository::get_visit(&tx, visit_id)?
        .ok_or_else(|| ClinicError::not_found("visit", visit_id))?;
    if visit.status == VisitStatus::Completed && !policy.allow_post_close_addenda {
        return Err(ClinicError::VisitClosed(*visit_id));
    }
    registry.resolve_practitioner(&req.author_id)?;

    if let Some(target_id) = req.corrects_note_id {
        validate_correction(&tx, visit_id, &target_id, policy)?;
    }

    let created_at = timestamp::now();
    let mut note = ClinicalNote {
        id: Uuid::new_v4(),
        seq: 0,
        visit_id: *visit_id,
        author_id: req.author_id,
        note_type: req.note_type,
        content: req.content.clone(),
        corrects_note_id: req.corrects_note_id,
        content_hash: String::new(),
        created_at,
    };
    note.content_hash = hash_of(&note);
    note.seq = repository::insert_clinical_note(&tx, &note)?;
    tx.commit()?;

    tracing::info!(
        note_id = %note.id,
        visit_id = %visit_id,
        note_type = %note.note_type,
        corrects = ?note.corrects_note_id,
        "Clinical note appended"
    );
    Ok(note)
}

fn validate_correction(
    conn: &Connection,
    visit_id: &Uuid,
    target_id: &Uuid,
    policy: &LedgerPolicy,
) -> ClinicResult<()> {
    let target = repository::get_clinical_note(conn, target_id)?.ok_or_else(|| {
        ClinicError::InvalidCorrection(format!("note {target_id} does not exist"))
    })?;
    if target.visit_id != *visit_id {
        return Err(ClinicError::InvalidCorrection(format!(
            "note {target_id} belongs to another visit"
        )));
    }

    // The new note is not stored yet, so a cycle can only come from the
    // existing ancestry of the target.
    let mut seen = HashSet::from([target.id]);
    let mut parent = target.corrects_note_id;
    while let Some(id) = parent {
        if !seen.insert(id) {
            return Err(ClinicError::InvalidCorrection(format!(
                "correction chain of note {target_id} is cyclic"
            )));
        }
        parent = repository::get_clinical_note(conn, &id)?.and_then(|n| n.corrects_note_id);
    }

    if !policy.allow_multiple_corrections && repository::count_direct_corrections(conn, target_id)? > 0 {
        return Err(ClinicError::InvalidCorrection(format!(
            "note {target_id} has already been corrected"
        )));
    }
    Ok(())
}

// ─── Read side ───────────────────────────────────────────────────────────────

/// Every note of the visit in ledger order, corrections included.
pub fn list_notes_raw(conn: &Connection, visit_id: &Uuid) -> ClinicResult<Vec<ClinicalNote>> {
    ensure_visit(conn, visit_id)?;
    Ok(repository::get_notes_for_visit(conn, visit_id)?)
}

/// One note, which must belong to `visit_id`.
pub fn get_note(conn: &Connection, visit_id: &Uuid, note_id: &Uuid) -> ClinicResult<ClinicalNote> {
    repository::get_clinical_note(conn, note_id)?
        .filter(|n| n.visit_id == *visit_id)
        .ok_or_else(|| ClinicError::not_found("clinical_note", note_id))
}

/// Current documentation of the visit, one entry per lineage in the order
/// the lineages were started.
pub fn list_notes(
    conn: &Connection,
    visit_id: &Uuid,
    resolution: CorrectionResolution,
) -> ClinicResult<Vec<Lineage>> {
    let notes = list_notes_raw(conn, visit_id)?;
    Ok(resolve(notes, resolution))
}

/// Collapse a visit's notes (in ledger order) into lineages.
pub fn resolve(notes: Vec<ClinicalNote>, resolution: CorrectionResolution) -> Vec<Lineage> {
    let parent_of: HashMap<Uuid, Uuid> = notes
        .iter()
        .filter_map(|n| n.corrects_note_id.map(|p| (n.id, p)))
        .collect();
    let present: HashSet<Uuid> = notes.iter().map(|n| n.id).collect();
    let corrected: HashSet<Uuid> = parent_of.values().copied().collect();

    let root_of = |id: Uuid| -> Uuid {
        let mut current = id;
        let mut seen = HashSet::from([id]);
        while let Some(parent) = parent_of.get(&current) {
            if !present.contains(parent) || !seen.insert(*parent) {
                break;
            }
            current = *parent;
        }
        current
    };

    let mut lineages: Vec<Lineage> = Vec::new();
    let mut index: HashMap<Uuid, usize> = HashMap::new();
    for note in &notes {
        let root = root_of(note.id);
        if root == note.id {
            index.insert(root, lineages.len());
            lineages.push(Lineage {
                root_id: root,
                root_created_at: note.created_at,
                notes: Vec::new(),
            });
        }
    }
    for note in notes {
        if corrected.contains(&note.id) {
            continue;
        }
        if let Some(&slot) = index.get(&root_of(note.id)) {
            lineages[slot].notes.push(note);
        }
    }

    for lineage in &mut lineages {
        lineage.notes.sort_by_key(|n| std::cmp::Reverse(n.order_key()));
        if resolution == CorrectionResolution::LatestLeaf {
            lineage.notes.truncate(1);
        }
    }
    lineages.retain(|l| !l.notes.is_empty());
    lineages
}

/// Recompute every note's digest and report the ones that differ.
pub fn verify_ledger(conn: &Connection, visit_id: &Uuid) -> ClinicResult<LedgerVerification> {
    let notes = list_notes_raw(conn, visit_id)?;
    let mismatched: Vec<Uuid> = notes
        .iter()
        .filter(|n| hash_of(n) != n.content_hash)
        .map(|n| n.id)
        .collect();
    if !mismatched.is_empty() {
        tracing::warn!(
            visit_id = %visit_id,
            count = mismatched.len(),
            "Clinical notes failed integrity check"
        );
    }
    Ok(LedgerVerification {
        visit_id: *visit_id,
        checked: notes.len(),
        mismatched,
    })
}

fn ensure_visit(conn: &Connection, visit_id: &Uuid) -> ClinicResult<()> {
    repository::get_visit(conn, visit_id)?
        .map(|_| ())
        .ok_or_else(|| ClinicError::not_found("visit", visit_id))
}
