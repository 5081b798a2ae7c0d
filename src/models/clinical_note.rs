use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::enums::NoteType;

/// A persisted clinical note. Once written, no field changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClinicalNote {
    pub id: Uuid,
    /// Insertion sequence; breaks ties between equal `created_at` values.
    pub seq: i64,
    pub visit_id: Uuid,
    pub author_id: Uuid,
    pub note_type: NoteType,
    pub content: serde_json::Value,
    pub corrects_note_id: Option<Uuid>,
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

impl ClinicalNote {
    /// Ledger order: creation time, then insertion sequence.
    pub fn order_key(&self) -> (DateTime<Utc>, i64) {
        (self.created_at, self.seq)
    }
}
