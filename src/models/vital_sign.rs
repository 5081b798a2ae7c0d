use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Measurements captured in one recording event. Every field is optional,
/// but a reading must carry at least one of them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalMeasurements {
    pub weight_kg: Option<f64>,
    pub temperature_c: Option<f64>,
    pub heart_rate_bpm: Option<i64>,
    pub respiratory_rate: Option<i64>,
    /// 9-point body condition scale. Signed and wide so out-of-scale input
    /// reaches the bounds check instead of failing to deserialize.
    pub body_condition_score: Option<i64>,
    /// 0 (no pain) to 10.
    pub pain_score: Option<i64>,
    pub notes: Option<String>,
}

impl VitalMeasurements {
    pub fn is_empty(&self) -> bool {
        self.weight_kg.is_none()
            && self.temperature_c.is_none()
            && self.heart_rate_bpm.is_none()
            && self.respiratory_rate.is_none()
            && self.body_condition_score.is_none()
            && self.pain_score.is_none()
    }
}

/// A single immutable vitals snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VitalReading {
    pub id: Uuid,
    pub seq: i64,
    pub visit_id: Uuid,
    pub recorder_id: Uuid,
    #[serde(flatten)]
    pub measurements: VitalMeasurements,
    pub recorded_at: DateTime<Utc>,
}
