use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Inclusive-start, exclusive-end window for appointment listings.
/// An appointment is included when its interval intersects the window.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}
