//! API endpoint handlers, one module per resource.
//!
//! Handlers parse the request, then hand a closure to `ApiContext::run`,
//! which does the database work off the async runtime.

pub mod appointments;
pub mod health;
pub mod notes;
pub mod visits;
pub mod vitals;

use uuid::Uuid;

use crate::api::error::ApiError;

/// Parse a path segment as an entity id.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid ID format: {raw}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_id_accepts_uuid() {
        let id = Uuid::new_v4();
        assert_eq!(parse_id(&id.to_string()).unwrap(), id);
    }

    #[test]
    fn parse_id_rejects_garbage() {
        assert!(matches!(parse_id("visit-42"), Err(ApiError::BadRequest(_))));
    }
}
