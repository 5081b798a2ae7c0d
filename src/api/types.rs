//! Shared types for the API layer.

use std::sync::Arc;

use rusqlite::Connection;

use crate::api::error::ApiError;
use crate::config::LedgerPolicy;
use crate::core_state::CoreState;
use crate::error::ClinicResult;
use crate::retry;

/// Shared context for all API routes and middleware.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }

    /// Run a unit of database work on the blocking pool with a fresh
    /// connection. `Busy` failures are retried with backoff before they
    /// reach the client.
    pub async fn run<T, F>(&self, op: F) -> Result<T, ApiError>
    where
        T: Send + 'static,
        F: Fn(&Connection, &LedgerPolicy) -> ClinicResult<T> + Send + 'static,
    {
        let core = Arc::clone(&self.core);
        tokio::task::spawn_blocking(move || {
            let conn = core.open_db()?;
            retry::with_busy_retry(retry::MAX_BUSY_ATTEMPTS, || op(&conn, &core.policy))
                .map_err(ApiError::from)
        })
        .await
        .map_err(|e| ApiError::Internal(format!("blocking task failed: {e}")))?
    }
}
