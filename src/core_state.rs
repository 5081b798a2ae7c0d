//! Process-wide state shared by every request handler.
//!
//! `CoreState` holds configuration only. The database is the single shared
//! mutable resource: each unit of work opens its own connection and nothing
//! is cached in memory between requests.

use std::path::PathBuf;
use std::time::Duration;

use crate::config::{LedgerPolicy, ServerConfig};
use crate::db;

pub struct CoreState {
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub policy: LedgerPolicy,
}

impl CoreState {
    pub fn new(db_path: PathBuf, busy_timeout: Duration, policy: LedgerPolicy) -> Self {
        Self {
            db_path,
            busy_timeout,
            policy,
        }
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.db_path.clone(), config.busy_timeout, config.policy)
    }

    /// Create the data directory and bring the schema up to date.
    pub fn initialize(&self) -> Result<(), CoreError> {
        if let Some(parent) = self.db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        self.open_db()?;
        tracing::info!(path = %self.db_path.display(), "Ledger database ready");
        Ok(())
    }

    /// Open a fresh connection with pragmas and migrations applied.
    pub fn open_db(&self) -> Result<rusqlite::Connection, CoreError> {
        db::open_database(&self.db_path, self.busy_timeout).map_err(CoreError::Database)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Database error: {0}")]
    Database(#[from] db::DatabaseError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_creates_directory_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("ledger.db");
        let state = CoreState::new(path.clone(), db::DEFAULT_BUSY_TIMEOUT, LedgerPolicy::default());
        state.initialize().unwrap();
        assert!(path.exists());

        let conn = state.open_db().unwrap();
        assert_eq!(db::count_tables(&conn).unwrap(), 10);
    }

    #[test]
    fn each_open_is_a_separate_connection() {
        let dir = tempfile::tempdir().unwrap();
        let state = CoreState::new(
            dir.path().join("ledger.db"),
            db::DEFAULT_BUSY_TIMEOUT,
            LedgerPolicy::default(),
        );
        state.initialize().unwrap();
        let a = state.open_db().unwrap();
        let b = state.open_db().unwrap();
        a.execute(
            "INSERT INTO clients (id, display_name) VALUES ('c1', 'Shared')",
            [],
        )
        .unwrap();
        let seen: i64 = b
            .query_row("SELECT COUNT(*) FROM clients", [], |row| row.get(0))
            .unwrap();
        assert_eq!(seen, 1);
    }

    #[test]
    fn from_config_copies_settings() {
        let config = ServerConfig::from_lookup(|key| match key {
            "LEDGER_DB_PATH" => Some("/tmp/x.db".into()),
            "LEDGER_BUSY_TIMEOUT_MS" => Some("750".into()),
            _ => None,
        })
        .unwrap();
        let state = CoreState::from_config(&config);
        assert_eq!(state.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(state.busy_timeout, Duration::from_millis(750));
    }
}
