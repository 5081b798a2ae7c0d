use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "EncounterLedger";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8087";
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5000;

/// Get the application data directory
/// ~/EncounterLedger/ on all platforms. Falls back to the working
/// directory when no home directory can be determined.
pub fn app_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
}

/// Default location of the ledger database.
pub fn default_db_path() -> PathBuf {
    app_data_dir().join("ledger.db")
}

/// Default `tracing` filter when `RUST_LOG` is unset.
pub fn default_log_filter() -> &'static str {
    "encounter_ledger=info,tower_http=warn"
}

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

// ─── Policy ──────────────────────────────────────────────────────────────────

/// How `list_notes` collapses a correction lineage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CorrectionResolution {
    /// Every leaf of the lineage, most recent first.
    #[default]
    AllLeaves,
    /// Only the most recent leaf.
    LatestLeaf,
}

impl FromStr for CorrectionResolution {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all_leaves" => Ok(Self::AllLeaves),
            "latest_leaf" => Ok(Self::LatestLeaf),
            _ => Err(()),
        }
    }
}

/// Behaviour switches for the visit manager and note ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerPolicy {
    /// Refuse to complete a visit that has no notes.
    pub require_note_before_close: bool,
    /// Accept notes on a completed visit.
    pub allow_post_close_addenda: bool,
    /// A note may be corrected by more than one later note.
    pub allow_multiple_corrections: bool,
    pub correction_resolution: CorrectionResolution,
}

impl Default for LedgerPolicy {
    fn default() -> Self {
        Self {
            require_note_before_close: false,
            allow_post_close_addenda: true,
            allow_multiple_corrections: true,
            correction_resolution: CorrectionResolution::AllLeaves,
        }
    }
}

impl LedgerPolicy {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; unset keys keep their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            require_note_before_close: parse_var(
                &lookup,
                "LEDGER_REQUIRE_NOTE_BEFORE_CLOSE",
                defaults.require_note_before_close,
                parse_bool,
            )?,
            allow_post_close_addenda: parse_var(
                &lookup,
                "LEDGER_ALLOW_POST_CLOSE_ADDENDA",
                defaults.allow_post_close_addenda,
                parse_bool,
            )?,
            allow_multiple_corrections: parse_var(
                &lookup,
                "LEDGER_ALLOW_MULTIPLE_CORRECTIONS",
                defaults.allow_multiple_corrections,
                parse_bool,
            )?,
            correction_resolution: parse_var(
                &lookup,
                "LEDGER_CORRECTION_RESOLUTION",
                defaults.correction_resolution,
                |s| s.parse().ok(),
            )?,
        })
    }
}

// ─── Server ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    pub db_path: PathBuf,
    pub busy_timeout: Duration,
    pub policy: LedgerPolicy,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = parse_var(
            &lookup,
            "LEDGER_BIND_ADDR",
            default_bind_addr(),
            |s| s.parse().ok(),
        )?;
        let db_path = lookup("LEDGER_DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_db_path);
        let busy_ms = parse_var(
            &lookup,
            "LEDGER_BUSY_TIMEOUT_MS",
            DEFAULT_BUSY_TIMEOUT_MS,
            |s| s.parse::<u64>().ok().filter(|ms| *ms > 0),
        )?;
        Ok(Self {
            bind_addr,
            db_path,
            busy_timeout: Duration::from_millis(busy_ms),
            policy: LedgerPolicy::from_lookup(&lookup)?,
        })
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 8087))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_var<T, L, P>(lookup: &L, var: &'static str, default: T, parse: P) -> Result<T, ConfigError>
where
    L: Fn(&str) -> Option<String>,
    P: Fn(&str) -> Option<T>,
{
    match lookup(var) {
        None => Ok(default),
        Some(raw) => parse(raw.trim()).ok_or(ConfigError::InvalidValue { var, value: raw }),
    }
}
