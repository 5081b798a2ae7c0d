pub mod api;
pub mod config;
pub mod core_state;
pub mod db;
pub mod error;
pub mod ledger;
pub mod models;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod visits;
pub mod vitals;

use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::{ConfigError, ServerConfig};
use crate::core_state::{CoreError, CoreState};

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("Initialization failed: {0}")]
    Core(#[from] CoreError),
    #[error("Server error: {0}")]
    Server(String),
}

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .init();
}

/// Load configuration from the environment, prepare the database and
/// serve the API until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = ServerConfig::from_env()?;
    tracing::info!(
        bind_addr = %config.bind_addr,
        db_path = %config.db_path.display(),
        busy_timeout_ms = config.busy_timeout.as_millis() as u64,
        require_note_before_close = config.policy.require_note_before_close,
        allow_post_close_addenda = config.policy.allow_post_close_addenda,
        "Configuration loaded"
    );

    let core = CoreState::from_config(&config);
    core.initialize()?;

    let mut server = api::start_api_server(Arc::new(core), config.bind_addr)
        .await
        .map_err(StartupError::Server)?;
    tracing::info!(addr = %server.addr, "Listening");

    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
    }
    server.shutdown();
    Ok(())
}
