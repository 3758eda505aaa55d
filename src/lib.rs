pub mod types;
pub mod error;
pub mod config;
pub mod bracket;
pub mod series;
pub mod propagate;
pub mod scoring;
pub mod odds;
pub mod mutator;
pub mod participants;
pub mod store;
pub mod server;
#[cfg(test)]
mod fixtures;

use types::*;
use config::*;
use server::AppState;
use store::DataStore;

use std::fs;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

// ── Entry point ────────────────────────────────────────────────────────

pub fn run() {
    load_env_file();
    let (config, config_error) = match load_config_inner() {
        Ok(config) => (config, None),
        Err(e) => (apply_env_defaults(AppConfig::default()), Some(e)),
    };

    // Initialize tracing with a daily rolling file
    let logs_dir = config.log_path();
    fs::create_dir_all(&logs_dir).ok();
    let file_appender = tracing_appender::rolling::daily(&logs_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(non_blocking)
        .with_ansi(false)
        .init();
    info!("Playoff pool starting");
    if let Some(e) = config_error {
        warn!("{e}; using defaults");
    }
    log_env_warnings(&config);

    let store = DataStore::new(config.data_path());
    let state = AppState::new(store, config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to start async runtime: {e}");
            return;
        }
    };
    runtime.block_on(server::serve(state));
}
