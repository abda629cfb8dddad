//! Log setup for the sync core. `RUST_LOG` wins over the configured level
//! so a one-off debugging run never needs a config edit.

use tracing_subscriber::EnvFilter;

use crate::infra::{config::LogConfig, error::AppError};

/// Installs the global `tracing` subscriber; once per process.
pub fn init(config: &LogConfig) -> Result<(), AppError> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(AppError::LoggingInit)
}
