//! Failures surfaced at the composition root: configuration and logging
//! setup. Domain and transport layers carry their own error enums.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("failed to read config file at {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file at {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("reconnect pacing is inverted: initial delay {initial_ms}ms exceeds max {max_ms}ms")]
    ReconnectPacing { initial_ms: u64, max_ms: u64 },
    #[error("failed to initialize logging: {0}")]
    LoggingInit(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}
