//! Infrastructure layer: config loading, logging, and top-level errors.

pub mod config;
pub mod error;
pub mod logging;
