//! Transport layer: wire codec and live-connection lifecycle.

pub mod backoff;
pub mod connection;
pub mod envelope;
