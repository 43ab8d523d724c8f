//! Core infrastructure: configuration, errors, expiration policy, telemetry.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod ttl;
