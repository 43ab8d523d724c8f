//! Common test utilities.
//!
//! Shared helpers for integration tests. Import with `mod common;` in test
//! files.

#![allow(dead_code)]

use bytes::Bytes;
use std::sync::Arc;
use trellis::{LayerConfig, MemoryProvider, WriteEngine};

/// Configuration tuned for tests: short retry sleeps, everything else
/// default.
pub fn fast_config() -> LayerConfig {
    LayerConfig {
        cache_name: "test".to_string(),
        retry_interval_ms: 5,
        ..LayerConfig::default()
    }
}

/// Engine over a fresh in-memory provider.
pub fn engine() -> (Arc<MemoryProvider>, WriteEngine) {
    let provider = Arc::new(MemoryProvider::new());
    let engine = WriteEngine::new(provider.clone(), &fast_config());
    (provider, engine)
}

/// A second engine over an existing provider, with its own retry budget.
pub fn engine_with_retries(provider: Arc<MemoryProvider>, retry_count: u32) -> WriteEngine {
    let config = LayerConfig {
        retry_count,
        ..fast_config()
    };
    WriteEngine::new(provider, &config)
}

/// Shorthand for a payload.
pub fn val(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}
