//! Tracing bootstrap for embedding applications.

/// Install the global tracing subscriber, filtered by `RUST_LOG`.
#[cfg(feature = "telemetry")]
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

#[cfg(not(feature = "telemetry"))]
pub fn init_tracing() {}
