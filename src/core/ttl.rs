//! Expiration policy helpers.

use std::time::Duration;

/// Residual expiration applied when an expiry rewrite receives a zero
/// timeout. Releasing a lock must never silently make an item immortal.
pub const RESIDUAL_FLOOR: Duration = Duration::from_secs(600);

/// Snap a zero rewrite timeout to the residual floor.
pub fn residual_or_floor(ttl: Duration) -> Duration {
    if ttl.is_zero() {
        RESIDUAL_FLOOR
    } else {
        ttl
    }
}
