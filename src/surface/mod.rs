//! Exposed-surface gating.
//!
//! The legacy API multiplies every operation by optional region, tag,
//! force-lock, and callback qualifiers, most of which the provider cannot
//! honor. Instead of one stub per overload, [`capabilities`] holds a single
//! static matrix that either clears a call for dispatch or refuses it with
//! OperationNotSupported. Argument validation runs before any capability
//! check or provider call.

pub mod capabilities;

use crate::core::error::{CacheError, CacheResult};

/// Validate a tag collection before any capability check.
///
/// An empty collection, or a tag that is empty after trimming, is a caller
/// error regardless of whether tag operations are supported at all.
pub fn validate_tags(tags: &[String]) -> CacheResult<()> {
    if tags.is_empty() {
        return Err(CacheError::validation("tag collection must not be empty"));
    }
    if tags.iter().any(|t| t.trim().is_empty()) {
        return Err(CacheError::validation("tags must not be empty"));
    }
    Ok(())
}
