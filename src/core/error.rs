//! Error taxonomy and provider failure classification.
//!
//! The layer exposes a small, stable set of error conditions. Provider
//! failures are classified exactly once, at the provider boundary; a failure
//! the classifier does not recognize passes through unchanged so callers can
//! still inspect the original cause. Data-level misses (stale version,
//! foreign lock) are not errors at all: the engine reports them as negative
//! results.

use crate::provider::ProviderError;
use thiserror::Error;

/// Sub-status carried by retryable errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubStatus {
    /// No cache server is reachable.
    ServerUnavailable,
}

impl std::fmt::Display for SubStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerUnavailable => write!(f, "CacheServerUnavailable"),
        }
    }
}

/// Stable cache-layer error conditions.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Invalid argument, rejected before any provider call.
    #[error("validation: {message}")]
    Validation { message: String },

    /// Create-only write hit a live key.
    #[error("key already exists")]
    KeyAlreadyExists,

    /// The key is not present in the cache.
    #[error("key does not exist")]
    KeyDoesNotExist,

    /// The key is locked by another owner.
    #[error("item locked")]
    ItemLocked,

    /// The presented lock token does not own the key.
    #[error("invalid lock handle")]
    InvalidLockHandle,

    /// The stored version does not match the caller's expectation.
    #[error("version conflict")]
    VersionConflict,

    /// The provider lacks the requested capability.
    #[error("operation not supported: {feature}")]
    OperationNotSupported { feature: String },

    /// A provider call exceeded its timeout.
    #[error("server timeout")]
    Timeout,

    /// The connection to the provider was lost. Retryable.
    #[error("connectivity lost: {sub_status}")]
    ConnectivityLost { sub_status: SubStatus },

    /// Unclassified provider failure, passed through unchanged.
    #[error(transparent)]
    Provider(ProviderError),
}

impl CacheError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an OperationNotSupported error for a named capability.
    pub fn unsupported(feature: impl Into<String>) -> Self {
        Self::OperationNotSupported {
            feature: feature.into(),
        }
    }

    /// Check if this error indicates the operation should be retried.
    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::ConnectivityLost { .. })
    }
}

/// Result type using CacheError.
pub type CacheResult<T> = Result<T, CacheError>;

// ============================================================================
// Provider failure classification
// ============================================================================

/// Map a provider failure code into the stable taxonomy.
///
/// Codes without a taxonomy entry come back as [`CacheError::Provider`] with
/// the original error intact: never swallowed, never double-wrapped.
pub fn classify(err: ProviderError) -> CacheError {
    match err {
        ProviderError::KeyAlreadyExists => CacheError::KeyAlreadyExists,
        ProviderError::NotFound => CacheError::KeyDoesNotExist,
        ProviderError::ItemLocked => CacheError::ItemLocked,
        ProviderError::VersionMismatch => CacheError::VersionConflict,
        ProviderError::NoServerAvailable => CacheError::Timeout,
        ProviderError::ConnectivityLost => CacheError::ConnectivityLost {
            sub_status: SubStatus::ServerUnavailable,
        },
        ProviderError::NotSupported(feature) => CacheError::OperationNotSupported { feature },
        other => CacheError::Provider(other),
    }
}

/// Classification for the token-revalidation paths.
///
/// While a caller is re-presenting a lock it already believes it holds, a
/// lock conflict means the handle is no longer valid rather than ordinary
/// contention.
pub fn classify_held(err: ProviderError) -> CacheError {
    match err {
        ProviderError::ItemLocked => CacheError::InvalidLockHandle,
        other => classify(other),
    }
}
