//! Consumed cache provider capability.
//!
//! The engine drives the underlying cache through this narrow contract and
//! nothing else. The provider owns per-key locking and expiry; the layer
//! stores envelopes through it, never raw payloads, and holds no shared
//! state of its own.

pub mod memory;

use crate::engine::envelope::Envelope;
use crate::engine::lock::LockToken;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Boxed future returned by provider methods.
pub type ProviderFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, ProviderError>> + Send + 'a>>;

/// Raw failure codes a provider can surface.
///
/// The classifier in [`crate::core::error`] maps these into the layer
/// taxonomy; `Other` carries anything that is not a cache condition and is
/// passed through unchanged.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("key already exists")]
    KeyAlreadyExists,

    #[error("key not found")]
    NotFound,

    #[error("item locked")]
    ItemLocked,

    #[error("stored version does not match")]
    VersionMismatch,

    #[error("no server available")]
    NoServerAvailable,

    #[error("connectivity lost")]
    ConnectivityLost,

    #[error("not supported: {0}")]
    NotSupported(String),

    /// Anything the provider reports that is not a cache condition.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result of a get-and-lock attempt. The token is in/out: pass an empty
/// token (or none) to request a new lock, or an existing one to re-present
/// ownership.
///
/// Three shapes are possible: envelope present with an acquired token;
/// envelope absent with an empty token (the key does not exist); envelope
/// absent with a non-empty token (the key is held by another owner, or the
/// presented handle no longer matches).
#[derive(Debug, Clone)]
pub struct LockReply {
    pub envelope: Option<Envelope>,
    pub token: LockToken,
}

/// Narrow contract the underlying cache must satisfy.
pub trait CacheProvider: Send + Sync {
    /// Plain read. Ignores locks.
    fn get(&self, key: &str) -> ProviderFuture<'_, Option<Envelope>>;

    /// Read and lock in one step. `lock_ttl` bounds how long an unreleased
    /// lock survives provider-side; zero means the provider's default.
    fn get_and_lock(
        &self,
        key: &str,
        lock_ttl: Duration,
        token: Option<LockToken>,
    ) -> ProviderFuture<'_, LockReply>;

    /// Write an envelope. With a token the write is lock-scoped and fails
    /// unless the token owns the key; `unlock_on_write` releases the lock
    /// in the same step.
    fn insert(
        &self,
        key: &str,
        envelope: Envelope,
        expiry: Option<Duration>,
        token: Option<&LockToken>,
        unlock_on_write: bool,
    ) -> ProviderFuture<'_, ()>;

    /// Create-only write. Fails with `KeyAlreadyExists` on a live key.
    fn add(
        &self,
        key: &str,
        envelope: Envelope,
        expiry: Option<Duration>,
    ) -> ProviderFuture<'_, ()>;

    /// Delete. With a token the delete is lock-scoped.
    fn remove(
        &self,
        key: &str,
        token: Option<&LockToken>,
    ) -> ProviderFuture<'_, Option<Envelope>>;

    /// Release a lock without writing.
    fn unlock(&self, key: &str, token: &LockToken) -> ProviderFuture<'_, ()>;

    /// Read a set of keys in one call.
    fn bulk_get(&self, keys: &[String]) -> ProviderFuture<'_, Vec<(String, Option<Envelope>)>>;
}
