//! Bounded-retry lock acquisition.
//!
//! A single provider lock attempt has three outcomes: value present with a
//! newly assigned token (acquired), value absent with an empty token (the
//! key does not exist), value absent with a foreign token (held by another
//! owner). The loop retries only the contended case, sleeping a configured
//! interval between attempts, and gives up after the retry budget.

use crate::engine::envelope::Envelope;
use crate::provider::{CacheProvider, ProviderError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opaque exclusive-access credential for a key.
///
/// An empty id means no lock is held (or the key was absent). A non-empty id
/// must be presented to mutate or release the key. It is consumed by the
/// matching release/write, or expires provider-side if never released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockToken {
    id: String,
    acquired: bool,
}

impl LockToken {
    /// Token requesting a fresh lock.
    pub fn empty() -> Self {
        Self {
            id: String::new(),
            acquired: false,
        }
    }

    /// Token carrying an id the provider assigned to this caller.
    pub fn assigned(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            acquired: true,
        }
    }

    /// Provider-side view of a lock this caller does not own.
    pub fn foreign(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            acquired: false,
        }
    }

    /// The provider-assigned lock id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// True when no lock id is carried.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// True when this token represents ownership.
    pub fn is_acquired(&self) -> bool {
        self.acquired
    }
}

/// Retry policy for lock acquisition, fixed at layer construction.
#[derive(Debug, Clone, Copy)]
pub struct LockSettings {
    /// Provider-side lock duration for each attempt. An unreleased lock
    /// expires after this long.
    pub lock_ttl: Duration,

    /// Contended re-attempts after the first try. Zero probes exactly once.
    pub retry_count: u32,

    /// Sleep between contended attempts.
    pub retry_interval: Duration,
}

impl Default for LockSettings {
    fn default() -> Self {
        Self {
            lock_ttl: Duration::from_secs(5),
            retry_count: 3,
            retry_interval: Duration::from_millis(100),
        }
    }
}

/// Outcome of the acquisition loop.
#[derive(Debug)]
pub enum LockOutcome {
    /// Lock obtained; the stored envelope rides along.
    Acquired {
        envelope: Envelope,
        token: LockToken,
    },

    /// The key does not exist. Reported immediately, never retried.
    Absent,

    /// Another owner held the key for the whole retry budget. The caller
    /// decides whether this is an error.
    Contended,

    /// A pre-supplied token was rejected by the provider. Terminal: the
    /// handle is invalid and has been discarded.
    Rejected,
}

/// Run the bounded-retry acquisition loop on a marshaled key.
///
/// With `existing` supplied, the first attempt re-presents that token to
/// resume a lock the caller already believes it holds; rejection of a
/// pre-supplied token is never retried. Subsequent attempts always request
/// a fresh lock.
pub async fn acquire(
    provider: &dyn CacheProvider,
    key: &str,
    existing: Option<LockToken>,
    settings: &LockSettings,
) -> Result<LockOutcome, ProviderError> {
    let resumed = existing.as_ref().is_some_and(|t| !t.is_empty());
    let mut presented = existing;
    let mut attempt: u32 = 0;

    loop {
        let reply = provider
            .get_and_lock(key, settings.lock_ttl, presented.take())
            .await?;

        match (reply.envelope, reply.token) {
            (Some(envelope), token) => {
                return Ok(LockOutcome::Acquired { envelope, token });
            }
            (None, token) if token.is_empty() => {
                return Ok(LockOutcome::Absent);
            }
            (None, _held_elsewhere) => {
                if resumed && attempt == 0 {
                    tracing::debug!(key, "pre-supplied lock token rejected");
                    return Ok(LockOutcome::Rejected);
                }
                if attempt >= settings.retry_count {
                    tracing::debug!(key, attempt, "lock retry budget exhausted");
                    return Ok(LockOutcome::Contended);
                }
                attempt += 1;
                tracing::trace!(key, attempt, "key contended, retrying");
                tokio::time::sleep(settings.retry_interval).await;
            }
        }
    }
}
