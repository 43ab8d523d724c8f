//! Reference in-memory provider.
//!
//! Executable model of the provider contract, used by the integration tests
//! and as a starting point for embedders. Lock and expiry rules follow the
//! contract exactly: a lock expires provider-side `lock_ttl` after
//! acquisition, entries expire lazily on access, and a non-empty token is
//! honored only while it matches the key's live lock.

use super::{CacheProvider, LockReply, ProviderError, ProviderFuture};
use crate::engine::envelope::Envelope;
use crate::engine::lock::LockToken;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Lock-id generator scoped to one provider instance.
///
/// Injected rather than global: two providers in one process never share a
/// counter.
#[derive(Debug, Default)]
pub struct TokenSequence(AtomicU64);

impl TokenSequence {
    pub fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Next lock id.
    pub fn next_id(&self) -> String {
        format!("lk-{}", self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[derive(Debug)]
struct LockState {
    id: String,
    deadline: Instant,
}

#[derive(Debug)]
struct Entry {
    envelope: Envelope,
    expires_at: Option<Instant>,
    lock: Option<LockState>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| now >= at)
    }

    fn live_lock(&self, now: Instant) -> Option<&LockState> {
        self.lock.as_ref().filter(|l| now < l.deadline)
    }
}

/// In-memory [`CacheProvider`].
pub struct MemoryProvider {
    entries: Mutex<HashMap<String, Entry>>,
    sequence: TokenSequence,
    default_lock_ttl: Duration,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::with_sequence(TokenSequence::new())
    }

    /// Build with an injected lock-id sequence.
    pub fn with_sequence(sequence: TokenSequence) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            sequence,
            default_lock_ttl: Duration::from_secs(5),
        }
    }

    /// Override the fallback lock duration used when a caller passes a zero
    /// `lock_ttl`.
    pub fn with_default_lock_ttl(mut self, ttl: Duration) -> Self {
        self.default_lock_ttl = ttl;
        self
    }

    /// Number of live (unexpired) entries.
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop the entry if it has expired, before any other handling.
    fn prune(entries: &mut HashMap<String, Entry>, key: &str, now: Instant) {
        if entries.get(key).is_some_and(|e| e.is_expired(now)) {
            entries.remove(key);
        }
    }

    fn get_sync(&self, key: &str) -> Option<Envelope> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::prune(&mut entries, key, now);
        entries.get(key).map(|e| e.envelope.clone())
    }

    fn get_and_lock_sync(
        &self,
        key: &str,
        lock_ttl: Duration,
        token: Option<LockToken>,
    ) -> LockReply {
        let now = Instant::now();
        let lock_ttl = if lock_ttl.is_zero() {
            self.default_lock_ttl
        } else {
            lock_ttl
        };

        let mut entries = self.entries.lock();
        Self::prune(&mut entries, key, now);
        let Some(entry) = entries.get_mut(key) else {
            return LockReply {
                envelope: None,
                token: LockToken::empty(),
            };
        };

        let presented = token.filter(|t| !t.is_empty());
        let held = entry.live_lock(now).map(|l| l.id.clone());

        match (presented, held) {
            // Re-present ownership: the handle matches the live lock.
            (Some(tok), Some(id)) if tok.id() == id => {
                entry.lock = Some(LockState {
                    id: id.clone(),
                    deadline: now + lock_ttl,
                });
                LockReply {
                    envelope: Some(entry.envelope.clone()),
                    token: LockToken::assigned(id),
                }
            }
            // The handle does not match the live lock.
            (Some(_), Some(id)) => LockReply {
                envelope: None,
                token: LockToken::foreign(id),
            },
            // A stale handle on an unlocked key is rejected, not silently
            // re-acquired.
            (Some(tok), None) => LockReply {
                envelope: None,
                token: LockToken::foreign(tok.id().to_string()),
            },
            // Fresh request against a held key: contended.
            (None, Some(id)) => LockReply {
                envelope: None,
                token: LockToken::foreign(id),
            },
            // Fresh request against a free key: assign a new lock.
            (None, None) => {
                let id = self.sequence.next_id();
                entry.lock = Some(LockState {
                    id: id.clone(),
                    deadline: now + lock_ttl,
                });
                LockReply {
                    envelope: Some(entry.envelope.clone()),
                    token: LockToken::assigned(id),
                }
            }
        }
    }

    fn insert_sync(
        &self,
        key: &str,
        envelope: Envelope,
        expiry: Option<Duration>,
        token: Option<&LockToken>,
        unlock_on_write: bool,
    ) -> Result<(), ProviderError> {
        let now = Instant::now();
        let expires_at = expiry.map(|d| now + d);
        let mut entries = self.entries.lock();
        Self::prune(&mut entries, key, now);

        match token.filter(|t| !t.is_empty()) {
            Some(tok) => {
                let entry = entries.get_mut(key).ok_or(ProviderError::NotFound)?;
                let owns = entry.live_lock(now).is_some_and(|l| l.id == tok.id());
                if !owns {
                    return Err(ProviderError::ItemLocked);
                }
                entry.envelope = envelope;
                entry.expires_at = expires_at;
                if unlock_on_write {
                    entry.lock = None;
                }
                Ok(())
            }
            None => {
                if entries
                    .get(key)
                    .is_some_and(|e| e.live_lock(now).is_some())
                {
                    return Err(ProviderError::ItemLocked);
                }
                entries.insert(
                    key.to_string(),
                    Entry {
                        envelope,
                        expires_at,
                        lock: None,
                    },
                );
                Ok(())
            }
        }
    }

    fn add_sync(
        &self,
        key: &str,
        envelope: Envelope,
        expiry: Option<Duration>,
    ) -> Result<(), ProviderError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::prune(&mut entries, key, now);

        if entries.contains_key(key) {
            return Err(ProviderError::KeyAlreadyExists);
        }
        entries.insert(
            key.to_string(),
            Entry {
                envelope,
                expires_at: expiry.map(|d| now + d),
                lock: None,
            },
        );
        Ok(())
    }

    fn remove_sync(
        &self,
        key: &str,
        token: Option<&LockToken>,
    ) -> Result<Option<Envelope>, ProviderError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::prune(&mut entries, key, now);

        if !entries.contains_key(key) {
            return Ok(None);
        }

        match token.filter(|t| !t.is_empty()) {
            None => Ok(entries.remove(key).map(|e| e.envelope)),
            Some(tok) => {
                let owns = entries
                    .get(key)
                    .and_then(|e| e.live_lock(now))
                    .is_some_and(|l| l.id == tok.id());
                if owns {
                    Ok(entries.remove(key).map(|e| e.envelope))
                } else {
                    // No live lock, or a foreign one: the token cannot own
                    // this key.
                    Err(ProviderError::ItemLocked)
                }
            }
        }
    }

    fn unlock_sync(&self, key: &str, token: &LockToken) -> Result<(), ProviderError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        Self::prune(&mut entries, key, now);

        let entry = entries.get_mut(key).ok_or(ProviderError::NotFound)?;
        let foreign = entry.live_lock(now).is_some_and(|l| l.id != token.id());
        if foreign {
            return Err(ProviderError::ItemLocked);
        }

        // Matching handle, or a lock that already expired: release is
        // idempotent.
        entry.lock = None;
        Ok(())
    }
}

impl Default for MemoryProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheProvider for MemoryProvider {
    fn get(&self, key: &str) -> ProviderFuture<'_, Option<Envelope>> {
        let result = Ok(self.get_sync(key));
        Box::pin(async move { result })
    }

    fn get_and_lock(
        &self,
        key: &str,
        lock_ttl: Duration,
        token: Option<LockToken>,
    ) -> ProviderFuture<'_, LockReply> {
        let result = Ok(self.get_and_lock_sync(key, lock_ttl, token));
        Box::pin(async move { result })
    }

    fn insert(
        &self,
        key: &str,
        envelope: Envelope,
        expiry: Option<Duration>,
        token: Option<&LockToken>,
        unlock_on_write: bool,
    ) -> ProviderFuture<'_, ()> {
        let result = self.insert_sync(key, envelope, expiry, token, unlock_on_write);
        Box::pin(async move { result })
    }

    fn add(
        &self,
        key: &str,
        envelope: Envelope,
        expiry: Option<Duration>,
    ) -> ProviderFuture<'_, ()> {
        let result = self.add_sync(key, envelope, expiry);
        Box::pin(async move { result })
    }

    fn remove(
        &self,
        key: &str,
        token: Option<&LockToken>,
    ) -> ProviderFuture<'_, Option<Envelope>> {
        let result = self.remove_sync(key, token);
        Box::pin(async move { result })
    }

    fn unlock(&self, key: &str, token: &LockToken) -> ProviderFuture<'_, ()> {
        let result = self.unlock_sync(key, token);
        Box::pin(async move { result })
    }

    fn bulk_get(&self, keys: &[String]) -> ProviderFuture<'_, Vec<(String, Option<Envelope>)>> {
        let result = Ok(keys
            .iter()
            .map(|k| (k.clone(), self.get_sync(k)))
            .collect());
        Box::pin(async move { result })
    }
}
