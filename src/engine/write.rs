//! Conditional write engine.
//!
//! Implements version-checked and lock-scoped mutation on top of the
//! envelope and the acquisition loop. The engine is stateless: it holds a
//! provider handle and immutable settings, and is safe for concurrent use.
//! All per-key coordination is delegated to the provider's lock.
//!
//! Operations that cannot complete for a data reason (stale version,
//! foreign lock, absent key on an update) return a negative result rather
//! than an error; errors are reserved for validation, configuration, and
//! infrastructure failures.

use crate::core::config::LayerConfig;
use crate::core::error::{classify, classify_held, CacheError, CacheResult};
use crate::core::ttl;
use crate::engine::envelope::{Envelope, VersionStamp};
use crate::engine::lock::{acquire, LockOutcome, LockSettings, LockToken};
use crate::keyspace;
use crate::provider::{CacheProvider, ProviderError};
use bytes::Bytes;
use std::sync::Arc;
use std::time::Duration;

/// Caller intent for a remove. The three modes are mutually exclusive.
#[derive(Debug, Clone)]
pub enum RemoveMode {
    /// Unconditional delete.
    KeyBased,
    /// Delete only if the presented token currently owns the key. A foreign
    /// lock is a benign no-op, not an error.
    LockBased(LockToken),
    /// Delete only if the stored version matches exactly.
    VersionBased(VersionStamp),
}

/// Full view of a stored item, with the raw key and region recovered from
/// the marshaled cache key for display purposes.
#[derive(Debug, Clone)]
pub struct CachedItem {
    pub key: String,
    pub region: String,
    pub cache_name: String,
    pub payload: Bytes,
    pub version: VersionStamp,
    pub group: String,
}

/// Conditional write engine over a cache provider.
pub struct WriteEngine {
    provider: Arc<dyn CacheProvider>,
    cache_name: String,
    expirable: bool,
    default_ttl: Duration,
    lock: LockSettings,
}

impl WriteEngine {
    /// Build an engine from a provider and a validated configuration.
    pub fn new(provider: Arc<dyn CacheProvider>, config: &LayerConfig) -> Self {
        Self {
            provider,
            cache_name: config.cache_name.clone(),
            expirable: config.expirable,
            default_ttl: config.default_timeout(),
            lock: config.lock_settings(),
        }
    }

    /// The logical cache identifier this engine serves.
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    fn validate_key(key: &str) -> CacheResult<()> {
        if key.trim().is_empty() {
            return Err(CacheError::validation("key must not be empty"));
        }
        Ok(())
    }

    /// Resolve a caller TTL against the expirability policy. An explicit
    /// zero timeout is a caller error; no timeout means the configured
    /// default. Non-expirable layers store without expiration.
    fn effective_expiry(&self, ttl: Option<Duration>) -> CacheResult<Option<Duration>> {
        match ttl {
            Some(d) if d.is_zero() => Err(CacheError::validation(
                "time-out must be a positive value",
            )),
            Some(d) => Ok(self.expirable.then_some(d)),
            None => Ok(self.expirable.then_some(self.default_ttl)),
        }
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Read a key's payload and version stamp. Ignores locks.
    pub async fn get(
        &self,
        key: &str,
        region: Option<&str>,
    ) -> CacheResult<Option<(Bytes, VersionStamp)>> {
        Self::validate_key(key)?;
        let cache_key = keyspace::marshal(key, region);

        let envelope = self.provider.get(&cache_key).await.map_err(classify)?;
        Ok(envelope.map(|e| (e.payload, e.version)))
    }

    /// Read a key's full item view, recovering the raw key and region from
    /// the marshaled cache key.
    pub async fn get_item(&self, key: &str, region: Option<&str>) -> CacheResult<Option<CachedItem>> {
        Self::validate_key(key)?;
        let cache_key = keyspace::marshal(key, region);

        let Some(envelope) = self.provider.get(&cache_key).await.map_err(classify)? else {
            return Ok(None);
        };

        let (raw_key, region) = keyspace::unmarshal(&cache_key)
            .ok_or_else(|| CacheError::validation("cache key is not in marshaled form"))?;

        Ok(Some(CachedItem {
            key: raw_key,
            region,
            cache_name: self.cache_name.clone(),
            payload: envelope.payload,
            version: envelope.version,
            group: envelope.group,
        }))
    }

    /// Return the payload only if the stored version is strictly newer than
    /// the caller's stamp, updating the stamp on success.
    pub async fn get_if_newer(
        &self,
        key: &str,
        stamp: &mut VersionStamp,
        region: Option<&str>,
    ) -> CacheResult<Option<Bytes>> {
        Self::validate_key(key)?;
        let cache_key = keyspace::marshal(key, region);

        match self.provider.get(&cache_key).await.map_err(classify)? {
            Some(envelope) if envelope.version > *stamp => {
                *stamp = envelope.version;
                Ok(Some(envelope.payload))
            }
            _ => Ok(None),
        }
    }

    /// Read the owning-group tag stored with a key.
    pub async fn owning_group(&self, key: &str, region: Option<&str>) -> CacheResult<Option<String>> {
        Self::validate_key(key)?;
        let cache_key = keyspace::marshal(key, region);

        let envelope = self.provider.get(&cache_key).await.map_err(classify)?;
        Ok(envelope.map(|e| e.group))
    }

    /// Read a set of keys in one provider call. Returned pairs carry the
    /// raw (unmarshaled) keys.
    pub async fn bulk_get(
        &self,
        keys: &[String],
        region: Option<&str>,
    ) -> CacheResult<Vec<(String, Option<Bytes>)>> {
        let mut cache_keys = Vec::with_capacity(keys.len());
        for key in keys {
            Self::validate_key(key)?;
            cache_keys.push(keyspace::marshal(key, region));
        }

        let found = self
            .provider
            .bulk_get(&cache_keys)
            .await
            .map_err(classify)?;

        let mut out = Vec::with_capacity(found.len());
        for (cache_key, envelope) in found {
            let (raw_key, _region) = keyspace::unmarshal(&cache_key)
                .ok_or_else(|| CacheError::validation("cache key is not in marshaled form"))?;
            out.push((raw_key, envelope.map(|e| e.payload)));
        }
        Ok(out)
    }

    // ========================================================================
    // Locking reads
    // ========================================================================

    /// Acquire an exclusive lock on a key through the retry loop, returning
    /// the payload and the lock token.
    pub async fn get_and_lock(
        &self,
        key: &str,
        region: Option<&str>,
    ) -> CacheResult<(Bytes, LockToken)> {
        Self::validate_key(key)?;
        let cache_key = keyspace::marshal(key, region);

        match acquire(self.provider.as_ref(), &cache_key, None, &self.lock)
            .await
            .map_err(classify)?
        {
            LockOutcome::Acquired { envelope, token } => Ok((envelope.payload, token)),
            LockOutcome::Absent => Err(CacheError::KeyDoesNotExist),
            LockOutcome::Contended | LockOutcome::Rejected => Err(CacheError::ItemLocked),
        }
    }

    // ========================================================================
    // Writes
    // ========================================================================

    /// Unconditional create. Always produces a version-1 envelope: a
    /// removed key's next add starts numbering over, there is no tombstone
    /// memory. Fails with KeyAlreadyExists on a live duplicate.
    pub async fn add(
        &self,
        key: &str,
        value: Bytes,
        ttl: Option<Duration>,
        region: Option<&str>,
    ) -> CacheResult<VersionStamp> {
        Self::validate_key(key)?;
        let expiry = self.effective_expiry(ttl)?;
        let cache_key = keyspace::marshal(key, region);
        let group = keyspace::region_or_default(region).to_string();

        let envelope = Envelope::encapsulate(value, group);
        self.provider
            .add(&cache_key, envelope, expiry)
            .await
            .map_err(classify)?;

        tracing::debug!(key, "added at version 1");
        Ok(VersionStamp::first())
    }

    /// Version-checked overwrite through the acquisition loop.
    ///
    /// Absent key: nothing to update, `Ok(None)`. Contended key: the caller
    /// cannot safely bump a version it cannot observe, so this is an error.
    /// A supplied `expected` stamp that differs from the stored version in
    /// either direction releases the lock without writing and returns
    /// `Ok(None)`: the caller's view is stale.
    pub async fn put(
        &self,
        key: &str,
        value: Bytes,
        expected: Option<VersionStamp>,
        ttl: Option<Duration>,
        region: Option<&str>,
    ) -> CacheResult<Option<VersionStamp>> {
        Self::validate_key(key)?;
        let expiry = self.effective_expiry(ttl)?;
        let cache_key = keyspace::marshal(key, region);

        match acquire(self.provider.as_ref(), &cache_key, None, &self.lock)
            .await
            .map_err(classify)?
        {
            LockOutcome::Absent => Ok(None),
            LockOutcome::Contended | LockOutcome::Rejected => Err(CacheError::ItemLocked),
            LockOutcome::Acquired { envelope, token } => {
                if let Some(expected) = expected {
                    if expected != envelope.version {
                        tracing::debug!(
                            key,
                            expected = %expected,
                            stored = %envelope.version,
                            "stale version, releasing without write"
                        );
                        self.provider
                            .unlock(&cache_key, &token)
                            .await
                            .map_err(classify)?;
                        return Ok(None);
                    }
                }

                let next = envelope.bump(value);
                let stamp = next.version;
                self.provider
                    .insert(&cache_key, next, expiry, Some(&token), true)
                    .await
                    .map_err(classify)?;

                tracing::debug!(key, version = %stamp, "conditional write committed");
                Ok(Some(stamp))
            }
        }
    }

    /// Write under a lock the caller already holds, releasing it in the
    /// same provider call.
    ///
    /// The token is revalidated in a single attempt: an invalid or expired
    /// handle is a hard error, never retried.
    pub async fn put_and_unlock(
        &self,
        key: &str,
        value: Bytes,
        token: &LockToken,
        ttl: Option<Duration>,
        region: Option<&str>,
    ) -> CacheResult<VersionStamp> {
        Self::validate_key(key)?;
        if token.is_empty() {
            return Err(CacheError::validation("lock handle must not be empty"));
        }
        let expiry = self.effective_expiry(ttl)?;
        let cache_key = keyspace::marshal(key, region);

        let reply = self
            .provider
            .get_and_lock(&cache_key, self.lock.lock_ttl, Some(token.clone()))
            .await
            .map_err(classify_held)?;

        match reply.envelope {
            Some(current) => {
                let next = current.bump(value);
                let stamp = next.version;
                self.provider
                    .insert(&cache_key, next, expiry, Some(&reply.token), true)
                    .await
                    .map_err(classify_held)?;

                tracing::debug!(key, version = %stamp, "write-and-unlock committed");
                Ok(stamp)
            }
            None if reply.token.is_empty() => Err(CacheError::KeyDoesNotExist),
            None => Err(CacheError::InvalidLockHandle),
        }
    }

    /// Remove a key in one of three mutually exclusive modes. Returns
    /// whether something was actually removed.
    pub async fn remove(
        &self,
        key: &str,
        mode: RemoveMode,
        region: Option<&str>,
    ) -> CacheResult<bool> {
        Self::validate_key(key)?;
        let cache_key = keyspace::marshal(key, region);

        match mode {
            RemoveMode::KeyBased => {
                let prev = self
                    .provider
                    .remove(&cache_key, None)
                    .await
                    .map_err(classify)?;
                Ok(prev.is_some())
            }

            RemoveMode::LockBased(token) => {
                match self.provider.remove(&cache_key, Some(&token)).await {
                    Ok(prev) => Ok(prev.is_some()),
                    // Removal under a foreign lock is benign from the
                    // caller's perspective, as is an absent key.
                    Err(ProviderError::ItemLocked) | Err(ProviderError::NotFound) => Ok(false),
                    Err(other) => Err(classify(other)),
                }
            }

            RemoveMode::VersionBased(expected) => {
                match acquire(self.provider.as_ref(), &cache_key, None, &self.lock)
                    .await
                    .map_err(classify)?
                {
                    LockOutcome::Acquired { envelope, token } => {
                        if envelope.version != expected {
                            self.provider
                                .unlock(&cache_key, &token)
                                .await
                                .map_err(classify)?;
                            return Ok(false);
                        }
                        match self.provider.remove(&cache_key, Some(&token)).await {
                            Ok(Some(_)) => Ok(true),
                            Ok(None) => {
                                self.provider
                                    .unlock(&cache_key, &token)
                                    .await
                                    .map_err(classify)?;
                                Ok(false)
                            }
                            Err(ProviderError::ItemLocked) => Ok(false),
                            Err(other) => Err(classify(other)),
                        }
                    }
                    LockOutcome::Absent
                    | LockOutcome::Contended
                    | LockOutcome::Rejected => Ok(false),
                }
            }
        }
    }

    /// Release a lock, optionally rewriting the item's expiration in the
    /// same step.
    ///
    /// The token is revalidated in a single attempt. `new_ttl` of `None`
    /// releases without touching expiration; a zero duration snaps to the
    /// residual floor so the item never becomes immortal.
    pub async fn unlock(
        &self,
        key: &str,
        token: &LockToken,
        new_ttl: Option<Duration>,
        region: Option<&str>,
    ) -> CacheResult<()> {
        Self::validate_key(key)?;
        if token.is_empty() {
            return Err(CacheError::validation("lock handle must not be empty"));
        }
        let cache_key = keyspace::marshal(key, region);

        let Some(new_ttl) = new_ttl else {
            return self
                .provider
                .unlock(&cache_key, token)
                .await
                .map_err(classify_held);
        };

        let residual = ttl::residual_or_floor(new_ttl);
        let reply = self
            .provider
            .get_and_lock(&cache_key, self.lock.lock_ttl, Some(token.clone()))
            .await
            .map_err(classify_held)?;

        match reply.envelope {
            Some(current) => self
                .provider
                .insert(&cache_key, current, Some(residual), Some(&reply.token), true)
                .await
                .map_err(classify_held),
            None if reply.token.is_empty() => Err(CacheError::KeyDoesNotExist),
            None => Err(CacheError::InvalidLockHandle),
        }
    }

    /// Unconditional expiration rewrite with no lock semantics. A zero
    /// timeout snaps to the residual floor. Returns false when the provider
    /// refuses the write (for example, the key is locked or vanished).
    pub async fn reset_timeout(
        &self,
        key: &str,
        new_ttl: Duration,
        region: Option<&str>,
    ) -> CacheResult<bool> {
        Self::validate_key(key)?;
        let cache_key = keyspace::marshal(key, region);
        let residual = ttl::residual_or_floor(new_ttl);

        let Some(envelope) = self.provider.get(&cache_key).await.map_err(classify)? else {
            return Ok(false);
        };

        match self
            .provider
            .insert(&cache_key, envelope, Some(residual), None, false)
            .await
        {
            Ok(()) => Ok(true),
            Err(ProviderError::ItemLocked) | Err(ProviderError::NotFound) => Ok(false),
            Err(other) => Err(classify(other)),
        }
    }
}
