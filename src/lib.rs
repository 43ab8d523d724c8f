//! Trellis - distributed-cache compatibility layer.
//!
//! Trellis lets code written against an AppFabric-style cache API run
//! against a provider whose native primitives are plain get/insert/remove
//! and an opaque per-key lock token. The core is the concurrency-control
//! layer: optimistic item versioning and pessimistic (lock-based) access
//! emulated on top of those primitives.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Exposed Surface                            │
//! │        (capability matrix, argument validation)                 │
//! └─────────────────────────────────────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   Conditional Write Engine                      │
//! │   Add │ Put │ PutAndUnlock │ Remove │ Unlock │ ResetTimeout     │
//! └─────────────────────────────────────────────────────────────────┘
//!                       │                    │
//! ┌──────────────────────────────┐ ┌────────────────────────────────┐
//! │    Lock-Acquisition Loop     │ │   Versioned-Value Envelope     │
//! │  (bounded retries, resume)   │ │  (payload, stamp, group)       │
//! └──────────────────────────────┘ └────────────────────────────────┘
//!                                  │
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       Cache Provider                            │
//! │     get │ getAndLock │ insert │ add │ remove │ unlock           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Module Organization
//!
//! ## Core
//! - [`core::config`] - construction-time configuration
//! - [`core::error`] - error taxonomy and provider failure classification
//! - [`core::ttl`] - expiration policy helpers
//! - [`core::telemetry`] - tracing bootstrap
//!
//! ## Engine
//! - [`engine::envelope`] - versioned-value envelope
//! - [`engine::lock`] - bounded-retry lock acquisition
//! - [`engine::write`] - conditional write engine
//!
//! ## Keyspace
//! - [`keyspace`] - key/region codec
//!
//! ## Provider
//! - [`provider`] - consumed cache capability
//! - [`provider::memory`] - reference in-memory provider
//!
//! ## Surface
//! - [`surface::capabilities`] - static operation capability matrix
//!
//! # Key Invariants
//!
//! - A key's version starts at 1 on first insert and strictly increases on
//!   every successful conditional write; the provider stores envelopes,
//!   never raw payloads.
//! - Two concurrent conditional writes to one key serialize on the
//!   provider's lock; losers fail fast or retry: no silent overwrite.
//! - Every blocking provider call carries an explicit timeout; the retry
//!   budget is a hard upper bound on lock waits.
//! - Data-level misses (stale version, foreign lock) are negative results;
//!   errors are reserved for validation and infrastructure failures.

// Core infrastructure
pub mod core;

// Concurrency-control engine
pub mod engine;

// Key/region codec
pub mod keyspace;

// Consumed provider capability
pub mod provider;

// Exposed-surface gating
pub mod surface;

// Re-exports for convenience
pub use self::core::config::LayerConfig;
pub use self::core::error::{CacheError, CacheResult, SubStatus};
pub use engine::envelope::{Envelope, VersionStamp};
pub use engine::lock::{LockOutcome, LockSettings, LockToken};
pub use engine::write::{CachedItem, RemoveMode, WriteEngine};
pub use provider::memory::MemoryProvider;
pub use provider::{CacheProvider, LockReply, ProviderError};
pub use surface::capabilities::{CapabilityMatrix, Operation, Qualifier};
