//! Concurrency-control engine.
//!
//! Emulates optimistic item versioning and pessimistic (lock-based) access
//! on top of a provider whose native primitives are plain get/insert/remove
//! and an opaque per-key lock token.
//!
//! - [`envelope`] - versioned-value envelope stored in place of raw payloads
//! - [`lock`] - bounded-retry lock acquisition
//! - [`write`] - conditional write engine built on the two above

pub mod envelope;
pub mod lock;
pub mod write;
