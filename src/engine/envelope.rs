//! Versioned-value envelope.
//!
//! The envelope is the only carrier of version information: the provider
//! stores envelopes, never raw payloads, so version semantics survive
//! provider-side replacement. Construction is pure: no provider calls, no
//! side effects.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Strictly-ordered marker of how many successful writes a key has seen.
///
/// Stamps compare by creation order. Construction and access go through
/// named functions; there are no implicit numeric conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VersionStamp(u64);

impl VersionStamp {
    /// The stamp every key carries after its first insert.
    pub const fn first() -> Self {
        Self(1)
    }

    /// Rebuild a stamp from a previously observed counter value.
    pub const fn from_counter(counter: u64) -> Self {
        Self(counter)
    }

    /// The stamp after one more successful write.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value, for display.
    pub const fn counter(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for VersionStamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Stored wrapper pairing a payload with its version and owning group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Opaque caller payload.
    pub payload: Bytes,

    /// Write counter for this key. Starts at 1, strictly increases on every
    /// successful conditional write, never decreases.
    pub version: VersionStamp,

    /// Owning group tag (the region the key was written under).
    pub group: String,
}

impl Envelope {
    /// Wrap a payload for first insert: version 1, the given group.
    pub fn encapsulate(payload: Bytes, group: impl Into<String>) -> Self {
        Self {
            payload,
            version: VersionStamp::first(),
            group: group.into(),
        }
    }

    /// Replacement envelope for a successful conditional write: the version
    /// advances by one, the group is kept.
    pub fn bump(&self, payload: Bytes) -> Self {
        Self {
            payload,
            version: self.version.next(),
            group: self.group.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encapsulate_starts_at_one() {
        let env = Envelope::encapsulate(Bytes::from_static(b"v"), "region-a");
        assert_eq!(env.version, VersionStamp::first());
        assert_eq!(env.group, "region-a");
    }

    #[test]
    fn test_bump_advances_and_keeps_group() {
        let env = Envelope::encapsulate(Bytes::from_static(b"v"), "region-a");
        let next = env.bump(Bytes::from_static(b"w"));

        assert_eq!(next.version, env.version.next());
        assert!(next.version > env.version);
        assert_eq!(next.group, "region-a");
        assert_eq!(next.payload, Bytes::from_static(b"w"));
        // the source envelope is untouched
        assert_eq!(env.version, VersionStamp::first());
    }

    #[test]
    fn test_stamps_order_by_creation() {
        let s1 = VersionStamp::first();
        let s2 = s1.next();
        let s3 = s2.next();
        assert!(s1 < s2 && s2 < s3);
        assert_eq!(s3.counter(), 3);
        assert_eq!(VersionStamp::from_counter(3), s3);
    }
}
