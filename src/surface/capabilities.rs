//! Operation capability matrix.
//!
//! One static table decides, per (operation, qualifier) pair, whether the
//! engine handles the call or the caller gets OperationNotSupported. Region
//! names are honored as a key namespace; region-scoped storage operations,
//! tag filters, locking nonexistent keys, and change callbacks are not
//! provider capabilities and are refused up front rather than silently
//! degraded.

use crate::core::error::{CacheError, CacheResult};

/// Operations on the exposed surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Add,
    Put,
    Get,
    BulkGet,
    GetIfNewer,
    GetAndLock,
    PutAndUnlock,
    Remove,
    Unlock,
    ResetTimeout,
    CreateRegion,
    ClearRegion,
    RemoveRegion,
}

/// Optional qualifiers a call can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Qualifier {
    /// A caller-named region, used purely as a key namespace.
    NamedRegion,
    /// Tag writes or tag filters.
    Tags,
    /// Lock acquisition on a key that does not exist yet.
    ForceLock,
    /// Item or region change callbacks.
    Callbacks,
    /// Region as an enumerable storage scope.
    RegionScan,
}

/// Verdict for one cell of the matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Supported,
    Unsupported(&'static str),
}

/// Base verdict for an operation carrying no qualifiers.
fn base_verdict(op: Operation) -> Verdict {
    match op {
        Operation::CreateRegion | Operation::ClearRegion | Operation::RemoveRegion => {
            Verdict::Unsupported("regions as a storage scope")
        }
        _ => Verdict::Supported,
    }
}

/// Verdict for a qualifier applied to an operation.
fn qualifier_verdict(op: Operation, qualifier: Qualifier) -> Verdict {
    match qualifier {
        Qualifier::NamedRegion => Verdict::Supported,
        Qualifier::Tags => Verdict::Unsupported("tag-qualified operations"),
        Qualifier::Callbacks => Verdict::Unsupported("change callbacks"),
        Qualifier::RegionScan => Verdict::Unsupported("region enumeration"),
        Qualifier::ForceLock => match op {
            Operation::GetAndLock => Verdict::Unsupported("locking a nonexistent key"),
            _ => Verdict::Unsupported("force-lock outside lock acquisition"),
        },
    }
}

/// Static capability matrix for the exposed surface.
#[derive(Debug, Default)]
pub struct CapabilityMatrix;

impl CapabilityMatrix {
    pub fn new() -> Self {
        Self
    }

    /// Clear a call for dispatch, or refuse it.
    ///
    /// The first unsupported cell wins; `Ok(())` means the engine handles
    /// this combination.
    pub fn check(&self, op: Operation, qualifiers: &[Qualifier]) -> CacheResult<()> {
        if let Verdict::Unsupported(feature) = base_verdict(op) {
            return Err(CacheError::unsupported(feature));
        }
        for &qualifier in qualifiers {
            if let Verdict::Unsupported(feature) = qualifier_verdict(op, qualifier) {
                return Err(CacheError::unsupported(feature));
            }
        }
        Ok(())
    }

    /// True when the combination is dispatched to the engine.
    pub fn is_supported(&self, op: Operation, qualifiers: &[Qualifier]) -> bool {
        self.check(op, qualifiers).is_ok()
    }
}
