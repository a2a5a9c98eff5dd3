//! `CellId`: a strong, zero-cost handle for grid cells.
//!
//! Every cell in the distributed grid is addressed by a unique global id.
//! `CellId` wraps a nonzero `u64` so that 0 stays reserved as an invalid or
//! sentinel value, at both compile- and runtime.
//!
//! This module provides:
//! - A transparent `CellId` newtype around `NonZeroU64` for zero-cost FFI and
//!   memory layout guarantees.
//! - Fallible and panicking constructors with safety checks.
//! - Implementations of common traits (`Debug`, `Display`, ordering,
//!   hashing) so `CellId` can be used in maps, sets, and printed easily.

use std::{fmt, num::NonZeroU64};

use crate::sweep_error::SweepError;

/// Global cell identifier.
///
/// # Memory layout
/// This type is `repr(transparent)`, meaning it has the same ABI and
/// alignment as its single field (`NonZeroU64`) and can cross a process
/// boundary exactly like a `u64`.
#[derive(
    Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize,
)]
#[repr(transparent)]
pub struct CellId(NonZeroU64);

impl CellId {
    /// Creates a new `CellId` from a raw `u64` value.
    ///
    /// # Panics
    ///
    /// Panics if `raw == 0`. We reserve 0 as an invalid or sentinel value.
    /// Use [`CellId::try_new`] where the raw value comes from outside the
    /// process (files, messages).
    #[inline]
    pub fn new(raw: u64) -> Self {
        CellId(NonZeroU64::new(raw).expect("CellId must be non-zero"))
    }

    /// Fallible constructor for raw values of external origin.
    #[inline]
    pub fn try_new(raw: u64) -> Result<Self, SweepError> {
        NonZeroU64::new(raw)
            .map(CellId)
            .ok_or(SweepError::InvalidCellId)
    }

    /// Returns the inner `u64` value of this `CellId`.
    ///
    /// This is a cheap, const-time getter. Use it when you need to inspect
    /// or print the raw integer, but prefer to work with `CellId` otherwise
    /// for type safety.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

/// Custom `Debug` implementation to display as `CellId(raw_value)`.
impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CellId").field(&self.get()).finish()
    }
}

/// Prints the numeric id without any wrapper text.
impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

/// MPI compatibility: `CellId` travels over the wire as a `u64`.
#[cfg(feature = "mpi-support")]
unsafe impl mpi::datatype::Equivalence for CellId {
    type Out = <u64 as mpi::datatype::Equivalence>::Out;

    fn equivalent_datatype() -> Self::Out {
        u64::equivalent_datatype()
    }
}



#[cfg(test)]
mod serde_tests {
    use super::*;

    #[test]
    fn json_roundtrip() {
        let c = CellId::new(123);
        let s = serde_json::to_string(&c).unwrap();
        let c2: CellId = serde_json::from_str(&s).unwrap();
        assert_eq!(c2, c);
    }

    #[test]
    fn bincode_roundtrip() {
        let c = CellId::new(456);
        let bytes = bincode::serialize(&c).unwrap();
        let c2: CellId = bincode::deserialize(&bytes).unwrap();
        assert_eq!(c2, c);
    }
}
