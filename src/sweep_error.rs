//! `SweepError`: unified error type for mesh-sweep public APIs.
//!
//! Every fallible operation in this crate reports through this enum instead
//! of terminating the process; the top-level solver driver decides whether a
//! given failure aborts the run.

use thiserror::Error;

use crate::mesh::cell::CellShape;
use crate::mesh::id::CellId;

/// Unified error type for mesh-sweep operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SweepError {
    /// Attempted to construct a `CellId` with the reserved zero value.
    #[error("CellId must be non-zero (0 is reserved as invalid/sentinel)")]
    InvalidCellId,
    /// A cell id was looked up that the grid does not contain.
    #[error("grid has no cell with id `{0}`")]
    UnknownCell(CellId),
    /// A cell was inserted twice under the same global id.
    #[error("duplicate cell id `{0}` during grid construction")]
    DuplicateCell(CellId),
    /// A mesh generator was asked for an inconsistent mesh.
    #[error("invalid mesh specification: {0}")]
    InvalidMeshSpec(String),
    /// A vertex index points past the end of the grid's node array.
    #[error("node index {index} out of bounds (grid has {len} nodes)")]
    NodeOutOfBounds { index: usize, len: usize },
    /// A resolved face neighbor does not have exactly one face pointing
    /// back at the cell.
    #[error("face {face} of cell `{cell}` names neighbor `{neighbor}`, but the neighbor does not have exactly one face pointing back")]
    NonMutualFace {
        cell: CellId,
        face: usize,
        neighbor: CellId,
    },
    /// A face still marked "unresolved" was reached by a pass that needs
    /// resolved neighbors.
    #[error("face {face} of cell `{cell}` has an unresolved neighbor reference")]
    UnresolvedNeighbor { cell: CellId, face: usize },
    /// The geometry dispatch table does not cover this cell shape.
    ///
    /// This is a configuration error: the dispatch table is expected to be
    /// exhaustive over every shape the grid can produce.
    #[error("unsupported cell shape {shape:?} in {context}")]
    UnsupportedCellShape {
        shape: CellShape,
        context: &'static str,
    },
    /// A sweep direction with zero length was supplied.
    #[error("sweep direction must have non-zero length")]
    ZeroDirection,
    /// Ray tracing found no face with a strictly positive crossing distance.
    ///
    /// The ray does not exit the cell through any face; this usually signals
    /// an upstream geometric inconsistency (origin outside the cell, inverted
    /// face normals).
    #[error("ray does not exit cell `{cell}` through any face")]
    NoExitFound { cell: CellId },
    /// The owned cells of one partition form a dependency cycle among
    /// themselves (e.g. a periodic wrap inside a single partition).
    ///
    /// Inter-partition cycles are an expected, modeled case and land in the
    /// delayed set instead; a purely local cycle cannot be swept at all.
    #[error("local dependency cycle on rank {rank}: {remaining} cell(s) cannot be ordered")]
    LocalCycle { rank: usize, remaining: usize },
    /// A face-size category index past the histogram's bin count.
    #[error("unknown face category {0}")]
    UnknownFaceCategory(usize),
    /// A face dof count that matches none of the histogram's bins.
    #[error("no face category holds faces with {dofs} dof(s)")]
    UncategorizedFace { dofs: usize },
    /// A `(cell, face)` pair that was never registered during the linkage
    /// store build.
    #[error("face {face} of cell `{cell}` was not registered in the flux linkage store")]
    SlotNotFound { cell: CellId, face: usize },
    /// A slot index past the number of claims in its lock box.
    #[error("slot {slot} out of range for face category {category} ({max} slot(s) claimed)")]
    SlotOutOfRange {
        category: usize,
        slot: usize,
        max: usize,
    },
    /// A delayed-box slot index past the number of delayed claims.
    #[error("delayed slot {slot} out of range ({max} slot(s) claimed)")]
    DelayedSlotOutOfRange { slot: usize, max: usize },
    /// A slot index past the number of faces in a neighbor rank's stream.
    #[error("slot {slot} out of range for rank {rank}'s stream ({max} face(s))")]
    RemoteSlotOutOfRange {
        rank: usize,
        slot: usize,
        max: usize,
    },
    /// The flux linkage store was asked for zero energy groups.
    #[error("flux store needs at least one energy group")]
    ZeroGroups,
    /// An energy-group index past the group count the store was built with.
    #[error("group {group} out of range ({num_groups} group(s))")]
    GroupOutOfRange { group: usize, num_groups: usize },
    /// No compact cell view was registered for this neighbor cell.
    #[error("no compact view of cell `{cell}` registered for rank {rank}")]
    ViewNotFound { rank: usize, cell: CellId },
    /// A rank that is neither a predecessor nor a successor of this
    /// partition for the direction the store was built with.
    #[error("rank {0} is not a dependency of this partition")]
    UnknownNeighborRank(usize),
    /// A received flux payload had the wrong length.
    #[error("buffer size mismatch with rank {neighbor}: expected {expected} bytes, got {got}")]
    BufferSizeMismatch {
        neighbor: usize,
        expected: usize,
        got: usize,
    },
    /// A send or receive against a neighbor rank failed.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// A wire payload failed structural validation during decoding.
    #[error("malformed wire payload: {0}")]
    MalformedWire(String),
}
