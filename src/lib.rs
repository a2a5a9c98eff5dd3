//! # mesh-sweep
//!
//! mesh-sweep computes valid execution orders for parallel transport sweeps
//! over spatially decomposed unstructured meshes. For each sweep direction
//! it produces a per-partition cell visiting order, the cross-partition
//! dependency sets (with inter-partition dependency cycles detected and
//! routed to a delayed set), and a face-size-bucketed flux buffer layout
//! with O(1) per-face lookups.
//!
//! ## Components
//! - [`mesh`]: the replicated, read-only grid model (cells, faces,
//!   face-size histogram) plus structured generators for setup and testing
//! - [`geometry`]: ray/plane intersection and cell exit queries over the
//!   closed set of cell shapes
//! - [`sweep`]: the dependency structure ([`sweep::SweepOrdering`]), the
//!   flux linkage store ([`sweep::FluxLinkageStore`]), buffer allocation,
//!   and cross-partition exchange
//! - [`comm`]: pluggable communication backends (serial, in-process
//!   threads, MPI behind the `mpi-support` feature)
//!
//! ## Determinism
//!
//! Ordering and buffer layout are pure functions of the grid, the
//! direction, and the candidate order: the same inputs reproduce the same
//! outputs bit for bit, on every rank. Cross-partition stream layouts are
//! derived independently on both endpoints and agree by construction.
//!
//! ## Lifecycle
//!
//! An ordering and its linkage store are built once per (direction,
//! partition) pairing, then reused for every sweep within a solve; rebuild
//! only when the mesh or the direction set changes. Construction is
//! single-threaded and side-effect-free; the built structures are read-only
//! during the concurrent sweep phase.

pub mod comm;
pub mod geometry;
pub mod mesh;
pub mod sweep;
pub mod sweep_error;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    #[cfg(feature = "mpi-support")]
    pub use crate::comm::MpiComm;
    pub use crate::comm::{Communicator, NoComm, ThreadComm, Wait};
    pub use crate::geometry::{RayHit, ray_trace};
    pub use crate::mesh::cell::{Cell, CellShape, Face, FaceNeighbor};
    pub use crate::mesh::grid::{FaceHistogram, Grid, GridBuilder};
    pub use crate::mesh::id::CellId;
    pub use crate::sweep::buffers::FluxBuffers;
    pub use crate::sweep::exchange::{exchange_cell_views, exchange_flux};
    pub use crate::sweep::fluds::{CompactCellView, FluxLinkageStore};
    pub use crate::sweep::spds::{FaceOrientation, SweepOrdering, classify};
    pub use crate::sweep_error::SweepError;
}
