//! Sweep scheduling: ordering, flux linkage, buffers, and exchange.

pub mod buffers;
pub mod exchange;
pub mod fluds;
pub mod spds;

pub use buffers::FluxBuffers;
pub use fluds::{CompactCellView, FluxLinkageStore};
pub use spds::{FaceOrientation, SweepOrdering, classify};
