//! Grid data model consumed by the sweep core.

pub mod build;
pub mod cell;
pub mod grid;
pub mod id;

pub use cell::{Cell, CellShape, Face, FaceNeighbor};
pub use grid::{FaceHistogram, Grid, GridBuilder};
pub use id::CellId;
