//! Cell and face records for the read-only sweep grid.
//!
//! Cells are polymorphic over a closed set of geometric shapes. The shape
//! tag is matched exhaustively wherever geometry is dispatched, so adding a
//! variant without a corresponding handler fails to compile instead of
//! failing at runtime.

use crate::mesh::id::CellId;

/// Closed set of geometric cell variants the grid can produce.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, serde::Serialize, serde::Deserialize)]
pub enum CellShape {
    /// 1D slab cell with two end faces of one vertex each.
    Segment,
    /// 2D cell whose faces are its edges.
    Polygon,
    /// 3D cell with arbitrary polygonal faces.
    Polyhedron,
    /// Shape-agnostic cell carrying only its face list.
    ///
    /// Classifiable (classification needs only face normals) but not
    /// ray-traceable.
    Generic,
}

/// What lies on the far side of a face.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub enum FaceNeighbor {
    /// Another cell, identified by its global id.
    Cell(CellId),
    /// A domain boundary, identified by its marker.
    Boundary(u32),
    /// Pending cross-partition resolution.
    Unresolved,
}

impl FaceNeighbor {
    /// The neighbor cell id, if the face borders another cell.
    #[inline]
    pub fn cell(&self) -> Option<CellId> {
        match self {
            FaceNeighbor::Cell(id) => Some(*id),
            _ => None,
        }
    }

    /// True if the face lies on a domain boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        matches!(self, FaceNeighbor::Boundary(_))
    }
}

/// One face of a cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Face {
    /// Vertex indices into the grid's node array, in face order.
    pub vertex_ids: Vec<usize>,
    /// Outward unit normal.
    pub normal: [f64; 3],
    /// Neighbor cell, boundary marker, or unresolved.
    pub neighbor: FaceNeighbor,
}

impl Face {
    pub fn new(vertex_ids: Vec<usize>, normal: [f64; 3], neighbor: FaceNeighbor) -> Self {
        Self {
            vertex_ids,
            normal,
            neighbor,
        }
    }

    /// Number of value-carrying degrees of freedom on this face.
    ///
    /// One dof per face vertex; this is the quantity the face-size histogram
    /// buckets on.
    #[inline]
    pub fn dof_count(&self) -> usize {
        self.vertex_ids.len()
    }
}

/// A grid cell.
///
/// `local_id` is assigned by the grid builder: dense, per-partition, in
/// insertion order. It is `None` until the cell lands in a built grid.
#[derive(Clone, Debug)]
pub struct Cell {
    pub id: CellId,
    pub local_id: Option<usize>,
    pub partition: usize,
    pub material: i32,
    pub vertex_ids: Vec<usize>,
    pub faces: Vec<Face>,
    pub shape: CellShape,
}

impl Cell {
    pub fn new(
        id: CellId,
        shape: CellShape,
        partition: usize,
        material: i32,
        vertex_ids: Vec<usize>,
        faces: Vec<Face>,
    ) -> Self {
        Self {
            id,
            local_id: None,
            partition,
            material,
            vertex_ids,
            faces,
            shape,
        }
    }

    /// Index of the face whose neighbor reference points back at `other`.
    ///
    /// A resolved non-boundary face is mutual: the neighboring cell has
    /// exactly one such face. Returns `None` when the invariant is broken.
    pub fn mutual_face(&self, other: CellId) -> Option<usize> {
        self.faces
            .iter()
            .position(|f| f.neighbor == FaceNeighbor::Cell(other))
    }
}
