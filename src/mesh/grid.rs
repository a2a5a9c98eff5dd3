//! The read-only grid consumed by the sweep core.
//!
//! A `Grid` is replicated on every process: all cells are present, each
//! tagged with the rank that owns it. A process's *view* of the grid is
//! selected by the rank it passes to the sweep builders, never by ambient
//! state.
//!
//! Construction goes through [`GridBuilder`], which assigns dense local ids
//! per partition, checks vertex indices, and precomputes the face-size
//! histogram. Topology validation (mutual-face invariant) is a separate,
//! optional pass.

use std::collections::{BTreeMap, HashMap};

use crate::mesh::cell::{Cell, FaceNeighbor};
use crate::mesh::id::CellId;
use crate::sweep_error::SweepError;

/// Face-size histogram: the distinct face dof counts observed in the grid.
///
/// Buckets let flux buffers be allocated as a small number of uniformly
/// strided blocks instead of one padded block per face shape.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FaceHistogram {
    /// Sorted, distinct dof counts; index = category.
    bins: Vec<usize>,
}

impl FaceHistogram {
    fn from_cells<'a>(cells: impl Iterator<Item = &'a Cell>) -> Self {
        use itertools::Itertools;
        let bins = cells
            .flat_map(|c| c.faces.iter().map(|f| f.dof_count()))
            .sorted_unstable()
            .dedup()
            .collect();
        Self { bins }
    }

    /// Number of face-size categories.
    #[inline]
    pub fn num_categories(&self) -> usize {
        self.bins.len()
    }

    /// Dofs per face in the given category.
    pub fn dofs_for(&self, category: usize) -> Result<usize, SweepError> {
        self.bins
            .get(category)
            .copied()
            .ok_or(SweepError::UnknownFaceCategory(category))
    }

    /// Category holding faces with exactly `dofs` degrees of freedom.
    pub fn category_of(&self, dofs: usize) -> Result<usize, SweepError> {
        self.bins
            .binary_search(&dofs)
            .map_err(|_| SweepError::UncategorizedFace { dofs })
    }

    /// The single largest face dof count in the grid (0 for an empty grid).
    ///
    /// The delayed lock box is strided by this value, no bucketing.
    #[inline]
    pub fn largest_face(&self) -> usize {
        self.bins.last().copied().unwrap_or(0)
    }
}

/// Replicated, read-only mesh view.
#[derive(Clone, Debug)]
pub struct Grid {
    nodes: Vec<[f64; 3]>,
    cells: Vec<Cell>,
    index_of: HashMap<CellId, usize>,
    /// rank -> owned cell ids, in storage order.
    owned: BTreeMap<usize, Vec<CellId>>,
    histogram: FaceHistogram,
}

impl Grid {
    /// Start building a grid over the given node coordinates.
    pub fn builder(nodes: Vec<[f64; 3]>) -> GridBuilder {
        GridBuilder {
            nodes,
            cells: Vec::new(),
        }
    }

    /// Coordinates of node `index`.
    pub fn node(&self, index: usize) -> Result<[f64; 3], SweepError> {
        self.nodes
            .get(index)
            .copied()
            .ok_or(SweepError::NodeOutOfBounds {
                index,
                len: self.nodes.len(),
            })
    }

    #[inline]
    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.cells.len()
    }

    /// Cell lookup by global id.
    pub fn cell(&self, id: CellId) -> Result<&Cell, SweepError> {
        self.index_of
            .get(&id)
            .map(|&i| &self.cells[i])
            .ok_or(SweepError::UnknownCell(id))
    }

    /// All cells, in storage order.
    pub fn cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Cells owned by `rank`, in storage order (the initial candidate order
    /// for sweep ordering). Empty for a rank that owns nothing.
    pub fn owned_cells(&self, rank: usize) -> &[CellId] {
        self.owned.get(&rank).map_or(&[], Vec::as_slice)
    }

    /// Ranks that own at least one cell, ascending.
    pub fn partitions(&self) -> impl Iterator<Item = usize> + '_ {
        self.owned.keys().copied()
    }

    #[inline]
    pub fn histogram(&self) -> &FaceHistogram {
        &self.histogram
    }

    /// Check the mutual-face invariant over the whole grid.
    ///
    /// For every resolved non-boundary face, the neighbor must exist and
    /// carry exactly one face pointing back.
    pub fn validate_topology(&self) -> Result<(), SweepError> {
        for cell in &self.cells {
            for (f, face) in cell.faces.iter().enumerate() {
                let Some(nbr_id) = face.neighbor.cell() else {
                    continue;
                };
                let nbr = self.cell(nbr_id)?;
                let back = nbr
                    .faces
                    .iter()
                    .filter(|nf| nf.neighbor == FaceNeighbor::Cell(cell.id))
                    .count();
                if back != 1 {
                    return Err(SweepError::NonMutualFace {
                        cell: cell.id,
                        face: f,
                        neighbor: nbr_id,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Accumulates cells, then produces an immutable [`Grid`].
#[derive(Debug, Default)]
pub struct GridBuilder {
    nodes: Vec<[f64; 3]>,
    cells: Vec<Cell>,
}

impl GridBuilder {
    pub fn add_cell(&mut self, cell: Cell) -> &mut Self {
        self.cells.push(cell);
        self
    }

    /// Finalize: index cells, assign dense per-partition local ids, bounds-
    /// check vertex references, and compute the face-size histogram.
    pub fn build(self) -> Result<Grid, SweepError> {
        let GridBuilder { nodes, mut cells } = self;

        let mut index_of = HashMap::with_capacity(cells.len());
        let mut owned: BTreeMap<usize, Vec<CellId>> = BTreeMap::new();
        for (i, cell) in cells.iter_mut().enumerate() {
            if index_of.insert(cell.id, i).is_some() {
                return Err(SweepError::DuplicateCell(cell.id));
            }
            for &v in cell
                .vertex_ids
                .iter()
                .chain(cell.faces.iter().flat_map(|f| f.vertex_ids.iter()))
            {
                if v >= nodes.len() {
                    return Err(SweepError::NodeOutOfBounds {
                        index: v,
                        len: nodes.len(),
                    });
                }
            }
            let locals = owned.entry(cell.partition).or_default();
            cell.local_id = Some(locals.len());
            locals.push(cell.id);
        }

        let histogram = FaceHistogram::from_cells(cells.iter());
        log::debug!(
            "grid built: {} cells, {} nodes, {} partitions, {} face categories",
            cells.len(),
            nodes.len(),
            owned.len(),
            histogram.num_categories()
        );

        Ok(Grid {
            nodes,
            cells,
            index_of,
            owned,
            histogram,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::cell::{CellShape, Face};

    fn cell(id: u64, partition: usize, faces: Vec<Face>) -> Cell {
        Cell::new(
            CellId::new(id),
            CellShape::Segment,
            partition,
            0,
            vec![0, 1],
            faces,
        )
    }

    #[test]
    fn duplicate_ids_rejected() {
        let mut b = Grid::builder(vec![[0.0; 3], [1.0, 0.0, 0.0]]);
        b.add_cell(cell(1, 0, vec![]));
        b.add_cell(cell(1, 0, vec![]));
        assert_eq!(
            b.build().unwrap_err(),
            SweepError::DuplicateCell(CellId::new(1))
        );
    }

    #[test]
    fn vertex_bounds_checked() {
        let mut b = Grid::builder(vec![[0.0; 3]]);
        b.add_cell(cell(1, 0, vec![]));
        assert!(matches!(
            b.build(),
            Err(SweepError::NodeOutOfBounds { index: 1, len: 1 })
        ));
    }

    #[test]
    fn local_ids_dense_per_partition() {
        let mut b = Grid::builder(vec![[0.0; 3], [1.0, 0.0, 0.0]]);
        b.add_cell(cell(1, 0, vec![]));
        b.add_cell(cell(2, 1, vec![]));
        b.add_cell(cell(3, 0, vec![]));
        let g = b.build().unwrap();
        assert_eq!(g.cell(CellId::new(1)).unwrap().local_id, Some(0));
        assert_eq!(g.cell(CellId::new(2)).unwrap().local_id, Some(0));
        assert_eq!(g.cell(CellId::new(3)).unwrap().local_id, Some(1));
        assert_eq!(g.owned_cells(0), &[CellId::new(1), CellId::new(3)]);
        assert_eq!(g.owned_cells(7), &[] as &[CellId]);
    }

    #[test]
    fn histogram_bins_sorted_distinct() {
        let mut b = Grid::builder(vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let faces = vec![
            Face::new(vec![0], [-1.0, 0.0, 0.0], FaceNeighbor::Boundary(0)),
            Face::new(vec![0, 1, 2], [0.0, 0.0, 1.0], FaceNeighbor::Boundary(1)),
            Face::new(vec![1], [1.0, 0.0, 0.0], FaceNeighbor::Boundary(1)),
        ];
        b.add_cell(cell(1, 0, faces));
        let g = b.build().unwrap();
        let h = g.histogram();
        assert_eq!(h.num_categories(), 2);
        assert_eq!(h.dofs_for(0), Ok(1));
        assert_eq!(h.dofs_for(1), Ok(3));
        assert_eq!(h.category_of(3), Ok(1));
        assert_eq!(h.largest_face(), 3);
        assert_eq!(
            h.category_of(2),
            Err(SweepError::UncategorizedFace { dofs: 2 })
        );
        assert_eq!(h.dofs_for(5), Err(SweepError::UnknownFaceCategory(5)));
    }
}
