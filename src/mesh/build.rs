//! Structured mesh generators for sweep setup and testing.
//!
//! These produce fully resolved, replicated grids: every face neighbor is
//! either a cell id or a boundary marker, and each cell carries its owner
//! rank from the supplied per-cell partition list.

use crate::mesh::cell::{Cell, CellShape, Face, FaceNeighbor};
use crate::mesh::grid::Grid;
use crate::mesh::id::CellId;
use crate::sweep_error::SweepError;

/// Boundary markers used by the generators, one per box side.
pub mod boundary {
    pub const XMIN: u32 = 0;
    pub const XMAX: u32 = 1;
    pub const YMIN: u32 = 2;
    pub const YMAX: u32 = 3;
    pub const ZMIN: u32 = 4;
    pub const ZMAX: u32 = 5;
}

const FRAC_1_SQRT_2: f64 = std::f64::consts::FRAC_1_SQRT_2;

fn check_partitions(num_cells: usize, partitions: &[usize]) -> Result<(), SweepError> {
    if partitions.len() != num_cells {
        return Err(SweepError::InvalidMeshSpec(format!(
            "expected {num_cells} partition entries, got {}",
            partitions.len()
        )));
    }
    Ok(())
}

/// Chain of segment cells along x with nodes at the given coordinates.
///
/// With `periodic`, the two outer faces wrap onto each other instead of
/// carrying boundary markers; a periodic chain split across two ranks is
/// the minimal inter-partition dependency cycle.
pub fn segment_chain(xs: &[f64], partitions: &[usize], periodic: bool) -> Result<Grid, SweepError> {
    if xs.len() < 2 {
        return Err(SweepError::InvalidMeshSpec(
            "segment chain needs at least two nodes".into(),
        ));
    }
    let n = xs.len() - 1;
    check_partitions(n, partitions)?;
    if periodic && n < 2 {
        return Err(SweepError::InvalidMeshSpec(
            "periodic segment chain needs at least two cells".into(),
        ));
    }

    let nodes: Vec<[f64; 3]> = xs.iter().map(|&x| [x, 0.0, 0.0]).collect();
    let mut builder = Grid::builder(nodes);
    for i in 0..n {
        let left = if i > 0 {
            FaceNeighbor::Cell(CellId::new(i as u64))
        } else if periodic {
            FaceNeighbor::Cell(CellId::new(n as u64))
        } else {
            FaceNeighbor::Boundary(boundary::XMIN)
        };
        let right = if i + 1 < n {
            FaceNeighbor::Cell(CellId::new(i as u64 + 2))
        } else if periodic {
            FaceNeighbor::Cell(CellId::new(1))
        } else {
            FaceNeighbor::Boundary(boundary::XMAX)
        };
        builder.add_cell(Cell::new(
            CellId::new(i as u64 + 1),
            CellShape::Segment,
            partitions[i],
            0,
            vec![i, i + 1],
            vec![
                Face::new(vec![i], [-1.0, 0.0, 0.0], left),
                Face::new(vec![i + 1], [1.0, 0.0, 0.0], right),
            ],
        ));
    }
    builder.build()
}

/// `nx` by `ny` block of unit quadrilaterals in the z = 0 plane.
///
/// Cells are numbered row-major, bottom row first; `partitions[j * nx + i]`
/// owns cell `(i, j)`.
pub fn quad_mesh(nx: usize, ny: usize, partitions: &[usize]) -> Result<Grid, SweepError> {
    if nx == 0 || ny == 0 {
        return Err(SweepError::InvalidMeshSpec(
            "quad mesh needs at least one cell per direction".into(),
        ));
    }
    check_partitions(nx * ny, partitions)?;

    let mut nodes = Vec::with_capacity((nx + 1) * (ny + 1));
    for j in 0..=ny {
        for i in 0..=nx {
            nodes.push([i as f64, j as f64, 0.0]);
        }
    }

    let node = |i: usize, j: usize| j * (nx + 1) + i;
    let cell_id = |i: usize, j: usize| CellId::new((j * nx + i) as u64 + 1);
    let mut builder = Grid::builder(nodes);
    for j in 0..ny {
        for i in 0..nx {
            let bottom = if j > 0 {
                FaceNeighbor::Cell(cell_id(i, j - 1))
            } else {
                FaceNeighbor::Boundary(boundary::YMIN)
            };
            let right = if i + 1 < nx {
                FaceNeighbor::Cell(cell_id(i + 1, j))
            } else {
                FaceNeighbor::Boundary(boundary::XMAX)
            };
            let top = if j + 1 < ny {
                FaceNeighbor::Cell(cell_id(i, j + 1))
            } else {
                FaceNeighbor::Boundary(boundary::YMAX)
            };
            let left = if i > 0 {
                FaceNeighbor::Cell(cell_id(i - 1, j))
            } else {
                FaceNeighbor::Boundary(boundary::XMIN)
            };
            builder.add_cell(Cell::new(
                cell_id(i, j),
                CellShape::Polygon,
                partitions[j * nx + i],
                0,
                vec![node(i, j), node(i + 1, j), node(i + 1, j + 1), node(i, j + 1)],
                vec![
                    Face::new(vec![node(i, j), node(i + 1, j)], [0.0, -1.0, 0.0], bottom),
                    Face::new(
                        vec![node(i + 1, j), node(i + 1, j + 1)],
                        [1.0, 0.0, 0.0],
                        right,
                    ),
                    Face::new(
                        vec![node(i + 1, j + 1), node(i, j + 1)],
                        [0.0, 1.0, 0.0],
                        top,
                    ),
                    Face::new(vec![node(i, j + 1), node(i, j)], [-1.0, 0.0, 0.0], left),
                ],
            ));
        }
    }
    builder.build()
}

/// Stack of `layers` triangular prisms extruded along z in unit steps.
///
/// The shared faces are triangles and the lateral faces quads, so the grid
/// carries two face-size categories (3 and 4 dofs).
pub fn prism_stack(layers: usize, partitions: &[usize]) -> Result<Grid, SweepError> {
    if layers == 0 {
        return Err(SweepError::InvalidMeshSpec(
            "prism stack needs at least one layer".into(),
        ));
    }
    check_partitions(layers, partitions)?;

    // Node level l: (0,0,l), (1,0,l), (0,1,l).
    let mut nodes = Vec::with_capacity(3 * (layers + 1));
    for l in 0..=layers {
        let z = l as f64;
        nodes.push([0.0, 0.0, z]);
        nodes.push([1.0, 0.0, z]);
        nodes.push([0.0, 1.0, z]);
    }

    let mut builder = Grid::builder(nodes);
    for l in 0..layers {
        let (a, b, c) = (3 * l, 3 * l + 1, 3 * l + 2);
        let (a1, b1, c1) = (a + 3, b + 3, c + 3);
        let below = if l > 0 {
            FaceNeighbor::Cell(CellId::new(l as u64))
        } else {
            FaceNeighbor::Boundary(boundary::ZMIN)
        };
        let above = if l + 1 < layers {
            FaceNeighbor::Cell(CellId::new(l as u64 + 2))
        } else {
            FaceNeighbor::Boundary(boundary::ZMAX)
        };
        builder.add_cell(Cell::new(
            CellId::new(l as u64 + 1),
            CellShape::Polyhedron,
            partitions[l],
            0,
            vec![a, b, c, a1, b1, c1],
            vec![
                Face::new(vec![a, c, b], [0.0, 0.0, -1.0], below),
                Face::new(vec![a1, b1, c1], [0.0, 0.0, 1.0], above),
                Face::new(
                    vec![a, b, b1, a1],
                    [0.0, -1.0, 0.0],
                    FaceNeighbor::Boundary(boundary::YMIN),
                ),
                Face::new(
                    vec![b, c, c1, b1],
                    [FRAC_1_SQRT_2, FRAC_1_SQRT_2, 0.0],
                    FaceNeighbor::Boundary(boundary::XMAX),
                ),
                Face::new(
                    vec![c, a, a1, c1],
                    [-1.0, 0.0, 0.0],
                    FaceNeighbor::Boundary(boundary::XMIN),
                ),
            ],
        ));
    }
    builder.build()
}
