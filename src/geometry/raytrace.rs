//! Ray tracing against grid cells.
//!
//! The exit query treats the ray as a long finite segment rather than a true
//! infinite ray, which keeps the plane-intersection test numerically bounded.
//! With the exception of segment cells this algorithm looks for intersection
//! with triangles: the first step checks the intersection with the plane
//! formed by a face's normal and a reference point on that face.

use crate::geometry::{add, cross, dot, scale, sub};
use crate::mesh::cell::{Cell, CellShape, FaceNeighbor};
use crate::mesh::grid::Grid;
use crate::sweep_error::SweepError;

/// Finite extension applied to the ray before plane tests.
pub const RAY_EXTENSION: f64 = 1.0e15;

/// Crossings closer than this to the ray origin are rejected as
/// self-intersection.
const SELF_INTERSECT_TOL: f64 = 1.0e-10;

/// Slack for barycentric containment on triangulated sub-faces.
const BARY_TOL: f64 = 1.0e-10;

/// Result of a successful exit query.
#[derive(Clone, Debug, PartialEq)]
pub struct RayHit {
    /// Distance from the ray origin to the crossed face.
    pub distance: f64,
    /// Position where the ray leaves the cell.
    pub exit_point: [f64; 3],
    /// Index of the crossed face within the cell's face list.
    pub face_index: usize,
    /// What lies on the far side of the crossed face.
    pub neighbor: FaceNeighbor,
}

/// Intersect the segment `p0 -> p1` with the plane through `plane_point`
/// with the given normal.
///
/// Returns the intersection point and the parametric weights `(w, 1 - w)`
/// of that point along the segment, or `None` when the segment does not
/// cross the plane.
pub fn plane_line_intersect(
    normal: [f64; 3],
    plane_point: [f64; 3],
    p0: [f64; 3],
    p1: [f64; 3],
) -> Option<([f64; 3], (f64, f64))> {
    let d0 = dot(normal, sub(p0, plane_point));
    let d1 = dot(normal, sub(p1, plane_point));
    let denom = d0 - d1;
    if denom.abs() < f64::EPSILON {
        // Segment parallel to (or inside) the plane.
        return None;
    }
    let w = d0 / denom;
    if !(0.0..=1.0).contains(&w) {
        return None;
    }
    let point = add(p0, scale(sub(p1, p0), w));
    Some((point, (w, 1.0 - w)))
}

/// Intersect the segment `p0 -> p1` with the triangle `(v0, v1, v2)`,
/// returning the parametric weight along the segment.
fn intersect_triangle(
    p0: [f64; 3],
    p1: [f64; 3],
    v0: [f64; 3],
    v1: [f64; 3],
    v2: [f64; 3],
) -> Option<f64> {
    let e1 = sub(v1, v0);
    let e2 = sub(v2, v0);
    let n = cross(e1, e2);
    let (point, (w, _)) = plane_line_intersect(n, v0, p0, p1)?;

    // Barycentric containment of the plane hit.
    let vp = sub(point, v0);
    let d00 = dot(e1, e1);
    let d01 = dot(e1, e2);
    let d11 = dot(e2, e2);
    let d20 = dot(vp, e1);
    let d21 = dot(vp, e2);
    let denom = d00 * d11 - d01 * d01;
    if denom.abs() < f64::EPSILON {
        return None;
    }
    let u = (d11 * d20 - d01 * d21) / denom;
    let v = (d00 * d21 - d01 * d20) / denom;
    if u >= -BARY_TOL && v >= -BARY_TOL && u + v <= 1.0 + BARY_TOL {
        Some(w)
    } else {
        None
    }
}

/// Distance to the cell's exit surface along `direction`, plus which face
/// was crossed and what lies behind it.
///
/// Polygonal and polyhedral cells are assumed convex: the closest strictly
/// positive plane crossing is the exit face.
///
/// # Errors
/// - [`SweepError::ZeroDirection`] for a zero-length direction.
/// - [`SweepError::UnsupportedCellShape`] for [`CellShape::Generic`]; the
///   dispatch table must cover every shape the grid can produce, so this is
///   a configuration error.
/// - [`SweepError::NoExitFound`] when no face yields a positive crossing
///   distance, which signals upstream geometric inconsistency.
pub fn ray_trace(
    grid: &Grid,
    cell: &Cell,
    origin: [f64; 3],
    direction: [f64; 3],
) -> Result<RayHit, SweepError> {
    if dot(direction, direction) == 0.0 {
        return Err(SweepError::ZeroDirection);
    }
    let far_end = add(origin, scale(direction, RAY_EXTENSION));

    match cell.shape {
        CellShape::Segment => {
            for (f, face) in cell.faces.iter().enumerate() {
                let face_point = grid.node(face.vertex_ids[0])?;
                let Some((_, (w, _))) = plane_line_intersect(face.normal, face_point, origin, far_end)
                else {
                    continue;
                };
                let distance = w * RAY_EXTENSION;
                if distance > SELF_INTERSECT_TOL {
                    return Ok(RayHit {
                        distance,
                        exit_point: add(origin, scale(direction, distance)),
                        face_index: f,
                        neighbor: face.neighbor,
                    });
                }
            }
            Err(SweepError::NoExitFound { cell: cell.id })
        }
        CellShape::Polygon => {
            let mut best: Option<(f64, usize)> = None;
            for (f, face) in cell.faces.iter().enumerate() {
                let face_point = grid.node(face.vertex_ids[0])?;
                let Some((_, (w, _))) = plane_line_intersect(face.normal, face_point, origin, far_end)
                else {
                    continue;
                };
                let distance = w * RAY_EXTENSION;
                if distance > SELF_INTERSECT_TOL
                    && best.is_none_or(|(d, _)| distance < d)
                {
                    best = Some((distance, f));
                }
            }
            finish(cell, origin, direction, best)
        }
        CellShape::Polyhedron => {
            let mut best: Option<(f64, usize)> = None;
            for (f, face) in cell.faces.iter().enumerate() {
                // Fan triangulation about the face's first vertex.
                let v0 = grid.node(face.vertex_ids[0])?;
                for i in 1..face.vertex_ids.len().saturating_sub(1) {
                    let v1 = grid.node(face.vertex_ids[i])?;
                    let v2 = grid.node(face.vertex_ids[i + 1])?;
                    let Some(w) = intersect_triangle(origin, far_end, v0, v1, v2) else {
                        continue;
                    };
                    let distance = w * RAY_EXTENSION;
                    if distance > SELF_INTERSECT_TOL
                        && best.is_none_or(|(d, _)| distance < d)
                    {
                        best = Some((distance, f));
                    }
                }
            }
            finish(cell, origin, direction, best)
        }
        CellShape::Generic => Err(SweepError::UnsupportedCellShape {
            shape: cell.shape,
            context: "ray tracing",
        }),
    }
}

fn finish(
    cell: &Cell,
    origin: [f64; 3],
    direction: [f64; 3],
    best: Option<(f64, usize)>,
) -> Result<RayHit, SweepError> {
    let (distance, face_index) =
        best.ok_or(SweepError::NoExitFound { cell: cell.id })?;
    Ok(RayHit {
        distance,
        exit_point: add(origin, scale(direction, distance)),
        face_index,
        neighbor: cell.faces[face_index].neighbor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::build::{boundary, prism_stack, quad_mesh, segment_chain};
    use crate::mesh::cell::CellShape;
    use crate::mesh::id::CellId;

    #[test]
    fn segment_exit_from_midpoint() {
        let g = segment_chain(&[0.0, 1.0, 2.0, 3.0], &[0, 0, 0], false).unwrap();
        let c0 = g.cell(CellId::new(1)).unwrap();
        let hit = ray_trace(&g, c0, [0.5, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert!((hit.distance - 0.5).abs() < 1e-9);
        assert!((hit.exit_point[0] - 1.0).abs() < 1e-9);
        assert_eq!(hit.neighbor, FaceNeighbor::Cell(CellId::new(2)));
    }

    #[test]
    fn segment_exit_against_the_chain() {
        let g = segment_chain(&[0.0, 1.0, 2.0], &[0, 0], false).unwrap();
        let c0 = g.cell(CellId::new(1)).unwrap();
        let hit = ray_trace(&g, c0, [0.25, 0.0, 0.0], [-1.0, 0.0, 0.0]).unwrap();
        assert!((hit.distance - 0.25).abs() < 1e-9);
        assert_eq!(hit.face_index, 0);
        assert_eq!(hit.neighbor, FaceNeighbor::Boundary(boundary::XMIN));
    }

    #[test]
    fn polygon_exit_picks_closest_face() {
        let g = quad_mesh(2, 1, &[0, 0]).unwrap();
        let c0 = g.cell(CellId::new(1)).unwrap();
        // From the quad center, heading +x: the shared edge at x=1.
        let hit = ray_trace(&g, c0, [0.5, 0.5, 0.0], [1.0, 0.0, 0.0]).unwrap();
        assert!((hit.distance - 0.5).abs() < 1e-9);
        assert_eq!(hit.neighbor, FaceNeighbor::Cell(CellId::new(2)));
        // From just below the top edge, heading straight up.
        let hit = ray_trace(&g, c0, [0.5, 0.75, 0.0], [0.0, 1.0, 0.0]).unwrap();
        assert!((hit.distance - 0.25).abs() < 1e-9);
        assert_eq!(hit.neighbor, FaceNeighbor::Boundary(boundary::YMAX));
    }

    #[test]
    fn polyhedron_exit_through_shared_triangle() {
        let g = prism_stack(2, &[0, 0]).unwrap();
        let c0 = g.cell(CellId::new(1)).unwrap();
        let hit = ray_trace(&g, c0, [0.25, 0.25, 0.5], [0.0, 0.0, 1.0]).unwrap();
        assert!((hit.distance - 0.5).abs() < 1e-9);
        assert_eq!(hit.neighbor, FaceNeighbor::Cell(CellId::new(2)));
    }

    #[test]
    fn no_exit_reported_for_origin_outside_cell() {
        let g = segment_chain(&[0.0, 1.0], &[0], false).unwrap();
        let c0 = g.cell(CellId::new(1)).unwrap();
        let err = ray_trace(&g, c0, [5.0, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap_err();
        assert_eq!(err, SweepError::NoExitFound { cell: CellId::new(1) });
    }

    #[test]
    fn generic_shape_is_a_configuration_error() {
        let g = segment_chain(&[0.0, 1.0], &[0], false).unwrap();
        let mut cell = g.cell(CellId::new(1)).unwrap().clone();
        cell.shape = CellShape::Generic;
        let err = ray_trace(&g, &cell, [0.5, 0.0, 0.0], [1.0, 0.0, 0.0]).unwrap_err();
        assert!(matches!(err, SweepError::UnsupportedCellShape { .. }));
    }

    #[test]
    fn zero_direction_rejected() {
        let g = segment_chain(&[0.0, 1.0], &[0], false).unwrap();
        let c0 = g.cell(CellId::new(1)).unwrap();
        assert_eq!(
            ray_trace(&g, c0, [0.5, 0.0, 0.0], [0.0; 3]).unwrap_err(),
            SweepError::ZeroDirection
        );
    }
}
