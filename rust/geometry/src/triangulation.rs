// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar polygon triangulation
//!
//! Newell-method face normals, projection onto the two least-distorting
//! coordinate axes, and earcutr ear clipping with hole support. Vertex
//! positions are taken relative to a reference point so that models far from
//! the coordinate origin do not lose precision to cancellation.

use city_lite_core::Vertex;
use nalgebra::{Point3, Vector3};

/// Squared-length threshold below which a 3-point face counts as collapsed
pub const DEGENERATE_TRIANGLE_EPSILON: f64 = 1e-8;

/// Squared-length threshold below which a Newell normal counts as zero area
const ZERO_AREA_EPSILON: f64 = 1e-20;

/// Face normal by the Newell method, including the wrap-around edge.
/// The result is unnormalized; its length is twice the polygon area.
pub fn newell_normal(points: &[Point3<f64>]) -> Vector3<f64> {
    let mut normal = Vector3::<f64>::zeros();
    let n = points.len();
    for i in 0..n {
        let current = &points[i];
        let next = &points[(i + 1) % n];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
}

/// Normalized face normal of a ring, or zero for collapsed rings
pub fn face_normal(ring: &[usize], vertices: &[Vertex], reference: Point3<f64>) -> Vector3<f64> {
    let points: Vec<Point3<f64>> = ring
        .iter()
        .filter_map(|&i| vertices.get(i))
        .map(|v| local_point(v, reference))
        .collect();
    if points.len() < 3 {
        return Vector3::zeros();
    }
    let normal = newell_normal(&points);
    let len = normal.norm();
    if len > 0.0 {
        normal / len
    } else {
        Vector3::zeros()
    }
}

#[inline]
fn local_point(vertex: &Vertex, reference: Point3<f64>) -> Point3<f64> {
    Point3::new(
        vertex.x - reference.x,
        vertex.y - reference.y,
        vertex.z - reference.z,
    )
}

/// Index of the largest-magnitude normal component: the axis to drop when
/// projecting to 2D. Dropping the dominant axis minimizes distortion for
/// polygons not aligned with a coordinate plane.
#[inline]
fn dominant_axis(normal: &Vector3<f64>) -> usize {
    let (ax, ay, az) = (normal.x.abs(), normal.y.abs(), normal.z.abs());
    if az >= ax && az >= ay {
        2
    } else if ax >= ay {
        0
    } else {
        1
    }
}

#[inline]
fn project(point: &Point3<f64>, dropped_axis: usize) -> (f64, f64) {
    match dropped_axis {
        0 => (point.y, point.z),
        1 => (point.x, point.z),
        _ => (point.x, point.y),
    }
}

/// Triangulate one face: a cleaned outer ring plus optional hole rings.
///
/// Returns triangles as triples of vertex-pool indices, or `None` when the
/// face is geometrically collapsed or ear clipping yields nothing (the
/// caller records a diagnostic and continues with the next face).
pub fn triangulate_face(
    outer: &[usize],
    holes: &[Vec<usize>],
    vertices: &[Vertex],
    reference: Point3<f64>,
) -> Option<Vec<[usize; 3]>> {
    if outer.len() < 3 {
        return None;
    }

    let outer_points: Vec<Point3<f64>> = outer
        .iter()
        .map(|&i| vertices.get(i).map(|v| local_point(v, reference)))
        .collect::<Option<Vec<_>>>()?;

    // 3 points, no holes: only validate non-degeneracy
    if outer.len() == 3 && holes.is_empty() {
        let cross = (outer_points[1] - outer_points[0]).cross(&(outer_points[2] - outer_points[0]));
        if cross.norm_squared() < DEGENERATE_TRIANGLE_EPSILON {
            return None;
        }
        return Some(vec![[outer[0], outer[1], outer[2]]]);
    }

    let normal = newell_normal(&outer_points);
    if normal.norm_squared() < ZERO_AREA_EPSILON {
        return None;
    }
    let dropped = dominant_axis(&normal);

    let hole_count: usize = holes.iter().map(Vec::len).sum();
    let mut flat: Vec<f64> = Vec::with_capacity((outer.len() + hole_count) * 2);
    let mut index_map: Vec<usize> = Vec::with_capacity(outer.len() + hole_count);

    for (point, &index) in outer_points.iter().zip(outer) {
        let (u, v) = project(point, dropped);
        flat.push(u);
        flat.push(v);
        index_map.push(index);
    }

    let mut hole_starts: Vec<usize> = Vec::with_capacity(holes.len());
    for hole in holes {
        hole_starts.push(flat.len() / 2);
        for &index in hole {
            let point = local_point(vertices.get(index)?, reference);
            let (u, v) = project(&point, dropped);
            flat.push(u);
            flat.push(v);
            index_map.push(index);
        }
    }

    let triangles = earcutr::earcut(&flat, &hole_starts, 2).ok()?;
    if triangles.is_empty() {
        return None;
    }

    Some(
        triangles
            .chunks_exact(3)
            .map(|t| [index_map[t[0]], index_map[t[1]], index_map[t[2]]])
            .collect(),
    )
}
