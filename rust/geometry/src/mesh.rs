// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh data structures

use nalgebra::{Point3, Vector3};

/// Relative-to-center shift subtracted from coordinates before Float32
/// conversion, preserving precision for models far from the origin
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CoordinateShift {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl CoordinateShift {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    /// The shift as a reference point for local-frame computation
    #[inline]
    pub fn reference_point(&self) -> Point3<f64> {
        Point3::new(self.x, self.y, self.z)
    }
}

/// Triangle mesh with flat position/normal/index buffers
#[derive(Debug, Clone, Default)]
pub struct Mesh {
    /// Vertex positions (x, y, z)
    pub positions: Vec<f32>,
    /// Vertex normals (nx, ny, nz)
    pub normals: Vec<f32>,
    /// Triangle indices (i0, i1, i2)
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(vertex_count: usize, index_count: usize) -> Self {
        Self {
            positions: Vec::with_capacity(vertex_count * 3),
            normals: Vec::with_capacity(vertex_count * 3),
            indices: Vec::with_capacity(index_count),
        }
    }

    /// Add a vertex, subtracting the shift in f64 BEFORE the f32 conversion.
    /// For coordinates like Dutch RD northings (~450 km) a direct f32
    /// conversion loses decimeters; shifting first keeps sub-millimeter
    /// precision.
    #[inline]
    pub fn add_vertex_with_shift(&mut self, position: Point3<f64>, shift: &CoordinateShift) {
        self.positions.push((position.x - shift.x) as f32);
        self.positions.push((position.y - shift.y) as f32);
        self.positions.push((position.z - shift.z) as f32);
    }

    #[inline]
    pub fn add_triangle(&mut self, i0: u32, i1: u32, i2: u32) {
        self.indices.push(i0);
        self.indices.push(i1);
        self.indices.push(i2);
    }

    /// Merge another mesh into this one, offsetting its indices
    #[inline]
    pub fn merge(&mut self, other: &Mesh) {
        if other.is_empty() {
            return;
        }

        let vertex_offset = (self.positions.len() / 3) as u32;

        self.positions.reserve(other.positions.len());
        self.indices.reserve(other.indices.len());

        self.positions.extend_from_slice(&other.positions);
        self.indices
            .extend(other.indices.iter().map(|&i| i + vertex_offset));
    }

    /// Batch merge, reserving the combined size upfront
    pub fn merge_all(&mut self, meshes: &[Mesh]) {
        let total_positions: usize = meshes.iter().map(|m| m.positions.len()).sum();
        let total_indices: usize = meshes.iter().map(|m| m.indices.len()).sum();

        self.positions.reserve(total_positions);
        self.indices.reserve(total_indices);

        for mesh in meshes {
            self.merge(mesh);
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    #[inline]
    pub fn position(&self, index: usize) -> Point3<f64> {
        Point3::new(
            self.positions[index * 3] as f64,
            self.positions[index * 3 + 1] as f64,
            self.positions[index * 3 + 2] as f64,
        )
    }

    /// Bounding box (min, max) of the positions
    pub fn bounds(&self) -> (Point3<f32>, Point3<f32>) {
        if self.is_empty() {
            return (Point3::origin(), Point3::origin());
        }

        let mut min = Point3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3::new(f32::MIN, f32::MIN, f32::MIN);

        self.positions.chunks_exact(3).for_each(|chunk| {
            min.x = min.x.min(chunk[0]);
            min.y = min.y.min(chunk[1]);
            min.z = min.z.min(chunk[2]);
            max.x = max.x.max(chunk[0]);
            max.y = max.y.max(chunk[1]);
            max.z = max.z.max(chunk[2]);
        });

        (min, max)
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.indices.clear();
    }
}

/// Recompute smooth vertex normals on a merged buffer.
///
/// Face normals are accumulated per vertex and normalized, so triangles
/// sharing a vertex within the buffer shade smoothly; per-face normals from
/// earlier pipeline stages are not reused.
pub fn calculate_normals(mesh: &mut Mesh) {
    let vertex_count = mesh.vertex_count();
    if vertex_count == 0 {
        return;
    }

    let mut normals = vec![Vector3::<f64>::zeros(); vertex_count];

    for triangle in mesh.indices.chunks_exact(3) {
        let i0 = triangle[0] as usize;
        let i1 = triangle[1] as usize;
        let i2 = triangle[2] as usize;

        let v0 = mesh.position(i0);
        let v1 = mesh.position(i1);
        let v2 = mesh.position(i2);

        // Unnormalized cross product weights the accumulation by face area
        let normal = (v1 - v0).cross(&(v2 - v0));

        normals[i0] += normal;
        normals[i1] += normal;
        normals[i2] += normal;
    }

    mesh.normals.clear();
    mesh.normals.reserve(vertex_count * 3);
    for normal in normals {
        let len = normal.norm();
        let n = if len > 1e-12 {
            normal / len
        } else {
            Vector3::new(0.0, 0.0, 1.0)
        };
        mesh.normals.push(n.x as f32);
        mesh.normals.push(n.y as f32);
        mesh.normals.push(n.z as f32);
    }
}
