// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Mesh group assembly
//!
//! Merges an entity's triangulated faces into few large buffers, one per
//! surface-type label (or a single default group). Per-face meshes are
//! typically a handful of triangles; drawing them individually would mean
//! one draw call per face.

use crate::mesh::{calculate_normals, CoordinateShift, Mesh};
use crate::semantics::SurfaceType;
use city_lite_core::Vertex;
use rustc_hash::FxHashMap;

/// Group key used when grouping by semantics is disabled
pub const DEFAULT_GROUP: &str = "default";

/// One triangulated face: resolved surface type plus local position/index
/// buffers, ready to be merged
#[derive(Debug, Clone)]
pub struct TriangulatedFace {
    pub surface: SurfaceType,
    pub positions: Vec<f32>,
    pub indices: Vec<u32>,
}

impl TriangulatedFace {
    /// Build local buffers from pool-indexed triangles. Pool vertices shared
    /// between triangles of this face collapse to one local vertex; the
    /// shift is subtracted in f64 before the f32 conversion.
    pub fn from_triangles(
        surface: SurfaceType,
        triangles: &[[usize; 3]],
        vertices: &[Vertex],
        shift: &CoordinateShift,
    ) -> Self {
        let mut local: FxHashMap<usize, u32> = FxHashMap::default();
        let mut positions: Vec<f32> = Vec::with_capacity(triangles.len() * 9);
        let mut indices: Vec<u32> = Vec::with_capacity(triangles.len() * 3);

        for triangle in triangles {
            for &pool_index in triangle {
                let local_index = match local.entry(pool_index) {
                    std::collections::hash_map::Entry::Occupied(entry) => *entry.get(),
                    std::collections::hash_map::Entry::Vacant(entry) => {
                        let next = (positions.len() / 3) as u32;
                        let vertex = &vertices[pool_index];
                        positions.push((vertex.x - shift.x) as f32);
                        positions.push((vertex.y - shift.y) as f32);
                        positions.push((vertex.z - shift.z) as f32);
                        entry.insert(next);
                        next
                    }
                };
                indices.push(local_index);
            }
        }

        Self {
            surface,
            positions,
            indices,
        }
    }
}

/// A merged per-label mesh for one entity
#[derive(Debug, Clone)]
pub struct AssembledGroup {
    pub surface: String,
    pub mesh: Mesh,
}

/// Merge faces into one mesh per group key.
///
/// Totals are pre-computed so each combined buffer is allocated once; face
/// buffers are then copied in with a running vertex offset applied to their
/// indices. Vertex normals are recomputed on the merged buffers; per-face
/// normals are not reused.
pub fn assemble_groups(faces: &[TriangulatedFace], group_by_semantics: bool) -> Vec<AssembledGroup> {
    // Bucket faces, preserving first-seen label order for deterministic output
    let mut order: Vec<&str> = Vec::new();
    let mut buckets: FxHashMap<&str, Vec<&TriangulatedFace>> = FxHashMap::default();

    for face in faces {
        if face.positions.is_empty() {
            continue;
        }
        let key = if group_by_semantics {
            face.surface.label()
        } else {
            DEFAULT_GROUP
        };
        buckets
            .entry(key)
            .or_insert_with(|| {
                order.push(key);
                Vec::new()
            })
            .push(face);
    }

    let mut groups = Vec::with_capacity(order.len());
    for key in order {
        let bucket = &buckets[key];

        let total_vertices: usize = bucket.iter().map(|f| f.positions.len() / 3).sum();
        let total_indices: usize = bucket.iter().map(|f| f.indices.len()).sum();

        let mut mesh = Mesh::with_capacity(total_vertices, total_indices);
        for face in bucket {
            let base = mesh.vertex_count() as u32;
            mesh.positions.extend_from_slice(&face.positions);
            mesh.indices.extend(face.indices.iter().map(|&i| i + base));
        }

        calculate_normals(&mut mesh);

        groups.push(AssembledGroup {
            surface: key.to_string(),
            mesh,
        });
    }

    groups
}
