// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! In-memory city model
//!
//! Shared vertex pool, recursively nested boundary/semantics trees and the
//! entity map. Boundary nesting depth is unbounded in the source format; it
//! is resolved into tagged variants once at parse time so that all downstream
//! traversal is structural pattern matching.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

/// One 3D point of the shared vertex pool, in real-world coordinates.
///
/// Dequantization (the model-level `Transform`) has already been applied when
/// a `Vertex` exists; no downstream code sees quantized integers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vertex {
    #[inline]
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// Model-level quantization transform: stored integer coordinates are
/// `real = stored * scale + translate`, applied exactly once at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuantizationTransform {
    pub scale: [f64; 3],
    pub translate: [f64; 3],
}

impl Default for QuantizationTransform {
    fn default() -> Self {
        Self {
            scale: [1.0, 1.0, 1.0],
            translate: [0.0, 0.0, 0.0],
        }
    }
}

impl QuantizationTransform {
    /// Convert one stored coordinate triple to real-world coordinates
    #[inline]
    pub fn apply(&self, stored: [f64; 3]) -> Vertex {
        Vertex::new(
            stored[0] * self.scale[0] + self.translate[0],
            stored[1] * self.scale[1] + self.translate[1],
            stored[2] * self.scale[2] + self.translate[2],
        )
    }
}

/// One node of a boundary tree.
///
/// Leaves are rings (ordered vertex-index sequences); branches group child
/// nodes (ring lists form faces, face lists form shells, and so on). Depth is
/// arbitrary and discovered at parse time, never assumed fixed.
#[derive(Debug, Clone, PartialEq)]
pub enum BoundaryNode {
    Ring(Vec<usize>),
    Group(Vec<BoundaryNode>),
}

impl BoundaryNode {
    /// Total number of rings in this subtree
    pub fn ring_count(&self) -> usize {
        match self {
            BoundaryNode::Ring(_) => 1,
            BoundaryNode::Group(children) => children.iter().map(BoundaryNode::ring_count).sum(),
        }
    }

    /// Remap every vertex index in this subtree through `mapping`
    pub fn remap_indices(&mut self, mapping: &[usize]) {
        match self {
            BoundaryNode::Ring(indices) => {
                for index in indices.iter_mut() {
                    if let Some(&mapped) = mapping.get(*index) {
                        *index = mapped;
                    }
                }
            }
            BoundaryNode::Group(children) => {
                for child in children.iter_mut() {
                    child.remap_indices(mapping);
                }
            }
        }
    }
}

/// One node of a semantics tree, shaped like the boundary tree it annotates.
///
/// A leaf holds an index into the geometry's flat surface table, or `None`
/// for an unclassified face.
#[derive(Debug, Clone, PartialEq)]
pub enum SemanticsNode {
    Leaf(Option<u32>),
    Group(Vec<SemanticsNode>),
}

/// One entry of a geometry's semantic surface table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SemanticSurface {
    #[serde(rename = "type")]
    pub surface_type: String,
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// Semantic classification parallel to a geometry's boundary trees
#[derive(Debug, Clone, PartialEq)]
pub struct Semantics {
    pub surfaces: Vec<SemanticSurface>,
    pub values: Vec<SemanticsNode>,
}

/// Geometry primitive kind as declared by the source dataset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GeometryKind {
    MultiPoint,
    MultiLineString,
    MultiSurface,
    CompositeSurface,
    Solid,
    MultiSolid,
    CompositeSolid,
    Unknown,
}

impl GeometryKind {
    pub fn from_name(name: &str) -> Self {
        match name {
            "MultiPoint" => GeometryKind::MultiPoint,
            "MultiLineString" => GeometryKind::MultiLineString,
            "MultiSurface" => GeometryKind::MultiSurface,
            "CompositeSurface" => GeometryKind::CompositeSurface,
            "Solid" => GeometryKind::Solid,
            "MultiSolid" => GeometryKind::MultiSolid,
            "CompositeSolid" => GeometryKind::CompositeSolid,
            _ => GeometryKind::Unknown,
        }
    }

    /// Whether rings of this kind describe polygonal surfaces.
    /// Point and line primitives carry indices but no faces.
    #[inline]
    pub fn is_surface_bearing(&self) -> bool {
        !matches!(
            self,
            GeometryKind::MultiPoint | GeometryKind::MultiLineString
        )
    }
}

/// One geometry of an entity: a boundary tree with optional semantics
#[derive(Debug, Clone, PartialEq)]
pub struct Geometry {
    pub kind: GeometryKind,
    pub lod: Option<String>,
    pub boundaries: Vec<BoundaryNode>,
    pub semantics: Option<Semantics>,
}

/// A named city object: one building, room, bridge part, and so on
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Entity {
    pub entity_type: String,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub children: Vec<String>,
    pub parents: Vec<String>,
    pub geometry: Vec<Geometry>,
}

impl Entity {
    /// A container groups child entities and carries no geometry of its own;
    /// it must be skipped during mesh assembly, not rendered as a degenerate
    /// solid.
    #[inline]
    pub fn is_container(&self) -> bool {
        !self.children.is_empty() && self.geometry.is_empty()
    }

    /// Whether any geometry of this entity can produce faces
    #[inline]
    pub fn has_surface_geometry(&self) -> bool {
        self.geometry.iter().any(|g| g.kind.is_surface_bearing())
    }
}

/// A parsed city model: the shared vertex pool plus the entity map.
///
/// Vertices and boundary trees are immutable inputs to the mesh pipeline;
/// the only mutation the model supports is the duplicate-vertex merge pass.
#[derive(Debug, Clone, Default)]
pub struct CityModel {
    pub vertices: Vec<Vertex>,
    pub entities: FxHashMap<String, Entity>,
    /// Free-form reference-system identifier as declared by the dataset
    pub reference_system: Option<String>,
    /// Optional declared extent `[min_x, min_y, min_z, max_x, max_y, max_z]`
    /// in native coordinates
    pub geographical_extent: Option<[f64; 6]>,
}

impl CityModel {
    #[inline]
    pub fn vertex(&self, index: usize) -> Option<&Vertex> {
        self.vertices.get(index)
    }

    /// Merge vertices that coincide after rounding to `precision` decimals,
    /// remapping every boundary-tree index through the old-to-new table.
    /// The first occurrence keeps its original, un-rounded coordinates.
    ///
    /// Returns the number of vertices merged away.
    pub fn merge_duplicate_vertices(&mut self, precision: u32) -> usize {
        if self.vertices.is_empty() {
            return 0;
        }

        let factor = 10f64.powi(precision as i32);
        let key = |v: &Vertex| -> (i64, i64, i64) {
            (
                (v.x * factor).round() as i64,
                (v.y * factor).round() as i64,
                (v.z * factor).round() as i64,
            )
        };

        let mut seen: FxHashMap<(i64, i64, i64), usize> = FxHashMap::default();
        let mut mapping: Vec<usize> = Vec::with_capacity(self.vertices.len());
        let mut unique: Vec<Vertex> = Vec::with_capacity(self.vertices.len());

        for vertex in &self.vertices {
            match seen.entry(key(vertex)) {
                std::collections::hash_map::Entry::Occupied(entry) => {
                    mapping.push(*entry.get());
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    let new_index = unique.len();
                    entry.insert(new_index);
                    mapping.push(new_index);
                    unique.push(*vertex);
                }
            }
        }

        let merged = self.vertices.len() - unique.len();
        if merged == 0 {
            return 0;
        }

        self.vertices = unique;
        for entity in self.entities.values_mut() {
            for geometry in entity.geometry.iter_mut() {
                for node in geometry.boundaries.iter_mut() {
                    node.remap_indices(&mapping);
                }
            }
        }

        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn model_with_ring(vertices: Vec<Vertex>, ring: Vec<usize>) -> CityModel {
        let mut entities = FxHashMap::default();
        entities.insert(
            "b1".to_string(),
            Entity {
                entity_type: "Building".to_string(),
                geometry: vec![Geometry {
                    kind: GeometryKind::MultiSurface,
                    lod: None,
                    boundaries: vec![BoundaryNode::Group(vec![BoundaryNode::Ring(ring)])],
                    semantics: None,
                }],
                ..Default::default()
            },
        );
        CityModel {
            vertices,
            entities,
            ..Default::default()
        }
    }

    #[test]
    fn test_transform_apply() {
        let transform = QuantizationTransform {
            scale: [0.001, 0.001, 0.001],
            translate: [85000.0, 446000.0, 0.0],
        };
        let v = transform.apply([1000.0, 2000.0, 3000.0]);
        assert!((v.x - 85001.0).abs() < 1e-9);
        assert!((v.y - 446002.0).abs() < 1e-9);
        assert!((v.z - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_merge_duplicate_vertices_remaps_boundaries() {
        // Vertices 1 and 3 coincide at 5 decimals
        let mut model = model_with_ring(
            vec![
                Vertex::new(0.0, 0.0, 0.0),
                Vertex::new(1.0, 0.0, 0.0),
                Vertex::new(1.0, 1.0, 0.0),
                Vertex::new(1.000000004, 0.0, 0.0),
            ],
            vec![0, 3, 2],
        );

        let merged = model.merge_duplicate_vertices(5);
        assert_eq!(merged, 1);
        assert_eq!(model.vertices.len(), 3);

        let entity = model.entities.get("b1").unwrap();
        match &entity.geometry[0].boundaries[0] {
            BoundaryNode::Group(children) => match &children[0] {
                BoundaryNode::Ring(indices) => assert_eq!(indices, &vec![0, 1, 2]),
                other => panic!("expected ring, got {other:?}"),
            },
            other => panic!("expected group, got {other:?}"),
        }
    }

    #[test]
    fn test_merge_keeps_original_coordinates() {
        let mut model = model_with_ring(
            vec![Vertex::new(2.00000001, 0.0, 0.0), Vertex::new(2.0, 0.0, 0.0)],
            vec![0, 1],
        );
        model.merge_duplicate_vertices(5);
        assert_eq!(model.vertices.len(), 1);
        // First occurrence wins, un-rounded
        assert_eq!(model.vertices[0].x, 2.00000001);
    }

    #[test]
    fn test_container_detection() {
        let container = Entity {
            entity_type: "Building".to_string(),
            children: vec!["part".to_string()],
            ..Default::default()
        };
        assert!(container.is_container());

        let leaf = Entity {
            entity_type: "BuildingPart".to_string(),
            ..Default::default()
        };
        assert!(!leaf.is_container());
    }

    #[test]
    fn test_ring_count() {
        let node = BoundaryNode::Group(vec![
            BoundaryNode::Group(vec![
                BoundaryNode::Ring(vec![0, 1, 2]),
                BoundaryNode::Ring(vec![3, 4, 5]),
            ]),
            BoundaryNode::Ring(vec![6, 7, 8]),
        ]);
        assert_eq!(node.ring_count(), 3);
    }
}
