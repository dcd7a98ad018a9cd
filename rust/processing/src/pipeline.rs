// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model load pipeline
//!
//! Runs Repair -> Triangulate -> Resolve -> Assemble per entity and collects
//! the resulting mesh groups into a `LoadedModel`. Entities are independent
//! and fan out across a rayon iterator; each reads only the shared immutable
//! vertex pool and writes its own output buffers.

use crate::error::{Error, Result};
use city_lite_core::{scan_model_bounds, CityModel, Entity, ModelBounds};
use city_lite_geometry::{
    assemble_groups, collect_faces, face_normal, resolve_surface_type, semantics_leaf,
    triangulate_face, AssembledGroup, CoordinateShift, Diagnostic, DiagnosticKind, FaceContext,
    Mesh, TriangulatedFace,
};
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// Options for one dataset load
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Group an entity's faces per surface-type label instead of one
    /// default group per entity
    pub group_by_semantics: bool,
    /// Decimal precision for the duplicate-vertex merge pass, `None` to
    /// skip it
    pub merge_precision: Option<u32>,
    /// Height separating roof from ground candidates in the orientation
    /// heuristic; defaults to the model's lowest vertex
    pub reference_height: Option<f64>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            group_by_semantics: true,
            merge_precision: Some(5),
            reference_height: None,
        }
    }
}

/// One merged, renderable buffer owned by exactly one entity
#[derive(Debug, Clone)]
pub struct MeshGroup {
    pub entity_id: String,
    /// Semantic/material key of this group
    pub surface: String,
    pub mesh: Mesh,
}

/// Entity-id lookup over the assembled groups, built once per load.
/// Highlighting an entity with many constituent faces is a single lookup,
/// not a scene traversal.
#[derive(Debug, Default)]
pub struct SceneIndex {
    by_entity: FxHashMap<String, Vec<usize>>,
}

impl SceneIndex {
    /// Indices into `LoadedModel::groups` for one entity
    #[inline]
    pub fn groups_for(&self, entity_id: &str) -> &[usize] {
        self.by_entity
            .get(entity_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    #[inline]
    pub fn contains(&self, entity_id: &str) -> bool {
        self.by_entity.contains_key(entity_id)
    }

    #[inline]
    pub fn entity_count(&self) -> usize {
        self.by_entity.len()
    }
}

/// Diagnostics recovered while processing one entity
#[derive(Debug, Clone)]
pub struct EntityDiagnostics {
    pub entity_id: String,
    pub diagnostics: Vec<Diagnostic>,
}

/// One fully rebuilt dataset.
///
/// Owns the model, the mesh groups and the entity index; swapping datasets
/// is "construct new, drop old", so stale indices and leaked buffers are
/// structurally impossible.
#[derive(Debug)]
pub struct LoadedModel {
    /// Dataset identity for stale-fetch rejection
    pub generation: u64,
    pub model: CityModel,
    pub groups: Vec<MeshGroup>,
    pub index: SceneIndex,
    pub diagnostics: Vec<EntityDiagnostics>,
    pub bounds: ModelBounds,
    /// Relative-to-center shift applied to all group positions
    pub shift: CoordinateShift,
}

impl LoadedModel {
    /// Iterate the mesh groups of one entity
    pub fn groups_for(&self, entity_id: &str) -> impl Iterator<Item = &MeshGroup> {
        self.index
            .groups_for(entity_id)
            .iter()
            .map(|&i| &self.groups[i])
    }
}

/// Full synchronous rebuild of a dataset.
///
/// Only a structurally empty dataset fails; every geometry defect is
/// recovered locally and recorded in the per-entity diagnostics, so a model
/// with some bad geometry still renders the good portions.
pub fn load_dataset(
    mut model: CityModel,
    options: &LoadOptions,
    generation: u64,
) -> Result<LoadedModel> {
    if model.vertices.is_empty() {
        return Err(Error::InvalidDataset("empty vertex pool".to_string()));
    }
    if model.entities.is_empty() {
        return Err(Error::InvalidDataset("empty entity map".to_string()));
    }

    if let Some(precision) = options.merge_precision {
        let merged = model.merge_duplicate_vertices(precision);
        if merged > 0 {
            info!(merged, "merged duplicate vertices");
        }
    }

    let bounds = scan_model_bounds(&model);
    let (sx, sy, sz) = bounds.rtc_offset();
    let shift = CoordinateShift::new(sx, sy, sz);
    let reference_height = options
        .reference_height
        .unwrap_or(if bounds.is_valid() { bounds.min_z } else { 0.0 });

    // Deterministic entity order regardless of hash-map iteration
    let mut ids: Vec<&String> = model.entities.keys().collect();
    ids.sort();

    let results: Vec<(String, Vec<AssembledGroup>, Vec<Diagnostic>)> = ids
        .par_iter()
        .filter_map(|id| {
            let entity = model.entities.get(*id)?;
            if entity.is_container() {
                debug!(entity = id.as_str(), "skipping container entity");
                return None;
            }
            if entity.geometry.is_empty() {
                return None;
            }
            Some(process_entity(
                id,
                entity,
                &model,
                &shift,
                reference_height,
                options,
            ))
        })
        .collect();

    let mut groups: Vec<MeshGroup> = Vec::new();
    let mut diagnostics: Vec<EntityDiagnostics> = Vec::new();
    let mut by_entity: FxHashMap<String, Vec<usize>> = FxHashMap::default();

    for (entity_id, assembled, entity_diags) in results {
        if !entity_diags.is_empty() {
            diagnostics.push(EntityDiagnostics {
                entity_id: entity_id.clone(),
                diagnostics: entity_diags,
            });
        }
        for group in assembled {
            by_entity
                .entry(entity_id.clone())
                .or_default()
                .push(groups.len());
            groups.push(MeshGroup {
                entity_id: entity_id.clone(),
                surface: group.surface,
                mesh: group.mesh,
            });
        }
    }

    info!(
        entities = by_entity.len(),
        groups = groups.len(),
        diagnostics = diagnostics.len(),
        "dataset rebuilt"
    );

    Ok(LoadedModel {
        generation,
        model,
        groups,
        index: SceneIndex { by_entity },
        diagnostics,
        bounds,
        shift,
    })
}

fn process_entity(
    entity_id: &str,
    entity: &Entity,
    model: &CityModel,
    shift: &CoordinateShift,
    reference_height: f64,
    options: &LoadOptions,
) -> (String, Vec<AssembledGroup>, Vec<Diagnostic>) {
    let mut diagnostics: Vec<Diagnostic> = Vec::new();
    let mut faces_out: Vec<TriangulatedFace> = Vec::new();
    let reference = shift.reference_point();

    for geometry in &entity.geometry {
        if !geometry.kind.is_surface_bearing() {
            debug!(
                entity = entity_id,
                kind = ?geometry.kind,
                "skipping non-surface geometry"
            );
            continue;
        }

        let faces = collect_faces(&geometry.boundaries, model.vertices.len(), &mut diagnostics);
        for face in faces {
            let Some(triangles) =
                triangulate_face(&face.outer, &face.holes, &model.vertices, reference)
            else {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::UnprojectablePolygon,
                    format!("face at path {:?} produced no triangles", face.path),
                ));
                continue;
            };

            let semantic_index = geometry
                .semantics
                .as_ref()
                .and_then(|s| semantics_leaf(&s.values, &face.path));
            let surfaces = geometry
                .semantics
                .as_ref()
                .map(|s| s.surfaces.as_slice())
                .unwrap_or(&[]);

            let normal = face_normal(&face.outer, &model.vertices, reference);
            let average_height = face
                .outer
                .iter()
                .filter_map(|&i| model.vertices.get(i))
                .map(|v| v.z)
                .sum::<f64>()
                / face.outer.len() as f64;

            let surface = resolve_surface_type(&FaceContext {
                semantic_index,
                surfaces,
                entity_type: &entity.entity_type,
                normal,
                average_height,
                reference_height,
            });

            faces_out.push(TriangulatedFace::from_triangles(
                surface,
                &triangles,
                &model.vertices,
                shift,
            ));
        }
    }

    let assembled = assemble_groups(&faces_out, options.group_by_semantics);
    (entity_id.to_string(), assembled, diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use city_lite_core::parse_city_model;
    use serde_json::json;

    fn load(doc: serde_json::Value) -> LoadedModel {
        let model = parse_city_model(&doc).unwrap();
        load_dataset(model, &LoadOptions::default(), 1).unwrap()
    }

    #[test]
    fn test_square_face_roof_classification() {
        // Square at z=0, no semantics; reference below the face => roof
        let doc = json!({
            "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
            "CityObjects": {
                "b1": {
                    "type": "Building",
                    "geometry": [{"type": "MultiSurface", "boundaries": [[[0,1,2,3]]]}]
                }
            }
        });
        let model = parse_city_model(&doc).unwrap();
        let options = LoadOptions {
            reference_height: Some(-1.0),
            ..Default::default()
        };
        let loaded = load_dataset(model, &options, 1).unwrap();

        assert_eq!(loaded.groups.len(), 1);
        assert_eq!(loaded.groups[0].surface, "RoofSurface");
        assert_eq!(loaded.groups[0].mesh.triangle_count(), 2);
    }

    #[test]
    fn test_square_face_default_reference_is_ground() {
        // Default reference is the model's lowest vertex: the face sits at it
        let doc = json!({
            "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
            "CityObjects": {
                "b1": {
                    "type": "Building",
                    "geometry": [{"type": "MultiSurface", "boundaries": [[[0,1,2,3]]]}]
                }
            }
        });
        let loaded = load(doc);
        assert_eq!(loaded.groups[0].surface, "GroundSurface");
    }

    #[test]
    fn test_degenerate_ring_diagnosed_valid_ring_kept() {
        let doc = json!({
            "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0],[5,5,5],[9,9,9]],
            "CityObjects": {
                "b1": {
                    "type": "Building",
                    "geometry": [{
                        "type": "MultiSurface",
                        "boundaries": [[[4,4,4,4]], [[0,1,2,3]]]
                    }]
                }
            }
        });
        let loaded = load(doc);

        assert_eq!(loaded.groups.len(), 1);
        assert_eq!(loaded.groups[0].mesh.triangle_count(), 2);
        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.diagnostics[0].entity_id, "b1");
        assert_eq!(loaded.diagnostics[0].diagnostics.len(), 1);
        assert_eq!(
            loaded.diagnostics[0].diagnostics[0].kind,
            DiagnosticKind::DegenerateRing
        );
    }

    #[test]
    fn test_container_entity_skipped() {
        let doc = json!({
            "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
            "CityObjects": {
                "b1": {"type": "Building", "children": ["p1"]},
                "p1": {
                    "type": "BuildingPart",
                    "parents": ["b1"],
                    "geometry": [{"type": "MultiSurface", "boundaries": [[[0,1,2,3]]]}]
                }
            }
        });
        let loaded = load(doc);

        assert!(!loaded.index.contains("b1"));
        assert_eq!(loaded.index.groups_for("p1").len(), 1);
    }

    #[test]
    fn test_semantic_grouping_per_entity() {
        let doc = json!({
            "vertices": [
                [0,0,0],[10,0,0],[10,10,0],[0,10,0],
                [0,0,3],[10,0,3],[10,10,3],[0,10,3]
            ],
            "CityObjects": {
                "b1": {
                    "type": "Building",
                    "geometry": [{
                        "type": "Solid",
                        "boundaries": [[
                            [[3,2,1,0]],
                            [[4,5,6,7]],
                            [[0,1,5,4]],
                            [[1,2,6,5]],
                            [[2,3,7,6]],
                            [[3,0,4,7]]
                        ]],
                        "semantics": {
                            "surfaces": [
                                {"type": "GroundSurface"},
                                {"type": "RoofSurface"},
                                {"type": "WallSurface"}
                            ],
                            "values": [[0, 1, 2, 2, 2, 2]]
                        }
                    }]
                }
            }
        });
        let loaded = load(doc);

        let surfaces: Vec<&str> = loaded.groups.iter().map(|g| g.surface.as_str()).collect();
        assert_eq!(surfaces, vec!["GroundSurface", "RoofSurface", "WallSurface"]);
        // Four walls of two triangles each merged into one group
        assert_eq!(loaded.groups[2].mesh.triangle_count(), 8);
        assert!(loaded.diagnostics.is_empty());
    }

    #[test]
    fn test_large_coordinates_get_shifted() {
        let doc = json!({
            "vertices": [
                [92000.0, 437000.0, 0.0],
                [92010.0, 437000.0, 0.0],
                [92010.0, 437010.0, 0.0],
                [92000.0, 437010.0, 0.0]
            ],
            "CityObjects": {
                "b1": {
                    "type": "Building",
                    "geometry": [{"type": "MultiSurface", "boundaries": [[[0,1,2,3]]]}]
                }
            }
        });
        let loaded = load(doc);

        assert!(!loaded.shift.is_zero());
        let (min, max) = loaded.groups[0].mesh.bounds();
        assert!(min.x.abs() <= 10.0 && max.x.abs() <= 10.0);
        assert!(min.y.abs() <= 10.0 && max.y.abs() <= 10.0);
    }

    #[test]
    fn test_empty_dataset_is_hard_error() {
        let model = CityModel::default();
        assert!(matches!(
            load_dataset(model, &LoadOptions::default(), 1),
            Err(Error::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_closing_duplicate_triangulates_identically() {
        let open = json!({
            "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
            "CityObjects": {
                "b1": {"type": "Building",
                       "geometry": [{"type": "MultiSurface", "boundaries": [[[0,1,2,3]]]}]}
            }
        });
        let closed = json!({
            "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
            "CityObjects": {
                "b1": {"type": "Building",
                       "geometry": [{"type": "MultiSurface", "boundaries": [[[0,1,2,3,0]]]}]}
            }
        });

        let loaded_open = load(open);
        let loaded_closed = load(closed);
        assert_eq!(
            loaded_open.groups[0].mesh.indices,
            loaded_closed.groups[0].mesh.indices
        );
        assert_eq!(
            loaded_open.groups[0].mesh.positions,
            loaded_closed.groups[0].mesh.positions
        );
    }
}
