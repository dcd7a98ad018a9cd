// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! CityJSON-shaped dataset intake
//!
//! Converts a `serde_json::Value` into the typed model. This is the only
//! place that type-sniffs the recursively nested boundary and semantics
//! arrays; everything downstream works on tagged variants.
//!
//! Intake is deliberately forgiving: a malformed geometry or entity is
//! skipped, and only a dataset with no vertex pool or no entity map at all
//! is a hard error, since there is nothing safe to render.

use crate::error::{Error, Result};
use crate::model::{
    BoundaryNode, CityModel, Entity, Geometry, GeometryKind, QuantizationTransform,
    SemanticSurface, Semantics, SemanticsNode, Vertex,
};
use rustc_hash::FxHashMap;
use serde_json::Value;

/// Parse a CityJSON-shaped document from text
pub fn parse_city_model_str(content: &str) -> Result<CityModel> {
    let value: Value = serde_json::from_str(content)?;
    parse_city_model(&value)
}

/// Parse a CityJSON-shaped document
pub fn parse_city_model(value: &Value) -> Result<CityModel> {
    let vertices_value = value
        .get("vertices")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::InvalidDataset("dataset has no vertex pool".to_string()))?;

    let objects = value
        .get("CityObjects")
        .and_then(Value::as_object)
        .ok_or_else(|| Error::InvalidDataset("dataset has no entity map".to_string()))?;

    let transform = parse_transform(value.get("transform"));
    let vertices = parse_vertices(vertices_value, &transform);

    let mut entities: FxHashMap<String, Entity> = FxHashMap::default();
    for (id, object) in objects {
        if let Some(entity) = parse_entity(object) {
            entities.insert(id.clone(), entity);
        }
    }

    let metadata = value.get("metadata");
    let reference_system = metadata
        .and_then(|m| m.get("referenceSystem"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let geographical_extent = metadata
        .and_then(|m| m.get("geographicalExtent"))
        .and_then(parse_extent);

    Ok(CityModel {
        vertices,
        entities,
        reference_system,
        geographical_extent,
    })
}

fn parse_transform(value: Option<&Value>) -> QuantizationTransform {
    let Some(value) = value else {
        return QuantizationTransform::default();
    };

    let triple = |key: &str, default: [f64; 3]| -> [f64; 3] {
        value
            .get(key)
            .and_then(Value::as_array)
            .and_then(|items| {
                let mut out = [0.0; 3];
                for (i, slot) in out.iter_mut().enumerate() {
                    *slot = items.get(i)?.as_f64()?;
                }
                Some(out)
            })
            .unwrap_or(default)
    };

    QuantizationTransform {
        scale: triple("scale", [1.0, 1.0, 1.0]),
        translate: triple("translate", [0.0, 0.0, 0.0]),
    }
}

/// Dequantization happens here, exactly once; the pool stores real-world f64
fn parse_vertices(items: &[Value], transform: &QuantizationTransform) -> Vec<Vertex> {
    let mut vertices = Vec::with_capacity(items.len());
    for item in items {
        let Some(coords) = item.as_array() else {
            continue;
        };
        let x = coords.first().and_then(Value::as_f64);
        let y = coords.get(1).and_then(Value::as_f64);
        let z = coords.get(2).and_then(Value::as_f64);
        if let (Some(x), Some(y), Some(z)) = (x, y, z) {
            vertices.push(transform.apply([x, y, z]));
        }
    }
    vertices
}

fn parse_extent(value: &Value) -> Option<[f64; 6]> {
    let items = value.as_array()?;
    let mut out = [0.0; 6];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = items.get(i)?.as_f64()?;
    }
    Some(out)
}

fn parse_entity(object: &Value) -> Option<Entity> {
    let object = object.as_object()?;

    let entity_type = object
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let attributes = object
        .get("attributes")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let string_list = |key: &str| -> Vec<String> {
        object
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    let geometry = object
        .get("geometry")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(parse_geometry).collect())
        .unwrap_or_default();

    Some(Entity {
        entity_type,
        attributes,
        children: string_list("children"),
        parents: string_list("parents"),
        geometry,
    })
}

fn parse_geometry(value: &Value) -> Option<Geometry> {
    let kind = GeometryKind::from_name(value.get("type").and_then(Value::as_str).unwrap_or(""));

    let lod = value.get("lod").map(|lod| match lod {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    let boundaries = value
        .get("boundaries")
        .and_then(Value::as_array)?
        .iter()
        .filter_map(parse_boundary_node)
        .collect();

    let semantics = value.get("semantics").and_then(parse_semantics);

    Some(Geometry {
        kind,
        lod,
        boundaries,
        semantics,
    })
}

/// Resolve one boundary node by sniffing the first element: a number means
/// this level is a ring of vertex indices, an array means a group of child
/// nodes. Depth is discovered, never assumed.
fn parse_boundary_node(value: &Value) -> Option<BoundaryNode> {
    let items = value.as_array()?;
    let first = items.first()?;

    if first.is_number() {
        let indices = items
            .iter()
            .filter_map(Value::as_u64)
            .map(|i| i as usize)
            .collect();
        Some(BoundaryNode::Ring(indices))
    } else {
        let children: Vec<BoundaryNode> = items.iter().filter_map(parse_boundary_node).collect();
        if children.is_empty() {
            None
        } else {
            Some(BoundaryNode::Group(children))
        }
    }
}

fn parse_semantics(value: &Value) -> Option<Semantics> {
    let surfaces = value
        .get("surfaces")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|s| serde_json::from_value::<SemanticSurface>(s.clone()).ok())
                .collect()
        })
        .unwrap_or_else(Vec::new);

    let values = value
        .get("values")
        .and_then(Value::as_array)
        .map(|items| items.iter().map(parse_semantics_node).collect())
        .unwrap_or_else(Vec::new);

    Some(Semantics { surfaces, values })
}

fn parse_semantics_node(value: &Value) -> SemanticsNode {
    match value {
        Value::Array(items) => {
            SemanticsNode::Group(items.iter().map(parse_semantics_node).collect())
        }
        Value::Number(n) => SemanticsNode::Leaf(n.as_u64().map(|v| v as u32)),
        _ => SemanticsNode::Leaf(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_minimal_model() {
        let doc = json!({
            "type": "CityJSON",
            "version": "1.1",
            "vertices": [[0, 0, 0], [1, 0, 0], [1, 1, 0], [0, 1, 0]],
            "CityObjects": {
                "b1": {
                    "type": "Building",
                    "geometry": [{
                        "type": "MultiSurface",
                        "lod": "2",
                        "boundaries": [[[0, 1, 2, 3]]]
                    }]
                }
            }
        });

        let model = parse_city_model(&doc).unwrap();
        assert_eq!(model.vertices.len(), 4);
        let entity = model.entities.get("b1").unwrap();
        assert_eq!(entity.entity_type, "Building");
        assert_eq!(entity.geometry.len(), 1);
        assert_eq!(entity.geometry[0].kind, GeometryKind::MultiSurface);
        assert_eq!(entity.geometry[0].boundaries[0].ring_count(), 1);
    }

    #[test]
    fn test_parse_applies_transform_once() {
        let doc = json!({
            "vertices": [[1000, 2000, 0]],
            "transform": {"scale": [0.001, 0.001, 0.001], "translate": [85000.0, 446000.0, 10.0]},
            "CityObjects": {}
        });

        // No entity map content is fine; an absent map is not
        let model = parse_city_model(&doc).unwrap();
        assert!((model.vertices[0].x - 85001.0).abs() < 1e-9);
        assert!((model.vertices[0].y - 446002.0).abs() < 1e-9);
        assert!((model.vertices[0].z - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_solid_nesting_depth() {
        // Solid: shells > faces > rings
        let doc = json!({
            "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0],[0,0,1],[1,0,1],[1,1,1],[0,1,1]],
            "CityObjects": {
                "b1": {
                    "type": "Building",
                    "geometry": [{
                        "type": "Solid",
                        "boundaries": [[[[0,3,2,1]],[[4,5,6,7]],[[0,1,5,4]]]]
                    }]
                }
            }
        });

        let model = parse_city_model(&doc).unwrap();
        let entity = model.entities.get("b1").unwrap();
        let root = &entity.geometry[0].boundaries;
        assert_eq!(root.len(), 1);
        assert_eq!(root[0].ring_count(), 3);
        match &root[0] {
            BoundaryNode::Group(faces) => assert_eq!(faces.len(), 3),
            other => panic!("expected shell group, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_semantics_tree() {
        let doc = json!({
            "vertices": [[0,0,0],[1,0,0],[1,1,0]],
            "CityObjects": {
                "b1": {
                    "type": "Building",
                    "geometry": [{
                        "type": "MultiSurface",
                        "boundaries": [[[0,1,2]], [[2,1,0]]],
                        "semantics": {
                            "surfaces": [
                                {"type": "WallSurface"},
                                {"type": "RoofSurface", "slope": 35.0}
                            ],
                            "values": [0, null]
                        }
                    }]
                }
            }
        });

        let model = parse_city_model(&doc).unwrap();
        let semantics = model.entities["b1"].geometry[0].semantics.as_ref().unwrap();
        assert_eq!(semantics.surfaces.len(), 2);
        assert_eq!(semantics.surfaces[1].surface_type, "RoofSurface");
        assert!(semantics.surfaces[1].attributes.contains_key("slope"));
        assert_eq!(
            semantics.values,
            vec![SemanticsNode::Leaf(Some(0)), SemanticsNode::Leaf(None)]
        );
    }

    #[test]
    fn test_missing_vertices_is_hard_error() {
        let doc = json!({"CityObjects": {}});
        assert!(matches!(
            parse_city_model(&doc),
            Err(Error::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_missing_entity_map_is_hard_error() {
        let doc = json!({"vertices": []});
        assert!(matches!(
            parse_city_model(&doc),
            Err(Error::InvalidDataset(_))
        ));
    }

    #[test]
    fn test_reference_system_and_extent() {
        let doc = json!({
            "vertices": [[0,0,0]],
            "CityObjects": {},
            "metadata": {
                "referenceSystem": "https://www.opengis.net/def/crs/EPSG/0/7415",
                "geographicalExtent": [84000.0, 446000.0, 0.0, 86000.0, 448000.0, 30.0]
            }
        });
        let model = parse_city_model(&doc).unwrap();
        assert_eq!(
            model.reference_system.as_deref(),
            Some("https://www.opengis.net/def/crs/EPSG/0/7415")
        );
        assert_eq!(model.geographical_extent.unwrap()[3], 86000.0);
    }
}
