// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Surface-type classification
//!
//! Walks the semantics tree in lock-step with the boundary traversal and
//! assigns each face a surface-type label. Classification is a priority
//! chain of pure classifiers tried in order: explicit semantics first, then
//! structural entity tags, then the normal-orientation heuristic. The chain
//! never fails; missing information always resolves to a best-effort label.

use city_lite_core::{SemanticSurface, SemanticsNode};
use nalgebra::Vector3;

/// `|normal.z|` above which a face counts as horizontal
pub const HORIZONTALITY_THRESHOLD: f64 = 0.7;

/// Resolved surface classification of one face
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SurfaceType {
    Roof,
    Ground,
    Wall,
    Window,
    Door,
    /// Any label this pipeline has no special handling for, kept verbatim
    Other(String),
}

impl SurfaceType {
    pub fn label(&self) -> &str {
        match self {
            SurfaceType::Roof => "RoofSurface",
            SurfaceType::Ground => "GroundSurface",
            SurfaceType::Wall => "WallSurface",
            SurfaceType::Window => "Window",
            SurfaceType::Door => "Door",
            SurfaceType::Other(label) => label,
        }
    }

    pub fn from_label(label: &str) -> Self {
        match label {
            "RoofSurface" => SurfaceType::Roof,
            "GroundSurface" => SurfaceType::Ground,
            "WallSurface" => SurfaceType::Wall,
            "Window" => SurfaceType::Window,
            "Door" => SurfaceType::Door,
            other => SurfaceType::Other(other.to_string()),
        }
    }
}

/// Everything a classifier may consult about one face
#[derive(Debug, Clone)]
pub struct FaceContext<'a> {
    /// Semantics-tree leaf for this face, already looked up along the
    /// boundary path
    pub semantic_index: Option<u32>,
    /// The geometry's flat surface table
    pub surfaces: &'a [SemanticSurface],
    /// Type tag of the owning entity
    pub entity_type: &'a str,
    /// Normalized face normal (zero for collapsed faces)
    pub normal: Vector3<f64>,
    /// Mean z of the face's outer-ring vertices
    pub average_height: f64,
    /// Height separating roof from ground candidates
    pub reference_height: f64,
}

/// One pure classification rule
pub type Classifier = fn(&FaceContext<'_>) -> Option<SurfaceType>;

/// Classifiers in priority order; the first hit wins
pub const DEFAULT_CLASSIFIERS: &[Classifier] = &[
    classify_by_semantics,
    classify_by_entity_type,
    classify_by_orientation,
];

/// Resolve the surface type of one face. Never fails.
pub fn resolve_surface_type(ctx: &FaceContext) -> SurfaceType {
    DEFAULT_CLASSIFIERS
        .iter()
        .find_map(|classifier| classifier(ctx))
        .unwrap_or(SurfaceType::Wall)
}

/// Look up the semantics leaf for a face at `path` in the boundary tree.
///
/// A depth mismatch, a missing subtree, or a leaf where the shape demands a
/// group (and vice versa) all yield `None`: ambiguous semantics are treated
/// as absent, never as an error.
pub fn semantics_leaf(values: &[SemanticsNode], path: &[usize]) -> Option<u32> {
    let mut nodes = values;
    for (depth, &step) in path.iter().enumerate() {
        let last = depth == path.len() - 1;
        match nodes.get(step)? {
            SemanticsNode::Leaf(value) => return if last { *value } else { None },
            SemanticsNode::Group(children) => {
                if last {
                    // The leaf value is itself an array: ambiguous
                    return None;
                }
                nodes = children;
            }
        }
    }
    None
}

fn classify_by_semantics(ctx: &FaceContext) -> Option<SurfaceType> {
    let index = ctx.semantic_index? as usize;
    ctx.surfaces
        .get(index)
        .map(|surface| SurfaceType::from_label(&surface.surface_type))
}

/// Structural entity tags short-circuit the orientation heuristic: a face of
/// a door entity is a door no matter which way it leans.
fn classify_by_entity_type(ctx: &FaceContext) -> Option<SurfaceType> {
    let ty = ctx.entity_type;
    if ty.contains("Door") {
        Some(SurfaceType::Door)
    } else if ty.contains("Window") {
        Some(SurfaceType::Window)
    } else if ty.contains("Roof") {
        Some(SurfaceType::Roof)
    } else {
        None
    }
}

fn classify_by_orientation(ctx: &FaceContext) -> Option<SurfaceType> {
    if ctx.normal.z.abs() > HORIZONTALITY_THRESHOLD {
        if ctx.average_height > ctx.reference_height {
            Some(SurfaceType::Roof)
        } else {
            Some(SurfaceType::Ground)
        }
    } else {
        Some(SurfaceType::Wall)
    }
}
