// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Boundary-tree repair
//!
//! Normalizes raw nested boundary data into clean rings: consecutive
//! duplicates collapsed, closing vertices dropped, degenerate and duplicate
//! rings skipped with a diagnostic. One bad ring never aborts its siblings
//! or the owning entity.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use city_lite_core::BoundaryNode;
use rustc_hash::FxHashSet;
use smallvec::SmallVec;

/// One polygonal face recovered from a boundary tree: a cleaned outer ring
/// plus cleaned hole rings, as indices into the shared vertex pool.
///
/// `path` records the child positions taken from the geometry's boundary
/// root down to this face, enabling lock-step lookup in the semantics tree.
#[derive(Debug, Clone, PartialEq)]
pub struct FaceBoundary {
    pub outer: Vec<usize>,
    pub holes: Vec<Vec<usize>>,
    pub path: SmallVec<[usize; 4]>,
}

/// Clean one candidate ring.
///
/// Collapses consecutive duplicate indices, drops the closing duplicate, and
/// rejects rings that reference vertices outside the pool or keep fewer than
/// 3 unique indices. Rejections are recorded as diagnostics and yield `None`.
pub fn clean_ring(
    ring: &[usize],
    pool_size: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<Vec<usize>> {
    if let Some(&bad) = ring.iter().find(|&&index| index >= pool_size) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::IndexOutOfRange,
            format!("vertex index {bad} outside pool of {pool_size}"),
        ));
        return None;
    }

    let mut cleaned: Vec<usize> = Vec::with_capacity(ring.len());
    for &index in ring {
        if cleaned.last() != Some(&index) {
            cleaned.push(index);
        }
    }
    if cleaned.len() > 1 && cleaned.first() == cleaned.last() {
        cleaned.pop();
    }

    let unique: FxHashSet<usize> = cleaned.iter().copied().collect();
    if unique.len() < 3 {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DegenerateRing,
            format!("ring has {} unique vertices", unique.len()),
        ));
        return None;
    }

    Some(cleaned)
}

/// Canonical ring signature: the sorted unique index list.
/// Identical faces match regardless of winding or starting vertex.
pub fn ring_signature(ring: &[usize]) -> Vec<usize> {
    let mut signature: Vec<usize> = ring.to_vec();
    signature.sort_unstable();
    signature.dedup();
    signature
}

/// Collect all faces from one geometry's boundary trees.
///
/// A group whose children are all rings is a face (first ring outer, rest
/// holes); deeper groups are recursed into; a bare ring is a single-ring
/// face. Duplicate-face detection spans the whole call, i.e. one entity.
pub fn collect_faces(
    nodes: &[BoundaryNode],
    pool_size: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> Vec<FaceBoundary> {
    let mut faces = Vec::new();
    let mut seen: FxHashSet<Vec<usize>> = FxHashSet::default();
    let mut path: SmallVec<[usize; 4]> = SmallVec::new();

    for (i, node) in nodes.iter().enumerate() {
        path.push(i);
        walk(node, pool_size, &mut path, &mut seen, &mut faces, diagnostics);
        path.pop();
    }

    faces
}

fn walk(
    node: &BoundaryNode,
    pool_size: usize,
    path: &mut SmallVec<[usize; 4]>,
    seen: &mut FxHashSet<Vec<usize>>,
    faces: &mut Vec<FaceBoundary>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    match node {
        BoundaryNode::Ring(ring) => {
            emit_face(ring, &[], pool_size, path, seen, faces, diagnostics);
        }
        BoundaryNode::Group(children) => {
            let all_rings = !children.is_empty()
                && children
                    .iter()
                    .all(|child| matches!(child, BoundaryNode::Ring(_)));

            if all_rings {
                let rings: Vec<&[usize]> = children
                    .iter()
                    .map(|child| match child {
                        BoundaryNode::Ring(ring) => ring.as_slice(),
                        BoundaryNode::Group(_) => unreachable!(),
                    })
                    .collect();
                emit_face(rings[0], &rings[1..], pool_size, path, seen, faces, diagnostics);
            } else {
                for (i, child) in children.iter().enumerate() {
                    path.push(i);
                    walk(child, pool_size, path, seen, faces, diagnostics);
                    path.pop();
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn emit_face(
    outer_raw: &[usize],
    holes_raw: &[&[usize]],
    pool_size: usize,
    path: &SmallVec<[usize; 4]>,
    seen: &mut FxHashSet<Vec<usize>>,
    faces: &mut Vec<FaceBoundary>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(outer) = clean_ring(outer_raw, pool_size, diagnostics) else {
        return;
    };

    if !seen.insert(ring_signature(&outer)) {
        diagnostics.push(Diagnostic::new(
            DiagnosticKind::DuplicateFace,
            format!("outer ring {outer:?} repeats an earlier face"),
        ));
        return;
    }

    let mut holes = Vec::with_capacity(holes_raw.len());
    for hole_raw in holes_raw {
        let Some(hole) = clean_ring(hole_raw, pool_size, diagnostics) else {
            continue;
        };
        if seen.insert(ring_signature(&hole)) {
            holes.push(hole);
        } else {
            diagnostics.push(Diagnostic::new(
                DiagnosticKind::DuplicateFace,
                format!("hole ring {hole:?} repeats an earlier ring"),
            ));
        }
    }

    faces.push(FaceBoundary {
        outer,
        holes,
        path: path.clone(),
    });
}
