// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Ray picking and selection state
//!
//! Picking resolves rays to entity ids over the assembled mesh groups;
//! selection is a pure state machine that reports the highlight changes the
//! embedder must apply. Entity ids, never individual meshes, are the unit of
//! selection.

use crate::pipeline::LoadedModel;
use city_lite_geometry::{Mesh, Point3, Vector3};

const RAY_EPSILON: f64 = 1e-12;

/// A pick ray in the scene frame (i.e. after the relative-to-center shift)
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self { origin, direction }
    }
}

/// Möller-Trumbore ray/triangle intersection; returns the ray parameter of
/// the hit
fn intersect_triangle(ray: &Ray, a: Point3<f64>, b: Point3<f64>, c: Point3<f64>) -> Option<f64> {
    let edge1 = b - a;
    let edge2 = c - a;

    let p = ray.direction.cross(&edge2);
    let det = edge1.dot(&p);
    if det.abs() < RAY_EPSILON {
        return None;
    }

    let inv_det = 1.0 / det;
    let t_vec = ray.origin - a;
    let u = t_vec.dot(&p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }

    let q = t_vec.cross(&edge1);
    let v = ray.direction.dot(&q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }

    let t = edge2.dot(&q) * inv_det;
    (t > RAY_EPSILON).then_some(t)
}

/// Nearest hit of a ray against one mesh
pub fn intersect_mesh(ray: &Ray, mesh: &Mesh) -> Option<f64> {
    let mut nearest: Option<f64> = None;
    for triangle in mesh.indices.chunks_exact(3) {
        let a = mesh.position(triangle[0] as usize);
        let b = mesh.position(triangle[1] as usize);
        let c = mesh.position(triangle[2] as usize);
        if let Some(t) = intersect_triangle(ray, a, b, c) {
            if nearest.map_or(true, |best| t < best) {
                nearest = Some(t);
            }
        }
    }
    nearest
}

/// Resolve a ray to the nearest entity over all assembled mesh groups
pub fn pick<'a>(loaded: &'a LoadedModel, ray: &Ray) -> Option<(&'a str, f64)> {
    let mut best: Option<(&str, f64)> = None;
    for group in &loaded.groups {
        if let Some(t) = intersect_mesh(ray, &group.mesh) {
            if best.map_or(true, |(_, bt)| t < bt) {
                best = Some((group.entity_id.as_str(), t));
            }
        }
    }
    best
}

/// Highlight material to apply to an entity's groups
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Highlight {
    Hover,
    Select,
    /// Accumulation membership awaiting commit
    Pending,
}

/// One material change the embedder must apply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
    Apply {
        entity_id: String,
        highlight: Highlight,
    },
    /// Restore the entity's original material
    Restore {
        entity_id: String,
    },
}

impl SelectionChange {
    fn apply(entity_id: &str, highlight: Highlight) -> Self {
        SelectionChange::Apply {
            entity_id: entity_id.to_string(),
            highlight,
        }
    }

    fn restore(entity_id: &str) -> Self {
        SelectionChange::Restore {
            entity_id: entity_id.to_string(),
        }
    }
}

/// Selection state machine: Idle -> Hovered -> Selected, with an orthogonal
/// accumulation mode for composing a unit out of several entities.
#[derive(Debug, Default)]
pub struct SelectionState {
    hovered: Option<String>,
    selected: Option<String>,
    accumulation: Option<Vec<String>>,
}

impl SelectionState {
    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn is_accumulating(&self) -> bool {
        self.accumulation.is_some()
    }

    /// Entity ids accumulated so far, in toggle order
    pub fn accumulated(&self) -> &[String] {
        self.accumulation.as_deref().unwrap_or(&[])
    }

    /// Update the hover target. Hovering never overrides an active
    /// selection's highlight: hovering the selected entity is a no-op.
    pub fn set_hovered(&mut self, entity_id: Option<&str>) -> Vec<SelectionChange> {
        let target = match entity_id {
            Some(id) if self.selected.as_deref() == Some(id) => None,
            other => other.map(str::to_string),
        };

        if target == self.hovered {
            return Vec::new();
        }

        let mut changes = Vec::new();
        if let Some(old) = self.hovered.take() {
            changes.push(SelectionChange::restore(&old));
        }
        if let Some(id) = &target {
            changes.push(SelectionChange::apply(id, Highlight::Hover));
        }
        self.hovered = target;
        changes
    }

    /// Update the selection target, restoring the prior target's original
    /// material first
    pub fn set_selected(&mut self, entity_id: Option<&str>) -> Vec<SelectionChange> {
        if self.selected.as_deref() == entity_id {
            return Vec::new();
        }

        let mut changes = Vec::new();
        if let Some(old) = self.selected.take() {
            changes.push(SelectionChange::restore(&old));
        }
        if let Some(id) = entity_id {
            // A hover highlight on the new target is superseded
            if self.hovered.as_deref() == Some(id) {
                self.hovered = None;
            }
            changes.push(SelectionChange::apply(id, Highlight::Select));
            self.selected = Some(id.to_string());
        }
        changes
    }

    /// Enter accumulation mode with an empty set
    pub fn begin_accumulation(&mut self) {
        self.accumulation = Some(Vec::new());
    }

    /// Toggle an entity's membership in the accumulating set
    pub fn toggle_accumulated(&mut self, entity_id: &str) -> Vec<SelectionChange> {
        let Some(set) = self.accumulation.as_mut() else {
            return Vec::new();
        };
        match set.iter().position(|id| id == entity_id) {
            Some(position) => {
                set.remove(position);
                vec![SelectionChange::restore(entity_id)]
            }
            None => {
                set.push(entity_id.to_string());
                vec![SelectionChange::apply(entity_id, Highlight::Pending)]
            }
        }
    }

    /// Commit the accumulated set: returns the member ids (for emitting a
    /// composite entity) and the changes restoring their pending materials
    pub fn commit_accumulation(&mut self) -> (Vec<String>, Vec<SelectionChange>) {
        let members = self.accumulation.take().unwrap_or_default();
        let changes = members
            .iter()
            .map(|id| SelectionChange::restore(id))
            .collect();
        (members, changes)
    }

    /// Abandon accumulation, restoring all pending materials
    pub fn cancel_accumulation(&mut self) -> Vec<SelectionChange> {
        self.accumulation
            .take()
            .unwrap_or_default()
            .iter()
            .map(|id| SelectionChange::restore(id))
            .collect()
    }

    /// Clear all transient state; used when the dataset is swapped and every
    /// mesh the state referred to is gone
    pub fn reset(&mut self) {
        self.hovered = None;
        self.selected = None;
        self.accumulation = None;
    }
}
