// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Diagnostic records for locally-recovered geometry defects
//!
//! A defective ring or face is skipped, never fatal; the skip is recorded as
//! a value the caller can attach to the owning entity and surface to the
//! user. This crate does no logging of its own.

/// What went wrong with one ring or face
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    /// Fewer than 3 unique vertex indices after duplicate collapsing
    DegenerateRing,
    /// Ring signature already seen within the same entity
    DuplicateFace,
    /// Ring references a vertex index outside the pool
    IndexOutOfRange,
    /// Triangulation produced no triangles (self-intersecting or zero-area)
    UnprojectablePolygon,
}

/// One recovered defect, attached to the entity it occurred in
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub detail: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, detail: impl Into<String>) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }
}
