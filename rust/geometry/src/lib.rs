// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! City-Lite Geometry Processing
//!
//! Turns repaired boundary trees into render-ready triangle meshes using
//! earcutr triangulation and nalgebra for the vector math.

pub mod assembler;
pub mod diagnostics;
pub mod error;
pub mod mesh;
pub mod repair;
pub mod semantics;
pub mod triangulation;

// Re-export nalgebra types for convenience
pub use nalgebra::{Point2, Point3, Vector2, Vector3};

pub use assembler::{assemble_groups, AssembledGroup, TriangulatedFace, DEFAULT_GROUP};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{Error, Result};
pub use mesh::{calculate_normals, CoordinateShift, Mesh};
pub use repair::{clean_ring, collect_faces, ring_signature, FaceBoundary};
pub use semantics::{
    resolve_surface_type, semantics_leaf, FaceContext, SurfaceType, HORIZONTALITY_THRESHOLD,
};
pub use triangulation::{face_normal, newell_normal, triangulate_face};
