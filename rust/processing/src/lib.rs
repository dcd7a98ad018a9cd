// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! City-Lite Processing
//!
//! Shared CityJSON processing pipeline: full-model rebuilds (repair,
//! triangulation, semantic resolution, mesh assembly), multi-layer
//! geographic alignment, and ray picking with selection state. The
//! `Session` type ties these together around one live dataset.

pub mod align;
pub mod error;
pub mod fetch;
pub mod picking;
pub mod pipeline;
pub mod session;

pub use align::{align_layers, AlignmentOptions, LayerAlignment, LayerPlacement};
pub use error::{Error, Result};
pub use fetch::{tile_cover, tile_url, CrsRequest, TileCoord, TileRequest};
pub use picking::{pick, Highlight, Ray, SelectionChange, SelectionState};
pub use pipeline::{
    load_dataset, EntityDiagnostics, LoadOptions, LoadedModel, MeshGroup, SceneIndex,
};
pub use session::Session;
