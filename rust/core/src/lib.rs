// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # City-Lite Core
//!
//! Data model and coordinate-reference-system support for CityJSON-shaped
//! city models.
//!
//! ## Overview
//!
//! This crate provides the non-geometric half of the City-Lite pipeline:
//!
//! - **Model types**: shared vertex pool, tagged boundary/semantics trees,
//!   entities with attributes and child references
//! - **Dataset intake**: one-pass conversion of a CityJSON-shaped document
//!   into the typed model, including dequantization and duplicate-vertex
//!   merging
//! - **CRS registry**: EPSG detection from free-form identifiers, compound
//!   code reduction, built-in and dynamically-resolved projections
//! - **Geographic extents**: f64 model bounds, relative-to-center offsets
//!   for Float32 precision, WGS84 footprints with plausibility guards
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use city_lite_core::{parse_city_model_str, CrsRegistry, GeoExtentOptions};
//!
//! let model = parse_city_model_str(&json_text)?;
//! let mut registry = CrsRegistry::new();
//! let extent = city_lite_core::compute_geo_extent(
//!     &model, &mut registry, &GeoExtentOptions::default());
//! ```

pub mod crs;
pub mod error;
pub mod extent;
pub mod model;
pub mod parse;

pub use crs::{
    builtin_definition, detect_epsg, geographic_to_mercator, horizontal_base,
    mercator_to_geographic, parse_proj4, CrsDef, CrsDefinitionSource, CrsRegistry, DatumShift,
    Ellipsoid, Projection,
};
pub use error::{Error, Result};
pub use extent::{
    compute_geo_extent, scan_model_bounds, GeoExtent, GeoExtentOptions, ModelBounds,
    PlausibilityPolicy,
};
pub use model::{
    BoundaryNode, CityModel, Entity, Geometry, GeometryKind, QuantizationTransform,
    SemanticSurface, Semantics, SemanticsNode, Vertex,
};
pub use parse::{parse_city_model, parse_city_model_str};
