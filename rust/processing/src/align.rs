// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Multi-layer geographic alignment
//!
//! Places the building model, cadastral parcels and base-map imagery in one
//! shared scene frame. All layers convert to projected meters relative to
//! the primary dataset's geographic center; one uniform scene-units-per-
//! meter ratio keeps relative real-world distances intact across layers.

use city_lite_core::{geographic_to_mercator, GeoExtent};
use serde::Serialize;
use std::f64::consts::PI;
use tracing::debug;

/// Options for layer alignment
#[derive(Debug, Clone, Serialize)]
pub struct AlignmentOptions {
    /// Desired on-screen span of the primary dataset, in scene units
    pub target_scene_span: f64,
    /// Scale handed to layers that cannot be aligned
    pub default_scale: f64,
}

impl Default for AlignmentOptions {
    fn default() -> Self {
        Self {
            target_scene_span: 800.0,
            default_scale: 1.0,
        }
    }
}

/// Placement of one layer in the shared scene frame
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerPlacement {
    /// False when the layer had no resolvable CRS and renders at a default
    /// local origin/scale
    pub aligned: bool,
    /// Scene units per real-world meter
    pub scale: f64,
    /// Scene-frame offset of the layer's center from the reference point
    pub translation: [f64; 2],
}

impl LayerPlacement {
    fn unaligned(default_scale: f64) -> Self {
        Self {
            aligned: false,
            scale: default_scale,
            translation: [0.0, 0.0],
        }
    }
}

/// Result of aligning all layers against the primary dataset
#[derive(Debug, Clone, Serialize)]
pub struct LayerAlignment {
    /// Shared reference point: the primary extent's geographic center
    pub reference_lon: f64,
    pub reference_lat: f64,
    /// Uniform scene-units-per-meter ratio applied to every aligned layer
    pub scene_per_meter: f64,
    pub primary: LayerPlacement,
    /// One placement per input layer, in order
    pub layers: Vec<LayerPlacement>,
}

/// Align auxiliary layers to the primary dataset.
///
/// Layers without an extent (no resolvable CRS) are omitted from alignment
/// but still receive a default placement so the primary dataset stays
/// usable.
pub fn align_layers(
    primary: &GeoExtent,
    layers: &[Option<GeoExtent>],
    options: &AlignmentOptions,
) -> LayerAlignment {
    let (ref_x, ref_y) = geographic_to_mercator(primary.center_lon, primary.center_lat);
    // Mercator meters stretch with latitude; correct to true ground meters
    // at the reference so scene_per_meter means what it says
    let meters_per_mercator = (primary.center_lat * PI / 180.0).cos();

    let (min_x, min_y) = geographic_to_mercator(primary.min_lon, primary.min_lat);
    let (max_x, max_y) = geographic_to_mercator(primary.max_lon, primary.max_lat);
    let span = (max_x - min_x).max(max_y - min_y) * meters_per_mercator;

    let scene_per_meter = if span > 0.0 {
        options.target_scene_span / span
    } else {
        options.default_scale
    };

    let place = |extent: &GeoExtent| -> LayerPlacement {
        let (cx, cy) = geographic_to_mercator(extent.center_lon, extent.center_lat);
        LayerPlacement {
            aligned: true,
            scale: scene_per_meter,
            translation: [
                (cx - ref_x) * meters_per_mercator * scene_per_meter,
                (cy - ref_y) * meters_per_mercator * scene_per_meter,
            ],
        }
    };

    let placements: Vec<LayerPlacement> = layers
        .iter()
        .map(|layer| match layer {
            Some(extent) => place(extent),
            None => {
                debug!("layer without CRS placed at default origin");
                LayerPlacement::unaligned(options.default_scale)
            }
        })
        .collect();

    LayerAlignment {
        reference_lon: primary.center_lon,
        reference_lat: primary.center_lat,
        scene_per_meter,
        primary: place(primary),
        layers: placements,
    }
}
