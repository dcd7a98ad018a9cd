// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Model bounds and geographic extents
//!
//! Scans the vertex pool in f64 precision to determine the native bounding
//! box, used both for the relative-to-center shift that keeps Float32
//! rendering precise far from the origin, and for deriving the WGS84
//! footprint that drives multi-layer alignment.

use crate::crs::{detect_epsg, CrsRegistry};
use crate::model::CityModel;
use serde::{Deserialize, Serialize};

/// Native-coordinate bounds in f64 precision
#[derive(Debug, Clone)]
pub struct ModelBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub min_z: f64,
    pub max_x: f64,
    pub max_y: f64,
    pub max_z: f64,
    /// Number of points sampled
    pub sample_count: usize,
}

impl ModelBounds {
    pub fn new() -> Self {
        Self {
            min_x: f64::MAX,
            min_y: f64::MAX,
            min_z: f64::MAX,
            max_x: f64::MIN,
            max_y: f64::MIN,
            max_z: f64::MIN,
            sample_count: 0,
        }
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.sample_count > 0
    }

    #[inline]
    pub fn expand(&mut self, x: f64, y: f64, z: f64) {
        self.min_x = self.min_x.min(x);
        self.min_y = self.min_y.min(y);
        self.min_z = self.min_z.min(z);
        self.max_x = self.max_x.max(x);
        self.max_y = self.max_y.max(y);
        self.max_z = self.max_z.max(z);
        self.sample_count += 1;
    }

    /// Center of the bounding box
    #[inline]
    pub fn centroid(&self) -> (f64, f64, f64) {
        if !self.is_valid() {
            return (0.0, 0.0, 0.0);
        }
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
            (self.min_z + self.max_z) / 2.0,
        )
    }

    /// Largest horizontal span
    #[inline]
    pub fn span(&self) -> f64 {
        if !self.is_valid() {
            return 0.0;
        }
        (self.max_x - self.min_x).max(self.max_y - self.min_y)
    }

    /// Whether coordinates lie far (>10 km) from the origin
    #[inline]
    pub fn has_large_coordinates(&self) -> bool {
        const THRESHOLD: f64 = 10_000.0;
        if !self.is_valid() {
            return false;
        }
        self.min_x.abs() > THRESHOLD
            || self.min_y.abs() > THRESHOLD
            || self.max_x.abs() > THRESHOLD
            || self.max_y.abs() > THRESHOLD
            || self.min_z.abs() > THRESHOLD
            || self.max_z.abs() > THRESHOLD
    }

    /// Relative-to-center offset: the centroid when coordinates are large,
    /// zero otherwise
    #[inline]
    pub fn rtc_offset(&self) -> (f64, f64, f64) {
        if self.has_large_coordinates() {
            self.centroid()
        } else {
            (0.0, 0.0, 0.0)
        }
    }
}

impl Default for ModelBounds {
    fn default() -> Self {
        Self::new()
    }
}

/// Scan the model's vertex pool for its native bounding box.
/// Non-finite coordinates are skipped.
pub fn scan_model_bounds(model: &CityModel) -> ModelBounds {
    let mut bounds = ModelBounds::new();
    for vertex in &model.vertices {
        if vertex.x.is_finite() && vertex.y.is_finite() && vertex.z.is_finite() {
            bounds.expand(vertex.x, vertex.y, vertex.z);
        }
    }
    bounds
}

/// A layer's footprint in geographic WGS84 coordinates, derived once per
/// loaded dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoExtent {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
    pub center_lon: f64,
    pub center_lat: f64,
    /// Horizontal-base EPSG code the extent was derived with
    pub epsg: u32,
    /// Whether the CRS was declared by the dataset (false when assumed by
    /// the caller)
    pub crs_explicit: bool,
}

/// Thresholds for rejecting mislabeled local coordinates.
///
/// A dataset whose native extent is smaller than `max_local_span` AND whose
/// centroid sits within `max_origin_distance` of (0, 0), despite declaring a
/// projected real-world CRS, is almost certainly modeled in arbitrary local
/// coordinates. The values are policy, not contract.
#[derive(Debug, Clone, Copy)]
pub struct PlausibilityPolicy {
    pub max_local_span: f64,
    pub max_origin_distance: f64,
}

impl Default for PlausibilityPolicy {
    fn default() -> Self {
        Self {
            max_local_span: 1_000.0,
            max_origin_distance: 1_000.0,
        }
    }
}

impl PlausibilityPolicy {
    fn looks_local(&self, bounds: &ModelBounds) -> bool {
        let (cx, cy, _) = bounds.centroid();
        bounds.span() < self.max_local_span && cx.hypot(cy) < self.max_origin_distance
    }
}

/// Options for extent derivation
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoExtentOptions {
    pub policy: PlausibilityPolicy,
    /// CRS to assume when the dataset declares none; the resulting extent is
    /// marked `crs_explicit: false`
    pub assume_epsg: Option<u32>,
}

/// Derive a dataset's WGS84 footprint, or `None` when the dataset has no
/// recognizable or plausible CRS (geo-alignment is then disabled for it).
pub fn compute_geo_extent(
    model: &CityModel,
    registry: &mut CrsRegistry,
    options: &GeoExtentOptions,
) -> Option<GeoExtent> {
    let declared = model.reference_system.as_deref().and_then(detect_epsg);
    let (epsg, crs_explicit) = match declared {
        Some(code) => (code, true),
        None => (options.assume_epsg?, false),
    };

    let bounds = match model.geographical_extent {
        Some([min_x, min_y, min_z, max_x, max_y, max_z]) => {
            let mut bounds = ModelBounds::new();
            bounds.expand(min_x, min_y, min_z);
            bounds.expand(max_x, max_y, max_z);
            bounds
        }
        None => scan_model_bounds(model),
    };
    if !bounds.is_valid() {
        return None;
    }

    let def = registry.resolve(epsg)?.clone();

    if !def.is_geographic() && options.policy.looks_local(&bounds) {
        return None;
    }

    let corners = [
        (bounds.min_x, bounds.min_y),
        (bounds.min_x, bounds.max_y),
        (bounds.max_x, bounds.min_y),
        (bounds.max_x, bounds.max_y),
    ];

    let mut min_lon = f64::MAX;
    let mut min_lat = f64::MAX;
    let mut max_lon = f64::MIN;
    let mut max_lat = f64::MIN;
    for (x, y) in corners {
        let (lon, lat) = def.to_geographic(x, y);
        if !lon.is_finite() || !lat.is_finite() {
            return None;
        }
        min_lon = min_lon.min(lon);
        min_lat = min_lat.min(lat);
        max_lon = max_lon.max(lon);
        max_lat = max_lat.max(lat);
    }

    // Outside valid geographic ranges: the declared CRS does not fit the data
    if min_lon < -180.0 || max_lon > 180.0 || min_lat < -90.0 || max_lat > 90.0 {
        return None;
    }

    let (cx, cy, _) = bounds.centroid();
    let (center_lon, center_lat) = def.to_geographic(cx, cy);

    Some(GeoExtent {
        min_lon,
        min_lat,
        max_lon,
        max_lat,
        center_lon,
        center_lat,
        epsg: def.epsg,
        crs_explicit,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Vertex;

    fn model_with_vertices(vertices: Vec<Vertex>, reference_system: Option<&str>) -> CityModel {
        CityModel {
            vertices,
            reference_system: reference_system.map(str::to_string),
            ..Default::default()
        }
    }

    #[test]
    fn test_scan_bounds() {
        let model = model_with_vertices(
            vec![Vertex::new(100.0, 200.0, 50.0), Vertex::new(150.0, 250.0, 75.0)],
            None,
        );
        let bounds = scan_model_bounds(&model);
        assert!(bounds.is_valid());
        assert_eq!(bounds.min_x, 100.0);
        assert_eq!(bounds.max_y, 250.0);
        assert_eq!(bounds.centroid(), (125.0, 225.0, 62.5));
        assert!(!bounds.has_large_coordinates());
    }

    #[test]
    fn test_rtc_offset_for_large_coordinates() {
        let model = model_with_vertices(
            vec![
                Vertex::new(85_000.0, 446_000.0, 0.0),
                Vertex::new(85_100.0, 446_100.0, 30.0),
            ],
            None,
        );
        let bounds = scan_model_bounds(&model);
        assert!(bounds.has_large_coordinates());
        let (ox, oy, _) = bounds.rtc_offset();
        assert_eq!(ox, 85_050.0);
        assert_eq!(oy, 446_050.0);
    }

    #[test]
    fn test_extent_from_rd_coordinates() {
        // A block in Rotterdam, RD New coordinates, declared via URN
        let model = model_with_vertices(
            vec![
                Vertex::new(92_000.0, 437_000.0, 0.0),
                Vertex::new(93_000.0, 438_000.0, 40.0),
            ],
            Some("urn:ogc:def:crs:EPSG::7415"),
        );
        let mut registry = CrsRegistry::new();
        let extent = compute_geo_extent(&model, &mut registry, &GeoExtentOptions::default())
            .expect("extent must resolve");

        assert_eq!(extent.epsg, 28992);
        assert!(extent.crs_explicit);
        assert!(extent.min_lon < extent.max_lon);
        assert!(extent.min_lat < extent.max_lat);
        // Rotterdam sits near 4.5E, 51.9N
        assert!((extent.center_lon - 4.5).abs() < 0.3);
        assert!((extent.center_lat - 51.9).abs() < 0.3);
    }

    #[test]
    fn test_no_reference_system_yields_none() {
        let model = model_with_vertices(vec![Vertex::new(0.0, 0.0, 0.0)], None);
        let mut registry = CrsRegistry::new();
        assert!(compute_geo_extent(&model, &mut registry, &GeoExtentOptions::default()).is_none());
    }

    #[test]
    fn test_assumed_crs_is_not_explicit() {
        let model = model_with_vertices(
            vec![Vertex::new(4.8, 52.3, 0.0), Vertex::new(4.9, 52.4, 0.0)],
            None,
        );
        let mut registry = CrsRegistry::new();
        let options = GeoExtentOptions {
            assume_epsg: Some(4326),
            ..Default::default()
        };
        let extent = compute_geo_extent(&model, &mut registry, &options).unwrap();
        assert!(!extent.crs_explicit);
        assert_eq!(extent.epsg, 4326);
    }

    #[test]
    fn test_local_coordinates_mislabeled_as_projected_rejected() {
        // A 20 m model hugging the origin cannot really be RD coordinates
        let model = model_with_vertices(
            vec![Vertex::new(0.0, 0.0, 0.0), Vertex::new(20.0, 15.0, 5.0)],
            Some("EPSG:28992"),
        );
        let mut registry = CrsRegistry::new();
        assert!(compute_geo_extent(&model, &mut registry, &GeoExtentOptions::default()).is_none());
    }

    #[test]
    fn test_out_of_range_result_rejected() {
        // Degrees-sized numbers declared as UTM meters produce a box at the
        // projection origin; tiny-extent-near-origin already rejects it
        let model = model_with_vertices(
            vec![Vertex::new(4.8, 52.3, 0.0), Vertex::new(4.9, 52.4, 0.0)],
            Some("EPSG:32632"),
        );
        let mut registry = CrsRegistry::new();
        assert!(compute_geo_extent(&model, &mut registry, &GeoExtentOptions::default()).is_none());
    }

    #[test]
    fn test_declared_extent_preferred_over_scan() {
        let mut model = model_with_vertices(
            vec![Vertex::new(92_000.0, 437_000.0, 0.0)],
            Some("EPSG:28992"),
        );
        model.geographical_extent = Some([92_000.0, 437_000.0, 0.0, 93_000.0, 438_000.0, 40.0]);
        let mut registry = CrsRegistry::new();
        let extent =
            compute_geo_extent(&model, &mut registry, &GeoExtentOptions::default()).unwrap();
        assert!(extent.max_lat > extent.min_lat);
    }
}
