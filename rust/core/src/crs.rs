// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Coordinate reference system registry and transforms
//!
//! Detects a dataset's CRS from its free-form identifier string, reduces
//! compound/3D codes to their 2D horizontal base, and converts between the
//! native CRS, geographic WGS84 coordinates, and Web Mercator meters used as
//! the shared projected space.
//!
//! Projection math is implemented directly (transverse Mercator, oblique
//! stereographic on the conformal sphere, spherical Web Mercator) so that
//! the common codes resolve without any external service; everything else
//! goes through a pluggable proj4-string definition source.

use crate::error::{Error, Result};
use rustc_hash::FxHashMap;
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

/// Earth radius used by spherical Web Mercator
pub const MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Web Mercator latitude clamp (tile scheme singularity at the poles)
const MERCATOR_MAX_LAT: f64 = 85.06;

const DEG: f64 = PI / 180.0;

/// Reference ellipsoid as semi-major axis plus flattening
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipsoid {
    pub a: f64,
    pub f: f64,
}

impl Ellipsoid {
    pub const WGS84: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_223_563,
    };
    pub const GRS80: Ellipsoid = Ellipsoid {
        a: 6_378_137.0,
        f: 1.0 / 298.257_222_101,
    };
    pub const BESSEL: Ellipsoid = Ellipsoid {
        a: 6_377_397.155,
        f: 1.0 / 299.152_812_8,
    };

    /// First eccentricity squared
    #[inline]
    pub fn e2(&self) -> f64 {
        self.f * (2.0 - self.f)
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "WGS84" | "wgs84" => Some(Self::WGS84),
            "GRS80" | "grs80" => Some(Self::GRS80),
            "bessel" => Some(Self::BESSEL),
            _ => None,
        }
    }
}

/// Seven-parameter Helmert shift to WGS84 (position-vector convention;
/// rotations in arc-seconds, scale in ppm)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DatumShift {
    pub dx: f64,
    pub dy: f64,
    pub dz: f64,
    pub rx: f64,
    pub ry: f64,
    pub rz: f64,
    pub scale_ppm: f64,
}

const ARCSEC: f64 = PI / 648_000.0;

impl DatumShift {
    /// Shift geocentric coordinates from the native datum to WGS84
    fn to_wgs84(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (rx, ry, rz) = (self.rx * ARCSEC, self.ry * ARCSEC, self.rz * ARCSEC);
        let m = 1.0 + self.scale_ppm * 1e-6;
        (
            self.dx + m * (x - rz * y + ry * z),
            self.dy + m * (rz * x + y - rx * z),
            self.dz + m * (-ry * x + rx * y + z),
        )
    }

    /// Inverse shift; exact for the small angles these parameters carry
    fn from_wgs84(&self, x: f64, y: f64, z: f64) -> (f64, f64, f64) {
        let (rx, ry, rz) = (self.rx * ARCSEC, self.ry * ARCSEC, self.rz * ARCSEC);
        let m = 1.0 + self.scale_ppm * 1e-6;
        let (tx, ty, tz) = ((x - self.dx) / m, (y - self.dy) / m, (z - self.dz) / m);
        (
            tx + rz * ty - ry * tz,
            -rz * tx + ty + rx * tz,
            ry * tx - rx * ty + tz,
        )
    }
}

/// Supported projection methods; angular parameters in degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    /// Longitude/latitude degrees stored directly as (x, y)
    Geographic,
    /// Spherical Web Mercator
    WebMercator,
    TransverseMercator {
        lat_0: f64,
        lon_0: f64,
        k_0: f64,
        x_0: f64,
        y_0: f64,
    },
    ObliqueStereographic {
        lat_0: f64,
        lon_0: f64,
        k_0: f64,
        x_0: f64,
        y_0: f64,
    },
}

/// A resolved coordinate reference system definition
#[derive(Debug, Clone, PartialEq)]
pub struct CrsDef {
    pub epsg: u32,
    pub projection: Projection,
    pub ellipsoid: Ellipsoid,
    pub datum_shift: Option<DatumShift>,
}

impl CrsDef {
    #[inline]
    pub fn is_geographic(&self) -> bool {
        matches!(self.projection, Projection::Geographic)
    }

    /// Convert native coordinates to geographic WGS84 (longitude, latitude)
    /// in degrees
    pub fn to_geographic(&self, x: f64, y: f64) -> (f64, f64) {
        let (lat, lon) = match self.projection {
            Projection::Geographic => (y * DEG, x * DEG),
            Projection::WebMercator => {
                let (lon, lat) = mercator_to_geographic(x, y);
                (lat * DEG, lon * DEG)
            }
            Projection::TransverseMercator {
                lat_0,
                lon_0,
                k_0,
                x_0,
                y_0,
            } => tmerc_inverse(&self.ellipsoid, lat_0 * DEG, lon_0 * DEG, k_0, x_0, y_0, x, y),
            Projection::ObliqueStereographic {
                lat_0,
                lon_0,
                k_0,
                x_0,
                y_0,
            } => sterea_inverse(&self.ellipsoid, lat_0 * DEG, lon_0 * DEG, k_0, x_0, y_0, x, y),
        };

        let (lat, lon) = match &self.datum_shift {
            Some(shift) => {
                let (gx, gy, gz) = geodetic_to_geocentric(&self.ellipsoid, lat, lon);
                let (wx, wy, wz) = shift.to_wgs84(gx, gy, gz);
                geocentric_to_geodetic(&Ellipsoid::WGS84, wx, wy, wz)
            }
            None => (lat, lon),
        };

        (lon / DEG, lat / DEG)
    }

    /// Convert geographic WGS84 (longitude, latitude) degrees to native
    /// coordinates
    pub fn from_geographic(&self, lon: f64, lat: f64) -> (f64, f64) {
        let (mut lat_r, mut lon_r) = (lat * DEG, lon * DEG);

        if let Some(shift) = &self.datum_shift {
            let (gx, gy, gz) = geodetic_to_geocentric(&Ellipsoid::WGS84, lat_r, lon_r);
            let (nx, ny, nz) = shift.from_wgs84(gx, gy, gz);
            let (lat_n, lon_n) = geocentric_to_geodetic(&self.ellipsoid, nx, ny, nz);
            lat_r = lat_n;
            lon_r = lon_n;
        }

        match self.projection {
            Projection::Geographic => (lon_r / DEG, lat_r / DEG),
            Projection::WebMercator => geographic_to_mercator(lon_r / DEG, lat_r / DEG),
            Projection::TransverseMercator {
                lat_0,
                lon_0,
                k_0,
                x_0,
                y_0,
            } => tmerc_forward(
                &self.ellipsoid,
                lat_0 * DEG,
                lon_0 * DEG,
                k_0,
                x_0,
                y_0,
                lat_r,
                lon_r,
            ),
            Projection::ObliqueStereographic {
                lat_0,
                lon_0,
                k_0,
                x_0,
                y_0,
            } => sterea_forward(
                &self.ellipsoid,
                lat_0 * DEG,
                lon_0 * DEG,
                k_0,
                x_0,
                y_0,
                lat_r,
                lon_r,
            ),
        }
    }

    /// Native coordinates to shared projected meters (Web Mercator)
    pub fn to_mercator(&self, x: f64, y: f64) -> (f64, f64) {
        let (lon, lat) = self.to_geographic(x, y);
        geographic_to_mercator(lon, lat)
    }

    /// Shared projected meters (Web Mercator) to native coordinates
    pub fn from_mercator(&self, x: f64, y: f64) -> (f64, f64) {
        let (lon, lat) = mercator_to_geographic(x, y);
        self.from_geographic(lon, lat)
    }
}

// ---------- identifier detection ----------

/// Extract a numeric EPSG code from a free-form reference-system identifier.
///
/// Recognized forms, in order: OGC URN/URL carrying an `EPSG` authority
/// (`urn:ogc:def:crs:EPSG::7415`, `www.opengis.net/def/crs/EPSG/0/4326`),
/// the short `EPSG:4326` form, and a bare numeric code. Anything else yields
/// `None`, which disables geo-alignment for the dataset rather than failing.
pub fn detect_epsg(identifier: &str) -> Option<u32> {
    let trimmed = identifier.trim();
    if trimmed.is_empty() {
        return None;
    }

    let upper = trimmed.to_ascii_uppercase();
    if let Some(pos) = upper.find("EPSG") {
        // URN, URL and short forms all end in the code; version segments
        // (e.g. `EPSG:8.5:7415`) sit between authority and code
        return last_digit_run(&upper[pos + 4..]);
    }

    if trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return trimmed.parse().ok();
    }

    None
}

fn last_digit_run(s: &str) -> Option<u32> {
    let bytes = s.as_bytes();
    let mut end = bytes.len();
    while end > 0 && !bytes[end - 1].is_ascii_digit() {
        end -= 1;
    }
    let mut start = end;
    while start > 0 && bytes[start - 1].is_ascii_digit() {
        start -= 1;
    }
    if start == end {
        return None;
    }
    s[start..end].parse().ok()
}

/// Reduce a compound or 3D code to its 2D horizontal base.
///
/// Using a compound code directly in a planar transform silently produces
/// wrong results; this table is consulted before every resolution.
pub fn horizontal_base(epsg: u32) -> u32 {
    match epsg {
        // Amersfoort RD + NAP
        7415 => 28992,
        // ETRS89 UTM + DHHN92
        5554 => 25831,
        5555 => 25832,
        5556 => 25833,
        // ETRS89 UTM 32N + DVR90
        7416 => 25832,
        // WGS84 3D
        4979 => 4326,
        // JGD2011 3D
        6697 => 6668,
        other => other,
    }
}

// ---------- built-in definitions ----------

/// Projection parameters known without consulting a definition source
pub fn builtin_definition(epsg: u32) -> Option<CrsDef> {
    let def = match epsg {
        4326 => CrsDef {
            epsg,
            projection: Projection::Geographic,
            ellipsoid: Ellipsoid::WGS84,
            datum_shift: None,
        },
        // ETRS89 / JGD2011 geographic; both within centimeters of WGS84
        4258 | 6668 => CrsDef {
            epsg,
            projection: Projection::Geographic,
            ellipsoid: Ellipsoid::GRS80,
            datum_shift: None,
        },
        3857 | 900_913 => CrsDef {
            epsg,
            projection: Projection::WebMercator,
            ellipsoid: Ellipsoid::WGS84,
            datum_shift: None,
        },
        // Amersfoort / RD New
        28992 => CrsDef {
            epsg,
            projection: Projection::ObliqueStereographic {
                lat_0: 52.156_160_555_555_55,
                lon_0: 5.387_638_888_888_89,
                k_0: 0.999_907_9,
                x_0: 155_000.0,
                y_0: 463_000.0,
            },
            ellipsoid: Ellipsoid::BESSEL,
            datum_shift: Some(DatumShift {
                dx: 565.417,
                dy: 50.3319,
                dz: 465.552,
                rx: -0.398_957,
                ry: 0.343_988,
                rz: -1.877_4,
                scale_ppm: 4.072_5,
            }),
        },
        // ETRS89 / UTM zones 31N-33N
        25831..=25833 => {
            let zone = epsg - 25800;
            CrsDef {
                epsg,
                projection: utm_projection(zone, false),
                ellipsoid: Ellipsoid::GRS80,
                datum_shift: None,
            }
        }
        // WGS84 / UTM northern and southern zones
        32601..=32660 => CrsDef {
            epsg,
            projection: utm_projection(epsg - 32600, false),
            ellipsoid: Ellipsoid::WGS84,
            datum_shift: None,
        },
        32701..=32760 => CrsDef {
            epsg,
            projection: utm_projection(epsg - 32700, true),
            ellipsoid: Ellipsoid::WGS84,
            datum_shift: None,
        },
        _ => return None,
    };
    Some(def)
}

fn utm_projection(zone: u32, south: bool) -> Projection {
    Projection::TransverseMercator {
        lat_0: 0.0,
        lon_0: zone as f64 * 6.0 - 183.0,
        k_0: 0.9996,
        x_0: 500_000.0,
        y_0: if south { 10_000_000.0 } else { 0.0 },
    }
}

// ---------- proj4 definition strings ----------

/// Parse a proj4 parameter string (`+proj=… +lat_0=…`) into a definition.
///
/// This is the format the dynamic definition source yields for codes with no
/// built-in parameters.
pub fn parse_proj4(epsg: u32, definition: &str) -> Result<CrsDef> {
    let mut params: FxHashMap<&str, &str> = FxHashMap::default();
    for token in definition.split_whitespace() {
        let Some(token) = token.strip_prefix('+') else {
            continue;
        };
        match token.split_once('=') {
            Some((key, value)) => params.insert(key, value),
            None => params.insert(token, ""),
        };
    }

    let num = |key: &str| -> Option<f64> { params.get(key).and_then(|v| v.parse::<f64>().ok()) };

    let ellipsoid = resolve_ellipsoid(&params, &num);
    let datum_shift = params.get("towgs84").and_then(|v| parse_towgs84(v));

    let proj = params
        .get("proj")
        .copied()
        .ok_or_else(|| Error::InvalidCrsDefinition(format!("missing +proj in '{definition}'")))?;

    let projection = match proj {
        "longlat" | "latlong" | "latlon" => Projection::Geographic,
        "merc" | "webmerc" => Projection::WebMercator,
        "utm" => {
            let zone = num("zone")
                .ok_or_else(|| Error::InvalidCrsDefinition("utm without +zone".to_string()))?;
            utm_projection(zone as u32, params.contains_key("south"))
        }
        "tmerc" => Projection::TransverseMercator {
            lat_0: num("lat_0").unwrap_or(0.0),
            lon_0: num("lon_0").unwrap_or(0.0),
            k_0: num("k").or_else(|| num("k_0")).unwrap_or(1.0),
            x_0: num("x_0").unwrap_or(0.0),
            y_0: num("y_0").unwrap_or(0.0),
        },
        "sterea" => Projection::ObliqueStereographic {
            lat_0: num("lat_0").unwrap_or(0.0),
            lon_0: num("lon_0").unwrap_or(0.0),
            k_0: num("k").or_else(|| num("k_0")).unwrap_or(1.0),
            x_0: num("x_0").unwrap_or(0.0),
            y_0: num("y_0").unwrap_or(0.0),
        },
        other => return Err(Error::UnsupportedProjection(other.to_string())),
    };

    Ok(CrsDef {
        epsg,
        projection,
        ellipsoid,
        datum_shift,
    })
}

fn resolve_ellipsoid(
    params: &FxHashMap<&str, &str>,
    num: &dyn Fn(&str) -> Option<f64>,
) -> Ellipsoid {
    if let Some(ellps) = params.get("ellps").and_then(|n| Ellipsoid::from_name(n)) {
        return ellps;
    }
    if let Some(datum) = params.get("datum").and_then(|n| Ellipsoid::from_name(n)) {
        return datum;
    }
    if let Some(a) = num("a") {
        if let Some(rf) = num("rf") {
            return Ellipsoid { a, f: 1.0 / rf };
        }
        if let Some(b) = num("b") {
            return Ellipsoid { a, f: (a - b) / a };
        }
    }
    Ellipsoid::WGS84
}

fn parse_towgs84(value: &str) -> Option<DatumShift> {
    let parts: Vec<f64> = value
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .ok()?;
    match parts.len() {
        3 => Some(DatumShift {
            dx: parts[0],
            dy: parts[1],
            dz: parts[2],
            ..Default::default()
        }),
        7 => Some(DatumShift {
            dx: parts[0],
            dy: parts[1],
            dz: parts[2],
            rx: parts[3],
            ry: parts[4],
            rz: parts[5],
            scale_ppm: parts[6],
        }),
        _ => None,
    }
}

// ---------- registry ----------

/// External source of proj4 definitions for codes without built-in
/// parameters. The embedder performs the actual fetch; failures simply leave
/// the layer un-aligned.
pub trait CrsDefinitionSource {
    fn lookup(&self, epsg: u32) -> Option<String>;
}

/// Definition cache keyed by horizontal-base EPSG code
#[derive(Default)]
pub struct CrsRegistry {
    cache: FxHashMap<u32, CrsDef>,
    source: Option<Box<dyn CrsDefinitionSource + Send + Sync>>,
}

impl CrsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(source: Box<dyn CrsDefinitionSource + Send + Sync>) -> Self {
        Self {
            cache: FxHashMap::default(),
            source: Some(source),
        }
    }

    /// Resolve a code to projection parameters, reducing compound/3D codes
    /// to their horizontal base first. Returns `None` when neither the
    /// built-in table nor the definition source knows the code.
    pub fn resolve(&mut self, epsg: u32) -> Option<&CrsDef> {
        let base = horizontal_base(epsg);
        if !self.cache.contains_key(&base) {
            let def = match builtin_definition(base) {
                Some(def) => Some(def),
                None => self
                    .source
                    .as_ref()
                    .and_then(|source| source.lookup(base))
                    .and_then(|text| parse_proj4(base, &text).ok()),
            };
            match def {
                Some(def) => {
                    self.cache.insert(base, def);
                }
                None => return None,
            }
        }
        self.cache.get(&base)
    }

    /// Insert a definition obtained out-of-band (e.g. a completed async
    /// fetch). Replaces any cached definition for the same base code.
    pub fn insert_definition(&mut self, epsg: u32, definition: &str) -> Result<()> {
        let base = horizontal_base(epsg);
        let def = parse_proj4(base, definition)?;
        self.cache.insert(base, def);
        Ok(())
    }

    #[inline]
    pub fn is_resolved(&self, epsg: u32) -> bool {
        self.cache.contains_key(&horizontal_base(epsg))
    }
}

// ---------- Web Mercator ----------

/// Geographic WGS84 degrees to spherical Web Mercator meters
#[inline]
pub fn geographic_to_mercator(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = MERCATOR_RADIUS * lon * DEG;
    let y = MERCATOR_RADIUS * (FRAC_PI_4 + lat * DEG / 2.0).tan().ln();
    (x, y)
}

/// Spherical Web Mercator meters to geographic WGS84 degrees
#[inline]
pub fn mercator_to_geographic(x: f64, y: f64) -> (f64, f64) {
    let lon = x / MERCATOR_RADIUS / DEG;
    let lat = (2.0 * (y / MERCATOR_RADIUS).exp().atan() - FRAC_PI_2) / DEG;
    (lon, lat)
}

// ---------- transverse Mercator ----------

fn meridian_arc(a: f64, e2: f64, phi: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    a * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}

#[allow(clippy::too_many_arguments)]
fn tmerc_forward(
    ellipsoid: &Ellipsoid,
    lat_0: f64,
    lon_0: f64,
    k_0: f64,
    x_0: f64,
    y_0: f64,
    lat: f64,
    lon: f64,
) -> (f64, f64) {
    let a = ellipsoid.a;
    let e2 = ellipsoid.e2();
    let ep2 = e2 / (1.0 - e2);

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let n = a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let t = (lat.tan()).powi(2);
    let c = ep2 * cos_lat * cos_lat;
    let big_a = (lon - lon_0) * cos_lat;
    let m = meridian_arc(a, e2, lat);
    let m_0 = meridian_arc(a, e2, lat_0);

    let x = k_0
        * n
        * (big_a
            + (1.0 - t + c) * big_a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * big_a.powi(5) / 120.0)
        + x_0;
    let y = k_0
        * (m - m_0
            + n * lat.tan()
                * (big_a.powi(2) / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * big_a.powi(4) / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * big_a.powi(6)
                        / 720.0))
        + y_0;
    (x, y)
}

#[allow(clippy::too_many_arguments)]
fn tmerc_inverse(
    ellipsoid: &Ellipsoid,
    lat_0: f64,
    lon_0: f64,
    k_0: f64,
    x_0: f64,
    y_0: f64,
    x: f64,
    y: f64,
) -> (f64, f64) {
    let a = ellipsoid.a;
    let e2 = ellipsoid.e2();
    let ep2 = e2 / (1.0 - e2);

    let m = (y - y_0) / k_0 + meridian_arc(a, e2, lat_0);
    let mu = m / (a * (1.0 - e2 / 4.0 - 3.0 * e2 * e2 / 64.0 - 5.0 * e2 * e2 * e2 / 256.0));
    let e1 = (1.0 - (1.0 - e2).sqrt()) / (1.0 + (1.0 - e2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let c1 = ep2 * cos_phi1 * cos_phi1;
    let t1 = (phi1.tan()).powi(2);
    let n1 = a / (1.0 - e2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = a * (1.0 - e2) / (1.0 - e2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = (x - x_0) / (n1 * k_0);

    let lat = phi1
        - (n1 * phi1.tan() / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1)
                    * d.powi(6)
                    / 720.0);
    let lon = lon_0
        + (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1)
                * d.powi(5)
                / 120.0)
            / cos_phi1;
    (lat, lon)
}

// ---------- oblique stereographic (conformal sphere) ----------

struct StereaConstants {
    e: f64,
    n: f64,
    c: f64,
    chi_0: f64,
    r: f64,
    lambda_0: f64,
}

fn sterea_constants(ellipsoid: &Ellipsoid, lat_0: f64, lon_0: f64) -> StereaConstants {
    let e2 = ellipsoid.e2();
    let e = e2.sqrt();
    let sin_0 = lat_0.sin();
    let cos_0 = lat_0.cos();

    let r = ellipsoid.a * (1.0 - e2).sqrt() / (1.0 - e2 * sin_0 * sin_0);
    let n = (1.0 + e2 * cos_0.powi(4) / (1.0 - e2)).sqrt();

    let s1 = (1.0 + sin_0) / (1.0 - sin_0);
    let s2 = (1.0 - e * sin_0) / (1.0 + e * sin_0);
    let w1 = (s1 * s2.powf(e)).powf(n);
    let mut sin_chi_0 = (w1 - 1.0) / (w1 + 1.0);
    let c = (n + sin_0) * (1.0 - sin_chi_0) / ((n - sin_0) * (1.0 + sin_chi_0));
    let w2 = c * w1;
    sin_chi_0 = (w2 - 1.0) / (w2 + 1.0);

    StereaConstants {
        e,
        n,
        c,
        chi_0: sin_chi_0.asin(),
        r,
        lambda_0: lon_0,
    }
}

#[allow(clippy::too_many_arguments)]
fn sterea_forward(
    ellipsoid: &Ellipsoid,
    lat_0: f64,
    lon_0: f64,
    k_0: f64,
    x_0: f64,
    y_0: f64,
    lat: f64,
    lon: f64,
) -> (f64, f64) {
    let k = sterea_constants(ellipsoid, lat_0, lon_0);

    let sin_lat = lat.sin();
    let sa = (1.0 + sin_lat) / (1.0 - sin_lat);
    let sb = (1.0 - k.e * sin_lat) / (1.0 + k.e * sin_lat);
    let w = k.c * (sa * sb.powf(k.e)).powf(k.n);
    let chi = ((w - 1.0) / (w + 1.0)).asin();
    let d_lambda = k.n * (lon - k.lambda_0);

    let b = 1.0 + chi.sin() * k.chi_0.sin() + chi.cos() * k.chi_0.cos() * d_lambda.cos();
    let x = x_0 + 2.0 * k.r * k_0 * chi.cos() * d_lambda.sin() / b;
    let y = y_0 + 2.0 * k.r * k_0 * (chi.sin() * k.chi_0.cos() - chi.cos() * k.chi_0.sin() * d_lambda.cos()) / b;
    (x, y)
}

#[allow(clippy::too_many_arguments)]
fn sterea_inverse(
    ellipsoid: &Ellipsoid,
    lat_0: f64,
    lon_0: f64,
    k_0: f64,
    x_0: f64,
    y_0: f64,
    x: f64,
    y: f64,
) -> (f64, f64) {
    let k = sterea_constants(ellipsoid, lat_0, lon_0);
    let dx = x - x_0;
    let dy = y - y_0;

    let g = 2.0 * k.r * k_0 * (FRAC_PI_4 - k.chi_0 / 2.0).tan();
    let h = 4.0 * k.r * k_0 * k.chi_0.tan() + g;
    let i = dx.atan2(h + dy);
    let j = dx.atan2(g - dy) - i;
    let chi = k.chi_0 + 2.0 * ((dy - dx * (j / 2.0).tan()) / (2.0 * k.r * k_0)).atan();
    let d_lambda = j + 2.0 * i;
    let lon = d_lambda / k.n + k.lambda_0;

    // Iterate the conformal latitude back to geodetic latitude
    let e2 = ellipsoid.e2();
    let psi = (0.5 * ((1.0 + chi.sin()) / (k.c * (1.0 - chi.sin()))).ln()) / k.n;
    let mut lat = 2.0 * psi.exp().atan() - FRAC_PI_2;
    for _ in 0..8 {
        let sin_lat = lat.sin();
        let psi_i = ((lat / 2.0 + FRAC_PI_4).tan()
            * ((1.0 - k.e * sin_lat) / (1.0 + k.e * sin_lat)).powf(k.e / 2.0))
        .ln();
        let next = lat - (psi_i - psi) * lat.cos() * (1.0 - e2 * sin_lat * sin_lat) / (1.0 - e2);
        if (next - lat).abs() < 1e-14 {
            lat = next;
            break;
        }
        lat = next;
    }

    (lat, lon)
}

// ---------- geocentric conversions ----------

fn geodetic_to_geocentric(ellipsoid: &Ellipsoid, lat: f64, lon: f64) -> (f64, f64, f64) {
    let e2 = ellipsoid.e2();
    let sin_lat = lat.sin();
    let n = ellipsoid.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    (
        n * lat.cos() * lon.cos(),
        n * lat.cos() * lon.sin(),
        n * (1.0 - e2) * sin_lat,
    )
}

fn geocentric_to_geodetic(ellipsoid: &Ellipsoid, x: f64, y: f64, z: f64) -> (f64, f64) {
    let e2 = ellipsoid.e2();
    let lon = y.atan2(x);
    let p = (x * x + y * y).sqrt();

    let mut lat = z.atan2(p * (1.0 - e2));
    for _ in 0..6 {
        let sin_lat = lat.sin();
        let n = ellipsoid.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
        let next = (z + e2 * n * sin_lat).atan2(p);
        if (next - lat).abs() < 1e-14 {
            lat = next;
            break;
        }
        lat = next;
    }
    (lat, lon)
}
