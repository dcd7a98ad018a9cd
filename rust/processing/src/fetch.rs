// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Asynchronous fetch bookkeeping
//!
//! The embedder performs the actual network I/O for CRS definitions and
//! base-map tiles. Requests carry the generation of the dataset that issued
//! them; completions whose generation no longer matches the live dataset are
//! dropped, which makes reload races safe without a cancellation primitive.

use city_lite_core::GeoExtent;
use serde::Serialize;

/// One slippy-scheme base-map tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

/// A tile fetch issued on behalf of one dataset generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileRequest {
    pub generation: u64,
    pub tile: TileCoord,
}

/// A CRS definition fetch issued on behalf of one dataset generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrsRequest {
    pub generation: u64,
    pub epsg: u32,
}

/// Tiles covering an extent at the given zoom level
pub fn tile_cover(extent: &GeoExtent, zoom: u8) -> Vec<TileCoord> {
    let max_index = (1u32 << zoom) - 1;

    let x0 = lon_to_tile_x(extent.min_lon, zoom).min(max_index);
    let x1 = lon_to_tile_x(extent.max_lon, zoom).min(max_index);
    // Tile rows grow southwards: max_lat maps to the smallest row
    let y0 = lat_to_tile_y(extent.max_lat, zoom).min(max_index);
    let y1 = lat_to_tile_y(extent.min_lat, zoom).min(max_index);

    let mut tiles = Vec::with_capacity(((x1 - x0 + 1) * (y1 - y0 + 1)) as usize);
    for y in y0..=y1 {
        for x in x0..=x1 {
            tiles.push(TileCoord { x, y, z: zoom });
        }
    }
    tiles
}

/// Fill a `{z}/{x}/{y}` URL template for one tile
pub fn tile_url(template: &str, tile: TileCoord) -> String {
    template
        .replace("{z}", &tile.z.to_string())
        .replace("{x}", &tile.x.to_string())
        .replace("{y}", &tile.y.to_string())
}

fn lon_to_tile_x(lon: f64, zoom: u8) -> u32 {
    let n = (1u32 << zoom) as f64;
    let x = (lon + 180.0) / 360.0 * n;
    x.floor().max(0.0) as u32
}

fn lat_to_tile_y(lat: f64, zoom: u8) -> u32 {
    let n = (1u32 << zoom) as f64;
    let lat_rad = lat.to_radians();
    let y = (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / std::f64::consts::PI) / 2.0 * n;
    y.floor().max(0.0) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn amsterdam_extent() -> GeoExtent {
        GeoExtent {
            min_lon: 4.88,
            min_lat: 52.36,
            max_lon: 4.92,
            max_lat: 52.38,
            center_lon: 4.90,
            center_lat: 52.37,
            epsg: 4326,
            crs_explicit: true,
        }
    }

    #[test]
    fn test_tile_cover_is_contiguous() {
        let tiles = tile_cover(&amsterdam_extent(), 15);
        assert!(!tiles.is_empty());

        let min_x = tiles.iter().map(|t| t.x).min().unwrap();
        let max_x = tiles.iter().map(|t| t.x).max().unwrap();
        let min_y = tiles.iter().map(|t| t.y).min().unwrap();
        let max_y = tiles.iter().map(|t| t.y).max().unwrap();
        assert_eq!(
            tiles.len() as u32,
            (max_x - min_x + 1) * (max_y - min_y + 1)
        );
    }

    #[test]
    fn test_tile_cover_known_tile() {
        // Amsterdam at zoom 10 sits in tile x=526, y=336
        let tiles = tile_cover(&amsterdam_extent(), 10);
        assert!(tiles.contains(&TileCoord { x: 526, y: 336, z: 10 }));
    }

    #[test]
    fn test_tile_url_template() {
        let tile = TileCoord { x: 526, y: 336, z: 10 };
        assert_eq!(
            tile_url("https://tile.example.org/{z}/{x}/{y}.png", tile),
            "https://tile.example.org/10/526/336.png"
        );
    }
}
