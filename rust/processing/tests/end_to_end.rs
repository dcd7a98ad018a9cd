// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! End-to-end pipeline scenarios: dataset in, picked and aligned scene out.

use city_lite_core::GeoExtentOptions;
use city_lite_geometry::{DiagnosticKind, Point3, Vector3};
use city_lite_processing::{
    align_layers, AlignmentOptions, LoadOptions, Ray, Session,
};
use serde_json::json;

fn rd_block() -> serde_json::Value {
    // Two buildings in Rotterdam, RD New (compound EPSG:7415), with a
    // degenerate ring in the second one
    json!({
        "type": "CityJSON",
        "version": "1.1",
        "metadata": {
            "referenceSystem": "urn:ogc:def:crs:EPSG::7415"
        },
        "transform": {
            "scale": [0.001, 0.001, 0.001],
            "translate": [92000.0, 437000.0, 0.0]
        },
        "vertices": [
            [0, 0, 0], [10000, 0, 0], [10000, 10000, 0], [0, 10000, 0],
            [0, 0, 9000], [10000, 0, 9000], [10000, 10000, 9000], [0, 10000, 9000],
            [20000, 0, 0], [30000, 0, 0], [30000, 10000, 0], [20000, 10000, 0],
            [5000, 5000, 4000]
        ],
        "CityObjects": {
            "tower": {
                "type": "Building",
                "geometry": [{
                    "type": "Solid",
                    "lod": "2",
                    "boundaries": [[
                        [[3, 2, 1, 0]],
                        [[4, 5, 6, 7]],
                        [[0, 1, 5, 4]],
                        [[1, 2, 6, 5]],
                        [[2, 3, 7, 6]],
                        [[3, 0, 4, 7]]
                    ]],
                    "semantics": {
                        "surfaces": [
                            {"type": "GroundSurface"},
                            {"type": "RoofSurface"},
                            {"type": "WallSurface"}
                        ],
                        "values": [[0, 1, 2, 2, 2, 2]]
                    }
                }]
            },
            "annex": {
                "type": "Building",
                "geometry": [{
                    "type": "MultiSurface",
                    "boundaries": [
                        [[12, 12, 12, 12]],
                        [[8, 9, 10, 11]]
                    ]
                }]
            }
        }
    })
}

#[test]
fn full_load_produces_groups_diagnostics_and_index() {
    let mut session = Session::new();
    let loaded = session
        .load_json(&rd_block(), &LoadOptions::default())
        .unwrap();

    // Tower: ground/roof/wall groups; annex: one group from the valid ring
    assert_eq!(loaded.index.groups_for("tower").len(), 3);
    assert_eq!(loaded.index.groups_for("annex").len(), 1);

    let annex_groups: Vec<_> = loaded.groups_for("annex").collect();
    assert_eq!(annex_groups[0].mesh.triangle_count(), 2);

    // Exactly one diagnostic, recorded against the annex's degenerate ring
    assert_eq!(loaded.diagnostics.len(), 1);
    assert_eq!(loaded.diagnostics[0].entity_id, "annex");
    assert_eq!(
        loaded.diagnostics[0].diagnostics[0].kind,
        DiagnosticKind::DegenerateRing
    );

    // RD coordinates are large; positions must be relative to center
    assert!(!loaded.shift.is_zero());
}

#[test]
fn pick_resolves_entity_through_shifted_frame() {
    let mut session = Session::new();
    session
        .load_json(&rd_block(), &LoadOptions::default())
        .unwrap();
    let loaded = session.loaded().unwrap();

    // Aim straight down at the tower's roof center, in the shifted frame
    let world = Point3::new(92_005.0, 437_005.0, 100.0);
    let origin = Point3::new(
        world.x - loaded.shift.x,
        world.y - loaded.shift.y,
        world.z - loaded.shift.z,
    );
    let ray = Ray::new(origin, Vector3::new(0.0, 0.0, -1.0));

    assert_eq!(session.pick(&ray), Some("tower"));

    let changes = session.set_selected(Some("tower"));
    assert_eq!(changes.len(), 1);
    assert_eq!(session.selection().selected(), Some("tower"));
}

#[test]
fn compound_crs_resolves_and_aligns() {
    let mut session = Session::new();
    session
        .load_json(&rd_block(), &LoadOptions::default())
        .unwrap();

    let extent = session
        .geo_extent(&GeoExtentOptions::default())
        .expect("EPSG:7415 must resolve through its 28992 base");

    // The horizontal base, never the compound code itself
    assert_eq!(extent.epsg, 28992);
    assert!(extent.crs_explicit);
    // Rotterdam
    assert!((extent.center_lon - 4.5).abs() < 0.3);
    assert!((extent.center_lat - 51.9).abs() < 0.3);

    // A parcels layer with no CRS still renders at the default placement
    let alignment = align_layers(&extent, &[None], &AlignmentOptions::default());
    assert!(alignment.primary.aligned);
    assert!(!alignment.layers[0].aligned);
    assert!(alignment.scene_per_meter > 0.0);
}

#[test]
fn accumulation_composes_unit_from_entities() {
    let mut session = Session::new();
    session
        .load_json(&rd_block(), &LoadOptions::default())
        .unwrap();

    session.begin_accumulation();
    session.toggle_accumulated("tower");
    session.toggle_accumulated("annex");
    let (members, restores) = session.commit_accumulation();

    assert_eq!(members, vec!["tower".to_string(), "annex".to_string()]);
    assert_eq!(restores.len(), 2);
    assert!(!session.selection().is_accumulating());
}

#[test]
fn reload_supersedes_in_flight_dataset() {
    let mut session = Session::new();
    session
        .load_json(&rd_block(), &LoadOptions::default())
        .unwrap();

    let stale_crs = session.crs_request(2056);
    let stale_tile = session.tile_request(city_lite_processing::TileCoord { x: 1, y: 1, z: 4 });

    session
        .load_json(&rd_block(), &LoadOptions::default())
        .unwrap();

    assert!(!session.apply_crs_definition(
        stale_crs.generation,
        stale_crs.epsg,
        "+proj=tmerc +lat_0=0 +lon_0=9 +k=1 +x_0=0 +y_0=0 +ellps=GRS80",
    ));
    assert!(!session.accept_tile(&stale_tile));
}
