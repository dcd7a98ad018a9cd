// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dataset session
//!
//! Owns the currently loaded dataset, its CRS registry, cached geo extent
//! and selection state. A reload constructs a new `LoadedModel` and drops
//! the old one, so mesh buffers and the entity index can never outlive the
//! dataset they belong to. Completions of asynchronous fetches enter through
//! generation-tagged methods that drop stale results.

use crate::error::Result;
use crate::fetch::{CrsRequest, TileCoord, TileRequest};
use crate::picking::{pick, Ray, SelectionChange, SelectionState};
use crate::pipeline::{load_dataset, LoadOptions, LoadedModel};
use city_lite_core::{
    compute_geo_extent, parse_city_model, CityModel, CrsRegistry, GeoExtent, GeoExtentOptions,
};
use tracing::{info, warn};

/// One viewer session: at most one live dataset at a time
#[derive(Default)]
pub struct Session {
    registry: CrsRegistry,
    generation: u64,
    loaded: Option<LoadedModel>,
    selection: SelectionState,
    /// Extent derived once per dataset; inner `None` records a failed
    /// derivation so it is not retried on every query
    extent_cache: Option<Option<GeoExtent>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Session with a dynamic CRS definition source already attached
    pub fn with_registry(registry: CrsRegistry) -> Self {
        Self {
            registry,
            ..Default::default()
        }
    }

    /// Identity of the live dataset; requests tagged with an older value
    /// are stale
    #[inline]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    #[inline]
    pub fn loaded(&self) -> Option<&LoadedModel> {
        self.loaded.as_ref()
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut CrsRegistry {
        &mut self.registry
    }

    #[inline]
    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    /// Full synchronous rebuild. Supersedes any in-flight load: pending
    /// fetches of the previous dataset will be dropped by their generation
    /// tag.
    pub fn load_dataset(
        &mut self,
        model: CityModel,
        options: &LoadOptions,
    ) -> Result<&LoadedModel> {
        self.generation += 1;
        self.selection.reset();
        self.extent_cache = None;

        info!(generation = self.generation, "loading dataset");
        let loaded = load_dataset(model, options, self.generation)?;

        // Construct new, drop old: the previous model's buffers and index
        // are released here
        Ok(self.loaded.insert(loaded))
    }

    /// Parse and load a CityJSON-shaped document
    pub fn load_json(
        &mut self,
        document: &serde_json::Value,
        options: &LoadOptions,
    ) -> Result<&LoadedModel> {
        let model = parse_city_model(document)?;
        self.load_dataset(model, options)
    }

    /// Drop the live dataset and all state derived from it
    pub fn unload(&mut self) {
        self.generation += 1;
        self.loaded = None;
        self.selection.reset();
        self.extent_cache = None;
    }

    /// The live dataset's WGS84 footprint, derived once and cached.
    /// `None` when no dataset is loaded or its CRS is missing/implausible;
    /// geo-alignment is disabled in that case.
    pub fn geo_extent(&mut self, options: &GeoExtentOptions) -> Option<GeoExtent> {
        if self.extent_cache.is_none() {
            let extent = self
                .loaded
                .as_ref()
                .and_then(|loaded| compute_geo_extent(&loaded.model, &mut self.registry, options));
            self.extent_cache = Some(extent);
        }
        self.extent_cache.clone().flatten()
    }

    // ---------- picking / selection ----------

    /// Resolve a ray to the nearest entity id
    pub fn pick(&self, ray: &Ray) -> Option<&str> {
        pick(self.loaded.as_ref()?, ray).map(|(id, _)| id)
    }

    pub fn set_hovered(&mut self, entity_id: Option<&str>) -> Vec<SelectionChange> {
        self.selection.set_hovered(entity_id)
    }

    pub fn set_selected(&mut self, entity_id: Option<&str>) -> Vec<SelectionChange> {
        self.selection.set_selected(entity_id)
    }

    pub fn begin_accumulation(&mut self) {
        self.selection.begin_accumulation();
    }

    pub fn toggle_accumulated(&mut self, entity_id: &str) -> Vec<SelectionChange> {
        self.selection.toggle_accumulated(entity_id)
    }

    pub fn commit_accumulation(&mut self) -> (Vec<String>, Vec<SelectionChange>) {
        self.selection.commit_accumulation()
    }

    pub fn cancel_accumulation(&mut self) -> Vec<SelectionChange> {
        self.selection.cancel_accumulation()
    }

    // ---------- generation-tagged fetch completions ----------

    /// Create a CRS definition request tagged with the live generation
    pub fn crs_request(&self, epsg: u32) -> CrsRequest {
        CrsRequest {
            generation: self.generation,
            epsg,
        }
    }

    /// Create a tile request tagged with the live generation
    pub fn tile_request(&self, tile: TileCoord) -> TileRequest {
        TileRequest {
            generation: self.generation,
            tile,
        }
    }

    /// Apply a completed CRS definition fetch. Returns false (and changes
    /// nothing) when the request is stale or the definition does not parse.
    pub fn apply_crs_definition(&mut self, generation: u64, epsg: u32, definition: &str) -> bool {
        if generation != self.generation {
            warn!(
                generation,
                current = self.generation,
                epsg,
                "dropping stale CRS definition"
            );
            return false;
        }
        match self.registry.insert_definition(epsg, definition) {
            Ok(()) => {
                // A newly known CRS can turn a failed extent derivation
                // into a successful one
                self.extent_cache = None;
                true
            }
            Err(error) => {
                warn!(epsg, %error, "rejected CRS definition");
                false
            }
        }
    }

    /// Whether a completed tile fetch still belongs to the live dataset.
    /// Stale tiles are simply omitted.
    pub fn accept_tile(&self, request: &TileRequest) -> bool {
        if request.generation != self.generation {
            warn!(
                generation = request.generation,
                current = self.generation,
                "dropping stale tile"
            );
            return false;
        }
        true
    }
}
