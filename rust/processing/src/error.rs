// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for processing operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the processing pipeline.
///
/// Geometry defects never surface here; they are recovered locally and
/// recorded as diagnostics. Only a structurally empty dataset is fatal.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("Core error: {0}")]
    Core(#[from] city_lite_core::Error),

    #[error("Geometry error: {0}")]
    Geometry(#[from] city_lite_geometry::Error),
}
