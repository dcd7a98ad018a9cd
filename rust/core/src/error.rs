// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use thiserror::Error;

/// Result type for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building the core model
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid CRS definition: {0}")]
    InvalidCrsDefinition(String),

    #[error("Unsupported projection: {0}")]
    UnsupportedProjection(String),
}
