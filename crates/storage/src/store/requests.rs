#![forbid(unsafe_code)]

use canopy_core::city::City;
use std::path::PathBuf;

/// Rows buffered per write. Chunks commit independently in incremental mode
/// and accumulate inside the single replace transaction in refresh mode.
pub const DEFAULT_BATCH_SIZE: usize = 2000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ImportRequest {
    pub city: City,
    pub file_path: PathBuf,
    /// Atomic replace: delete every row for the source, then insert the new
    /// rows, all in one transaction.
    pub refresh: bool,
    /// Apply the city's configured species enrichments after loading.
    pub enrich: bool,
    pub batch_size: usize,
}

impl ImportRequest {
    pub fn new(city: City, file_path: impl Into<PathBuf>) -> Self {
        Self {
            city,
            file_path: file_path.into(),
            refresh: false,
            enrich: false,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct NearestRequest {
    pub lat: f64,
    pub lng: f64,
    /// Defaults to `DEFAULT_LIMIT`, clamped to `[1, MAX_LIMIT]`.
    pub limit: Option<usize>,
    /// Radius pre-filter in metres, clamped to `[MIN_RADIUS_M, MAX_RADIUS_M]`.
    pub max_distance_m: Option<f64>,
}

impl NearestRequest {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            limit: None,
            max_distance_m: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListRunsRequest {
    pub city: Option<City>,
    pub limit: usize,
}
