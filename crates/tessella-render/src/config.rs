//! Coordinator configuration.
//!
//! All settings have working defaults; a JSON file only needs the fields it
//! changes.

use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tessella_geo::IndexParams;

use crate::error::{CapacityError, ConfigError};

/// Largest accepted meta-tile edge length.
pub const MAX_META_TILE_SIZE: u32 = 64;

/// Tile cache limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of cached tiles.
    pub max_entries: usize,
    /// Optional budget for the summed tile size in bytes.
    pub max_bytes: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 1024,
            max_bytes: None,
        }
    }
}

impl CacheConfig {
    /// Check the limits.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] if either limit is zero.
    pub const fn validate(&self) -> Result<(), CapacityError> {
        if self.max_entries == 0 {
            return Err(CapacityError::ZeroCacheCapacity);
        }
        if matches!(self.max_bytes, Some(0)) {
            return Err(CapacityError::ZeroCacheBytes);
        }
        Ok(())
    }
}

/// Settings of a [`Coordinator`](crate::Coordinator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Edge length of a meta tile in tiles.
    pub meta_tile_size: u32,
    /// Number of jobs rendering at the same time; further jobs queue.
    pub max_running_jobs: usize,
    /// Tile cache limits.
    pub cache: CacheConfig,
    /// Default time a request waits for its job, in milliseconds.
    pub request_timeout_ms: u64,
    /// Fraction of the block size by which the data query is enlarged, so
    /// that objects just outside a block still reach its edge tiles.
    pub tile_overlap: f64,
    /// Zoom level the CLI prerenders up to; zero disables prerendering.
    pub prerender_level: u8,
    /// Spatial index fanout.
    pub index: IndexParams,
    /// Reject unknown attribute names when compiling stylesheets.
    pub strict_attributes: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            meta_tile_size: 4,
            max_running_jobs: thread::available_parallelism().map_or(1, usize::from),
            cache: CacheConfig::default(),
            request_timeout_ms: 30_000,
            tile_overlap: 0.0625,
            prerender_level: 0,
            index: IndexParams::default(),
            strict_attributes: true,
        }
    }
}

impl CoordinatorConfig {
    /// Check every setting.
    ///
    /// # Errors
    ///
    /// Returns the first unusable setting found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.meta_tile_size == 0 || self.meta_tile_size > MAX_META_TILE_SIZE {
            return Err(CapacityError::MetaTileSize {
                size: self.meta_tile_size,
                max: MAX_META_TILE_SIZE,
            }
            .into());
        }
        if self.max_running_jobs == 0 {
            return Err(CapacityError::ZeroRunningJobs.into());
        }
        if self.request_timeout_ms == 0 {
            return Err(CapacityError::ZeroTimeout.into());
        }
        if !self.tile_overlap.is_finite() || self.tile_overlap < 0.0 {
            return Err(CapacityError::InvalidOverlap(self.tile_overlap).into());
        }
        self.cache.validate()?;
        self.index.validate()?;
        Ok(())
    }

    /// [`CoordinatorConfig::request_timeout_ms`] as a duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
