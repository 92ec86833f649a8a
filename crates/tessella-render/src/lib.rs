//! Render-job coordination and tile cache for the Tessella tile renderer.
//!
//! # Scope
//!
//! This crate implements:
//! - **Tile addressing** ([slippy map tilenames](https://wiki.openstreetmap.org/wiki/Slippy_map_tilenames))
//!   - `z/x/y.format` identifiers and `/<style>/z/x/y.format` request paths
//!   - Meta tiles: square blocks of tiles rendered by one job
//! - **Coordinator**
//!   - One job per meta tile, shared by every concurrent request
//!   - Bounded admission; excess jobs queue
//!   - Per-request timeouts that never cancel the job
//!   - Atomic stylesheet and data reloads
//!   - Prerendering down the zoom levels
//! - **Tile cache**: LRU with generation tags
//! - **Drawing backend** seam, with a JSON scene backend
//!
//! # Not Implemented
//!
//! - Raster or SVG drawing (backends plug in through [`DrawingBackend`])
//! - An HTTP front end
//! - Persistent caching

/// Drawing backends.
pub mod backend;
/// Tile cache.
pub mod cache;
/// Coordinator configuration.
pub mod config;
/// Render-job coordinator.
pub mod coordinator;
/// Error types.
pub mod error;
/// Render jobs and their registry.
pub mod job;
/// Coordinator counters.
pub mod stats;
/// Tile and meta-tile identifiers.
pub mod tile;

// Re-exports for convenience
pub use backend::{DrawRequest, DrawingBackend, SceneBackend};
pub use cache::{CacheLookup, TileCache};
pub use config::{CacheConfig, CoordinatorConfig};
pub use coordinator::{Coordinator, RenderContext};
pub use error::{
    CapacityError, ConfigError, LookupError, ReloadError, RenderError, TileError, TimeoutError,
};
pub use job::{JobStatus, RenderedBlock};
pub use stats::StatsSnapshot;
pub use tile::{MetaId, TileFormat, TileId, parse_path};
