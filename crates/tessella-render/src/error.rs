//! Error types for tile requests.

use std::time::Duration;

use tessella_css::ParseError;
use tessella_geo::IndexError;
use thiserror::Error;

/// A tile identifier or request path that does not name a tile.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    /// Zoom level above [`tessella_geo::MAX_ZOOM`].
    #[error("zoom level {0} is out of range")]
    ZoomOutOfRange(u8),
    /// Tile coordinates outside the grid of their zoom level.
    #[error("tile {x}/{y} does not exist at zoom {zoom}")]
    OutOfRange {
        /// Zoom level.
        zoom: u8,
        /// Column.
        x: u32,
        /// Row.
        y: u32,
    },
    /// A request path that is not `/<style>/<z>/<x>/<y>.<format>`.
    #[error("malformed tile path {0:?}")]
    MalformedPath(String),
    /// An output format other than the supported ones.
    #[error("unknown tile format {0:?}")]
    UnknownFormat(String),
}

/// A render job failed. Every waiter of the job receives a clone.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    /// The drawing backend rejected a tile.
    #[error("drawing backend failed: {0}")]
    Backend(String),
    /// The blocking render worker panicked.
    #[error("render worker panicked: {0}")]
    WorkerPanicked(String),
    /// The job task ended without producing an outcome.
    #[error("render job for {0} was abandoned")]
    Abandoned(String),
    /// The block rendered but did not produce the requested tile.
    #[error("block output is missing tile {0}")]
    MissingTile(String),
}

/// A waiter gave up before its job finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("tile request timed out after {0:?}")]
pub struct TimeoutError(pub Duration);

/// A capacity setting that cannot work.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CapacityError {
    /// A cache that may hold no entries.
    #[error("cache capacity must be at least one entry")]
    ZeroCacheCapacity,
    /// A byte budget of zero.
    #[error("cache byte budget must be positive")]
    ZeroCacheBytes,
    /// No job could ever be admitted.
    #[error("max_running_jobs must be at least 1")]
    ZeroRunningJobs,
    /// Meta-tile edge length outside `1..=max`.
    #[error("meta tile size {size} must be between 1 and {max}")]
    MetaTileSize {
        /// Configured size.
        size: u32,
        /// Largest accepted size.
        max: u32,
    },
    /// Overlap that is negative or not a number.
    #[error("tile overlap {0} must be a finite, non-negative fraction")]
    InvalidOverlap(f64),
    /// A timeout of zero would fail every request.
    #[error("request timeout must be positive")]
    ZeroTimeout,
}

/// Any failure of a tile request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TileError {
    /// The requested tile does not exist.
    #[error(transparent)]
    Lookup(#[from] LookupError),
    /// The job rendering the tile failed.
    #[error(transparent)]
    Render(#[from] RenderError),
    /// The waiter timed out.
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

/// Rejected coordinator configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// A capacity setting is unusable.
    #[error(transparent)]
    Capacity(#[from] CapacityError),
    /// The spatial index parameters are invalid.
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A rejected reload. The previous render context stays in place.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReloadError {
    /// The stylesheet does not compile.
    #[error(transparent)]
    Parse(#[from] ParseError),
    /// The new data could not be indexed.
    #[error(transparent)]
    Index(#[from] IndexError),
}
