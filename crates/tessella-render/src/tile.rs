//! Tile and meta-tile identifiers.
//!
//! Tiles are addressed the slippy-map way, `zoom/x/y` with `(0, 0)` at the
//! north-west corner. Tiles are rendered in square blocks (meta tiles) so
//! that the cascade runs once for a whole neighbourhood.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tessella_geo::projection::tiles_per_axis;
use tessella_geo::{BoundingBox, MAX_ZOOM, block_bounds, tile_bounds};

use crate::error::LookupError;

/// Output format requested for a tile.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TileFormat {
    /// Raster output.
    Png,
    /// Vector output.
    Svg,
}

/// One tile at one zoom level in one output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileId {
    /// Zoom level, `0..=18`.
    pub zoom: u8,
    /// Column, counted eastwards.
    pub x: u32,
    /// Row, counted southwards.
    pub y: u32,
    /// Output format.
    pub format: TileFormat,
}

impl TileId {
    /// Create an identifier without checking it; see [`TileId::validate`].
    #[must_use]
    pub const fn new(zoom: u8, x: u32, y: u32, format: TileFormat) -> Self {
        Self { zoom, x, y, format }
    }

    /// Check that the tile exists.
    ///
    /// # Errors
    ///
    /// [`LookupError::ZoomOutOfRange`] above zoom 18 and
    /// [`LookupError::OutOfRange`] for coordinates outside the grid.
    pub const fn validate(&self) -> Result<(), LookupError> {
        if self.zoom > MAX_ZOOM {
            return Err(LookupError::ZoomOutOfRange(self.zoom));
        }
        let n = tiles_per_axis(self.zoom);
        if self.x >= n || self.y >= n {
            return Err(LookupError::OutOfRange {
                zoom: self.zoom,
                x: self.x,
                y: self.y,
            });
        }
        Ok(())
    }

    /// Geographic bounds of the tile.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        tile_bounds(self.zoom, self.x, self.y)
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}.{}", self.zoom, self.x, self.y, self.format)
    }
}

impl FromStr for TileId {
    type Err = LookupError;

    /// Parse `z/x/y.format` and validate the result.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || LookupError::MalformedPath(s.to_string());
        let mut parts = s.split('/');
        let (Some(zoom), Some(x), Some(last), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(malformed());
        };
        let (y, format) = last.split_once('.').ok_or_else(malformed)?;
        let format = TileFormat::from_str(format)
            .map_err(|_| LookupError::UnknownFormat(format.to_string()))?;
        let tile = Self {
            zoom: zoom.parse().map_err(|_| malformed())?,
            x: x.parse().map_err(|_| malformed())?,
            y: y.parse().map_err(|_| malformed())?,
            format,
        };
        tile.validate()?;
        Ok(tile)
    }
}

/// Split a request path of the form `/<stylesheet>/<z>/<x>/<y>.<png|svg>`.
///
/// # Errors
///
/// Returns a [`LookupError`] for a path of another shape, an unknown format
/// or a tile outside the grid.
pub fn parse_path(path: &str) -> Result<(String, TileId), LookupError> {
    let malformed = || LookupError::MalformedPath(path.to_string());
    let rest = path.strip_prefix('/').ok_or_else(malformed)?;
    let (stylesheet, tile) = rest.split_once('/').ok_or_else(malformed)?;
    if stylesheet.is_empty() {
        return Err(malformed());
    }
    let tile = tile.parse::<TileId>().map_err(|err| match err {
        LookupError::MalformedPath(_) => malformed(),
        other => other,
    })?;
    Ok((stylesheet.to_string(), tile))
}

/// A square block of tiles rendered by a single job.
///
/// `(x, y)` is the north-west member. Blocks at the east and south edge of a
/// low zoom level are clipped to the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetaId {
    /// Zoom level of every member.
    pub zoom: u8,
    /// Column of the north-west member.
    pub x: u32,
    /// Row of the north-west member.
    pub y: u32,
    /// Members per row.
    pub width: u32,
    /// Members per column.
    pub height: u32,
    /// Output format of every member.
    pub format: TileFormat,
}

impl MetaId {
    /// The block of edge length `block` that contains `tile`.
    ///
    /// `block` must be at least one.
    #[must_use]
    pub fn for_tile(tile: &TileId, block: u32) -> Self {
        let block = block.max(1);
        let n = tiles_per_axis(tile.zoom);
        let x = tile.x / block * block;
        let y = tile.y / block * block;
        Self {
            zoom: tile.zoom,
            x,
            y,
            width: block.min(n.saturating_sub(x)),
            height: block.min(n.saturating_sub(y)),
            format: tile.format,
        }
    }

    /// Member tiles, column by column (x outer, y inner).
    #[must_use]
    pub fn members(&self) -> Vec<TileId> {
        (self.x..self.x + self.width)
            .flat_map(|x| {
                (self.y..self.y + self.height).map(move |y| TileId::new(self.zoom, x, y, self.format))
            })
            .collect()
    }

    /// Returns true if `tile` is one of the members.
    #[must_use]
    pub fn contains(&self, tile: &TileId) -> bool {
        tile.zoom == self.zoom
            && tile.format == self.format
            && tile.x >= self.x
            && tile.x < self.x + self.width
            && tile.y >= self.y
            && tile.y < self.y + self.height
    }

    /// Geographic bounds of the whole block.
    #[must_use]
    pub fn bounds(&self) -> BoundingBox {
        block_bounds(self.zoom, self.x, self.y, self.width, self.height)
    }

    /// Blocks of the next zoom level covering the same area.
    ///
    /// Empty at the highest zoom level.
    #[must_use]
    pub fn sub_identifiers(&self, block: u32) -> Vec<Self> {
        if self.zoom >= MAX_ZOOM {
            return Vec::new();
        }
        let block = block.max(1);
        let step = usize::try_from(block).unwrap_or(usize::MAX);
        let zoom = self.zoom + 1;
        let (x0, x1) = (self.x * 2, (self.x + self.width) * 2);
        let (y0, y1) = (self.y * 2, (self.y + self.height) * 2);
        (x0..x1)
            .step_by(step)
            .flat_map(|x| {
                (y0..y1)
                    .step_by(step)
                    .map(move |y| Self::for_tile(&TileId::new(zoom, x, y, self.format), block))
            })
            .collect()
    }
}

impl fmt::Display for MetaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}+{}x{}.{}",
            self.zoom, self.x, self.y, self.width, self.height, self.format
        )
    }
}
