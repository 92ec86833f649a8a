//! Web Mercator tile projection.
//!
//! Converts between slippy-map tile numbers and longitude/latitude, with tile
//! `(0, 0)` at the north-west corner of the world.

use std::f64::consts::PI;

use crate::BoundingBox;

/// Highest zoom level a tile may be requested at.
pub const MAX_ZOOM: u8 = 18;

/// Lowest zoom level.
pub const MIN_ZOOM: u8 = 0;

/// Northern and southern limit of the projection, in degrees.
pub const MAX_LAT: f64 = 85.051_128_78;

/// Number of tiles along one axis at `zoom`.
#[must_use]
pub const fn tiles_per_axis(zoom: u8) -> u32 {
    1u32 << zoom
}

/// Longitude/latitude of a (possibly fractional) tile position.
#[must_use]
pub fn tile_to_lon_lat(zoom: u8, x: f64, y: f64) -> (f64, f64) {
    let n = f64::from(tiles_per_axis(zoom));
    let lon = x / n * 360.0 - 180.0;
    let lat_rad = (PI * (1.0 - 2.0 * y / n)).sinh().atan();
    (lon, lat_rad.to_degrees())
}

/// Tile containing a longitude/latitude position at `zoom`.
///
/// Inputs outside the projection are clamped to the nearest edge tile.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn lon_lat_to_tile(lon: f64, lat: f64, zoom: u8) -> (u32, u32) {
    let n = f64::from(tiles_per_axis(zoom));
    let lat = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    let x = ((lon.clamp(-180.0, 180.0) + 180.0) / 360.0 * n).floor();
    let y = ((1.0 - lat.tan().asinh() / PI) / 2.0 * n).floor();
    let last = n - 1.0;
    (x.clamp(0.0, last) as u32, y.clamp(0.0, last) as u32)
}

/// Geographic bounds of a block of `width` by `height` tiles whose
/// north-west tile is `(x, y)`.
#[must_use]
pub fn block_bounds(zoom: u8, x: u32, y: u32, width: u32, height: u32) -> BoundingBox {
    let (west, north) = tile_to_lon_lat(zoom, f64::from(x), f64::from(y));
    let (east, south) = tile_to_lon_lat(zoom, f64::from(x + width), f64::from(y + height));
    BoundingBox::new(west, south, east, north)
}

/// Geographic bounds of one tile.
#[must_use]
pub fn tile_bounds(zoom: u8, x: u32, y: u32) -> BoundingBox {
    block_bounds(zoom, x, y, 1, 1)
}
