//! The drawing backend seam.
//!
//! The coordinator decides what to draw; a [`DrawingBackend`] turns one
//! tile's styled draw list into output bytes. [`SceneBackend`] is a
//! deterministic JSON rendition used by the CLI and by tests.

use serde::Serialize;
use tessella_css::{ResolvedAttributes, StyledObject};
use tessella_geo::{BoundingBox, ObjectStore};

use crate::error::RenderError;
use crate::tile::TileId;

/// Everything a backend needs to draw one tile.
#[derive(Clone, Copy)]
pub struct DrawRequest<'a> {
    /// The tile being drawn.
    pub tile: TileId,
    /// Geographic bounds of the tile.
    pub bounds: BoundingBox,
    /// Attributes of the `canvas` block (background and the like).
    pub canvas: &'a ResolvedAttributes,
    /// Styled objects touching the tile, in drawing order.
    pub objects: &'a [StyledObject],
    /// Store for resolving member geometry.
    pub store: &'a dyn ObjectStore,
}

impl std::fmt::Debug for DrawRequest<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DrawRequest")
            .field("tile", &self.tile)
            .field("bounds", &self.bounds)
            .field("objects", &self.objects.len())
            .finish_non_exhaustive()
    }
}

/// Produces the bytes of one tile.
///
/// Called from blocking worker threads, possibly for several tiles at once.
pub trait DrawingBackend: Send + Sync {
    /// Draw `request.tile`.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::Backend`] if the tile cannot be drawn. The
    /// failure is reported to every waiter of the job.
    fn draw(&self, request: &DrawRequest<'_>) -> Result<Vec<u8>, RenderError>;
}

/// Writes the draw list of a tile as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct SceneBackend {
    /// Indent the output.
    pub pretty: bool,
}

#[derive(Serialize)]
struct Scene<'a> {
    tile: String,
    bounds: [f64; 4],
    canvas: &'a ResolvedAttributes,
    objects: Vec<SceneObject<'a>>,
}

#[derive(Serialize)]
struct SceneObject<'a> {
    id: String,
    kind: &'static str,
    attributes: &'a ResolvedAttributes,
}

impl DrawingBackend for SceneBackend {
    fn draw(&self, request: &DrawRequest<'_>) -> Result<Vec<u8>, RenderError> {
        let bounds = request.bounds;
        let scene = Scene {
            tile: request.tile.to_string(),
            bounds: [bounds.min_x, bounds.min_y, bounds.max_x, bounds.max_y],
            canvas: request.canvas,
            objects: request
                .objects
                .iter()
                .map(|object| SceneObject {
                    id: object.id.to_string(),
                    kind: object.id.kind(),
                    attributes: &object.attributes,
                })
                .collect(),
        };
        let encoded = if self.pretty {
            serde_json::to_vec_pretty(&scene)
        } else {
            serde_json::to_vec(&scene)
        };
        encoded.map_err(|err| RenderError::Backend(err.to_string()))
    }
}
