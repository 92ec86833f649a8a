//! Geographic data model and spatial index for the Tessella tile renderer.
//!
//! # Scope
//!
//! This crate provides:
//! - **Objects** - nodes, ways and relations with interned tags, referring to
//!   their members by typed identifier
//! - **Object Store** - the [`ObjectStore`] collaborator interface and an
//!   in-memory implementation loadable from a JSON dump
//! - **Spatial Index** - an R-tree answering bounding-box range queries
//! - **Projection** - Web Mercator tile bounds

/// Axis-aligned bounding boxes.
pub mod bbox;
/// Nodes, ways, relations and their identifiers.
pub mod object;
/// Slippy-map tile projection.
pub mod projection;
/// R-tree spatial index.
pub mod rtree;
/// Object store interface and in-memory store.
pub mod store;

pub use bbox::BoundingBox;
pub use object::{
    GeoObject, Location, Node, NodeId, ObjectId, ParseObjectIdError, Relation, RelationId, TagMap,
    Way, WayId,
};
pub use projection::{MAX_ZOOM, MIN_ZOOM, block_bounds, tile_bounds};
pub use rtree::{IndexError, IndexParams, RTree, SpatialIndex};
pub use store::{MemoryStore, ObjectStore, StoreError};
