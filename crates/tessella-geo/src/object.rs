//! Geographic objects: nodes, ways and relations.
//!
//! Composite objects refer to their members by identifier only. Member
//! objects are resolved through an [`ObjectStore`](crate::ObjectStore), so a
//! reloaded dataset never leaves dangling references behind.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessella_common::{Interner, Symbol};

use crate::BoundingBox;

/// Tag keys and values, both interned.
pub type TagMap = HashMap<Symbol, Symbol>;

/// Identifier of a [`Node`], unique among nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Identifier of a [`Way`], unique among ways.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct WayId(pub u64);

/// Identifier of a [`Relation`], unique among relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationId(pub u64);

/// Identifier of any geographic object.
///
/// Each variant is its own namespace: `node/1` and `way/1` are different objects.
/// Ordering puts all nodes first, then ways, then relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectId {
    /// A point.
    Node(NodeId),
    /// A polyline or polygon.
    Way(WayId),
    /// A group of nodes and ways.
    Relation(RelationId),
}

impl ObjectId {
    /// Short type name, as used in the `kind/number` notation.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Node(_) => "node",
            Self::Way(_) => "way",
            Self::Relation(_) => "relation",
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let number = match self {
            Self::Node(NodeId(n)) | Self::Way(WayId(n)) | Self::Relation(RelationId(n)) => n,
        };
        write!(f, "{}/{number}", self.kind())
    }
}

/// Error returned when parsing an [`ObjectId`] from `kind/number` text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid object id '{0}', expected node/N, way/N or relation/N")]
pub struct ParseObjectIdError(pub String);

impl FromStr for ObjectId {
    type Err = ParseObjectIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseObjectIdError(s.to_string());
        let (kind, number) = s.split_once('/').ok_or_else(err)?;
        let number: u64 = number.parse().map_err(|_| err())?;
        match kind {
            "node" | "n" => Ok(Self::Node(NodeId(number))),
            "way" | "w" => Ok(Self::Way(WayId(number))),
            "relation" | "r" => Ok(Self::Relation(RelationId(number))),
            _ => Err(err()),
        }
    }
}

/// A single position in longitude/latitude.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    /// Longitude in degrees.
    pub lon: f64,
    /// Latitude in degrees.
    pub lat: f64,
}

/// A tagged point.
#[derive(Debug, Clone)]
pub struct Node {
    /// Identifier within the node namespace.
    pub id: NodeId,
    /// Position of the point.
    pub location: Location,
    /// Interned tags.
    pub tags: TagMap,
}

/// An ordered list of nodes forming a line, or an area when closed.
#[derive(Debug, Clone)]
pub struct Way {
    /// Identifier within the way namespace.
    pub id: WayId,
    /// Member nodes in drawing order.
    pub nodes: Vec<NodeId>,
    /// Bounds of the member nodes.
    pub bbox: BoundingBox,
    /// Interned tags.
    pub tags: TagMap,
}

impl Way {
    /// A way is closed when it forms a ring: its first and last node are the same.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.nodes.len() > 2 && self.nodes.first() == self.nodes.last()
    }

    /// A closed way is an area when its `area` tag is absent or `yes`.
    #[must_use]
    pub fn is_area(&self, interner: &dyn Interner) -> bool {
        self.is_closed() && self.area_tag(interner).is_none_or(|v| &*v == "yes")
    }

    /// Open ways, and closed ways tagged `area=no`, are lines.
    ///
    /// A closed way with any other `area` value is neither a line nor an area.
    #[must_use]
    pub fn is_line(&self, interner: &dyn Interner) -> bool {
        !self.is_closed() || self.area_tag(interner).is_some_and(|v| &*v == "no")
    }

    fn area_tag(&self, interner: &dyn Interner) -> Option<Arc<str>> {
        let key = interner.get("area")?;
        interner.lookup(*self.tags.get(&key)?)
    }
}

/// A group of member nodes and ways sharing tags.
#[derive(Debug, Clone)]
pub struct Relation {
    /// Identifier within the relation namespace.
    pub id: RelationId,
    /// Member nodes.
    pub nodes: Vec<NodeId>,
    /// Member ways.
    pub ways: Vec<WayId>,
    /// Bounds of all members.
    pub bbox: BoundingBox,
    /// Interned tags.
    pub tags: TagMap,
}

/// Any geographic object held by the store.
#[derive(Debug, Clone)]
pub enum GeoObject {
    /// A point.
    Node(Node),
    /// A line or area.
    Way(Way),
    /// A group of members.
    Relation(Relation),
}

impl GeoObject {
    /// Typed identifier of the object.
    #[must_use]
    pub const fn id(&self) -> ObjectId {
        match self {
            Self::Node(n) => ObjectId::Node(n.id),
            Self::Way(w) => ObjectId::Way(w.id),
            Self::Relation(r) => ObjectId::Relation(r.id),
        }
    }

    /// Interned tags of the object.
    #[must_use]
    pub const fn tags(&self) -> &TagMap {
        match self {
            Self::Node(n) => &n.tags,
            Self::Way(w) => &w.tags,
            Self::Relation(r) => &r.tags,
        }
    }

    /// Bounding geometry of the object.
    #[must_use]
    pub const fn bbox(&self) -> BoundingBox {
        match self {
            Self::Node(n) => BoundingBox::point(n.location.lon, n.location.lat),
            Self::Way(w) => w.bbox,
            Self::Relation(r) => r.bbox,
        }
    }

    /// Look up a tag by key text, returning the value text.
    #[must_use]
    pub fn tag(&self, interner: &dyn Interner, key: &str) -> Option<Arc<str>> {
        let key = interner.get(key)?;
        self.tags().get(&key).and_then(|value| interner.lookup(*value))
    }

    /// Returns the way if this object is one.
    #[must_use]
    pub const fn as_way(&self) -> Option<&Way> {
        match self {
            Self::Way(w) => Some(w),
            _ => None,
        }
    }

    /// Ids of the nodes this object is built from (empty for a node).
    #[must_use]
    pub fn child_nodes(&self) -> &[NodeId] {
        match self {
            Self::Node(_) => &[],
            Self::Way(w) => &w.nodes,
            Self::Relation(r) => &r.nodes,
        }
    }

    /// Ids of the ways this object is built from (only relations have any).
    #[must_use]
    pub fn child_ways(&self) -> &[WayId] {
        match self {
            Self::Relation(r) => &r.ways,
            _ => &[],
        }
    }
}
