//! Object store: the owner of all geographic objects.
//!
//! The spatial index and the cascade never hold objects themselves. They keep
//! [`ObjectId`]s and resolve them here.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use tessella_common::{Interner, StringTable};

use crate::object::{
    GeoObject, Location, Node, NodeId, ObjectId, Relation, RelationId, TagMap, Way, WayId,
};
use crate::BoundingBox;

/// Errors raised while building a store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// An object with the same id is already present.
    #[error("duplicate object {0}")]
    Duplicate(ObjectId),
    /// A way or relation refers to a node that was never added.
    #[error("{owner} refers to unknown node {node}")]
    UnknownNode {
        /// The referring object.
        owner: ObjectId,
        /// The missing node.
        node: u64,
    },
    /// A relation refers to a way that was never added.
    #[error("{owner} refers to unknown way {way}")]
    UnknownWay {
        /// The referring relation.
        owner: ObjectId,
        /// The missing way.
        way: u64,
    },
    /// A way without any nodes has no geometry.
    #[error("{0} has no nodes")]
    EmptyWay(ObjectId),
    /// The JSON dump could not be decoded.
    #[error("invalid object dump: {0}")]
    Json(#[from] serde_json::Error),
}

/// The object-store collaborator consumed by the index and the cascade.
pub trait ObjectStore: Send + Sync {
    /// Every object in the store, in a stable order.
    fn objects(&self) -> Box<dyn Iterator<Item = &GeoObject> + '_>;

    /// Resolve a member reference.
    fn resolve(&self, id: ObjectId) -> Option<&GeoObject>;

    /// The interner the object tags were interned with.
    fn interner(&self) -> &dyn Interner;
}

/// In-memory [`ObjectStore`], ordered by id.
pub struct MemoryStore {
    objects: BTreeMap<ObjectId, GeoObject>,
    interner: Arc<dyn Interner>,
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("objects", &self.objects.len())
            .finish_non_exhaustive()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with its own [`StringTable`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_interner(Arc::new(StringTable::new()))
    }

    /// Create an empty store that interns through `interner`.
    #[must_use]
    pub fn with_interner(interner: Arc<dyn Interner>) -> Self {
        Self {
            objects: BTreeMap::new(),
            interner,
        }
    }

    /// Shared handle to the store's interner.
    #[must_use]
    pub fn shared_interner(&self) -> Arc<dyn Interner> {
        Arc::clone(&self.interner)
    }

    /// Number of objects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns true if the store holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn intern_tags<I, K, V>(&self, tags: I) -> TagMap
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        tags.into_iter()
            .map(|(k, v)| (self.interner.intern(k.as_ref()), self.interner.intern(v.as_ref())))
            .collect()
    }

    fn insert(&mut self, object: GeoObject) -> Result<(), StoreError> {
        let id = object.id();
        if self.objects.contains_key(&id) {
            return Err(StoreError::Duplicate(id));
        }
        let _ = self.objects.insert(id, object);
        Ok(())
    }

    fn node_bounds(&self, owner: ObjectId, nodes: &[NodeId]) -> Result<BoundingBox, StoreError> {
        nodes
            .iter()
            .map(|&node| match self.objects.get(&ObjectId::Node(node)) {
                Some(object) => Ok(object.bbox()),
                None => Err(StoreError::UnknownNode { owner, node: node.0 }),
            })
            .collect()
    }

    /// Add a point.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Duplicate`] if the node id is taken.
    pub fn add_node<I, K, V>(&mut self, id: NodeId, location: Location, tags: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let tags = self.intern_tags(tags);
        self.insert(GeoObject::Node(Node { id, location, tags }))
    }

    /// Add a way over already-added nodes.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken, the way is empty, or a node is unknown.
    pub fn add_way<I, K, V>(&mut self, id: WayId, nodes: Vec<NodeId>, tags: I) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let owner = ObjectId::Way(id);
        if nodes.is_empty() {
            return Err(StoreError::EmptyWay(owner));
        }
        let bbox = self.node_bounds(owner, &nodes)?;
        let tags = self.intern_tags(tags);
        self.insert(GeoObject::Way(Way { id, nodes, bbox, tags }))
    }

    /// Add a relation over already-added nodes and ways.
    ///
    /// # Errors
    ///
    /// Returns an error if the id is taken or a member is unknown.
    pub fn add_relation<I, K, V>(
        &mut self,
        id: RelationId,
        nodes: Vec<NodeId>,
        ways: Vec<WayId>,
        tags: I,
    ) -> Result<(), StoreError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let owner = ObjectId::Relation(id);
        let mut bbox = self.node_bounds(owner, &nodes)?;
        for &way in &ways {
            let member = self
                .objects
                .get(&ObjectId::Way(way))
                .ok_or(StoreError::UnknownWay { owner, way: way.0 })?;
            bbox = bbox.union(&member.bbox());
        }
        let tags = self.intern_tags(tags);
        self.insert(GeoObject::Relation(Relation {
            id,
            nodes,
            ways,
            bbox,
            tags,
        }))
    }

    /// Load a JSON object dump, interning through a fresh [`StringTable`].
    ///
    /// The dump has three optional arrays:
    ///
    /// ```json
    /// {
    ///   "nodes": [{"id": 1, "lon": 8.5, "lat": 47.3, "tags": {"amenity": "cafe"}}],
    ///   "ways": [{"id": 10, "nodes": [1, 2], "tags": {"highway": "primary"}}],
    ///   "relations": [{"id": 100, "nodes": [], "ways": [10], "tags": {}}]
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Json`] for malformed input and the `add_*` errors
    /// for inconsistent references.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let dump: Dump = serde_json::from_str(json)?;
        let mut store = Self::new();
        for node in dump.nodes {
            let location = Location {
                lon: node.lon,
                lat: node.lat,
            };
            store.add_node(NodeId(node.id), location, node.tags)?;
        }
        for way in dump.ways {
            let nodes = way.nodes.into_iter().map(NodeId).collect();
            store.add_way(WayId(way.id), nodes, way.tags)?;
        }
        for relation in dump.relations {
            let nodes = relation.nodes.into_iter().map(NodeId).collect();
            let ways = relation.ways.into_iter().map(WayId).collect();
            store.add_relation(RelationId(relation.id), nodes, ways, relation.tags)?;
        }
        tracing::debug!(objects = store.len(), "loaded object dump");
        Ok(store)
    }
}

impl ObjectStore for MemoryStore {
    fn objects(&self) -> Box<dyn Iterator<Item = &GeoObject> + '_> {
        Box::new(self.objects.values())
    }

    fn resolve(&self, id: ObjectId) -> Option<&GeoObject> {
        self.objects.get(&id)
    }

    fn interner(&self) -> &dyn Interner {
        self.interner.as_ref()
    }
}

#[derive(Deserialize)]
struct Dump {
    #[serde(default)]
    nodes: Vec<DumpNode>,
    #[serde(default)]
    ways: Vec<DumpWay>,
    #[serde(default)]
    relations: Vec<DumpRelation>,
}

#[derive(Deserialize)]
struct DumpNode {
    id: u64,
    lon: f64,
    lat: f64,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct DumpWay {
    id: u64,
    nodes: Vec<u64>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct DumpRelation {
    id: u64,
    #[serde(default)]
    nodes: Vec<u64>,
    #[serde(default)]
    ways: Vec<u64>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}
