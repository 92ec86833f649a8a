//! R-tree spatial index.
//!
//! Answers "which objects intersect this box" by descending only into
//! subtrees whose bounding box intersects the query. Nodes live in an arena
//! and refer to each other by index, the same way the object store refers to
//! objects by id.
//!
//! # Structure
//!
//! - Leaves hold up to `leaf_capacity` `(key, box)` entries.
//! - Internal nodes hold between `min_children` and `max_children` child
//!   nodes (the root may hold fewer).
//! - Every node's box is the union of its children's boxes.
//!
//! Insertion follows the child needing the least enlargement and splits
//! overfull nodes so that the two halves cover as little area as possible.
//! Removal shrinks ancestor boxes and prunes empty nodes; underfull nodes
//! are not merged.

use std::collections::HashMap;
use std::hash::Hash;

use serde::{Deserialize, Serialize};

use crate::{BoundingBox, ObjectId, ObjectStore};

/// Fanout limits of an [`RTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexParams {
    /// Minimum children per internal node after a split.
    pub min_children: usize,
    /// Maximum children per internal node before it splits.
    pub max_children: usize,
    /// Maximum entries per leaf before it splits.
    pub leaf_capacity: usize,
}

impl Default for IndexParams {
    fn default() -> Self {
        Self {
            min_children: 2,
            max_children: 8,
            leaf_capacity: 16,
        }
    }
}

impl IndexParams {
    /// Check the fanout limits.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] unless `2 <= min_children <= max_children / 2`
    /// and `leaf_capacity >= 2`.
    pub const fn validate(&self) -> Result<(), IndexError> {
        if self.min_children < 2 || self.min_children > self.max_children / 2 {
            return Err(IndexError::Fanout {
                min: self.min_children,
                max: self.max_children,
            });
        }
        if self.leaf_capacity < 2 {
            return Err(IndexError::LeafCapacity(self.leaf_capacity));
        }
        Ok(())
    }

    const fn leaf_min_fill(&self) -> usize {
        let half = self.leaf_capacity / 2;
        if self.min_children < half {
            self.min_children
        } else {
            half
        }
    }
}

/// Invalid index configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IndexError {
    /// Fanout bounds that cannot produce two valid halves on split.
    #[error("invalid fanout: min_children {min} must be at least 2 and at most half of max_children {max}")]
    Fanout {
        /// Configured minimum.
        min: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Leaf capacity below two.
    #[error("invalid leaf capacity {0}, must be at least 2")]
    LeafCapacity(usize),
}

#[derive(Debug, Clone)]
enum NodeKind<K> {
    Leaf(Vec<(K, BoundingBox)>),
    Internal(Vec<usize>),
}

#[derive(Debug, Clone)]
struct TreeNode<K> {
    bbox: BoundingBox,
    parent: Option<usize>,
    kind: NodeKind<K>,
}

impl<K> TreeNode<K> {
    const fn leaf(parent: Option<usize>) -> Self {
        Self {
            bbox: BoundingBox::EMPTY,
            parent,
            kind: NodeKind::Leaf(Vec::new()),
        }
    }

    fn child_count(&self) -> usize {
        match &self.kind {
            NodeKind::Leaf(entries) => entries.len(),
            NodeKind::Internal(children) => children.len(),
        }
    }
}

/// A bounding-box index keyed by `K`.
///
/// Queries take `&self` and may run concurrently; mutation takes `&mut self`.
/// Readers that must not block on a rebuild share an immutable tree behind
/// an `Arc` and swap in a freshly built one.
#[derive(Debug, Clone)]
pub struct RTree<K> {
    params: IndexParams,
    nodes: Vec<TreeNode<K>>,
    free: Vec<usize>,
    root: usize,
    entries: HashMap<K, BoundingBox>,
}

/// The index the renderer keeps over an [`ObjectStore`].
pub type SpatialIndex = RTree<ObjectId>;

impl<K: Copy + Eq + Hash> Default for RTree<K> {
    fn default() -> Self {
        Self::with_valid_params(IndexParams::default())
    }
}

impl<K: Copy + Eq + Hash> RTree<K> {
    /// Create an empty index with default fanout.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if `params` fail [`IndexParams::validate`].
    pub fn with_params(params: IndexParams) -> Result<Self, IndexError> {
        params.validate()?;
        Ok(Self::with_valid_params(params))
    }

    fn with_valid_params(params: IndexParams) -> Self {
        Self {
            params,
            nodes: vec![TreeNode::leaf(None)],
            free: Vec::new(),
            root: 0,
            entries: HashMap::new(),
        }
    }

    /// Fanout limits in use.
    #[must_use]
    pub const fn params(&self) -> IndexParams {
        self.params
    }

    /// Number of indexed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Union of all indexed boxes, or `None` when empty.
    #[must_use]
    pub fn bounds(&self) -> Option<BoundingBox> {
        let bbox = self.nodes[self.root].bbox;
        (!bbox.is_empty()).then_some(bbox)
    }

    /// Box stored for `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<BoundingBox> {
        self.entries.get(key).copied()
    }

    /// Number of levels from the root to the deepest leaf.
    #[must_use]
    pub fn height(&self) -> usize {
        fn depth<K>(nodes: &[TreeNode<K>], idx: usize) -> usize {
            match &nodes[idx].kind {
                NodeKind::Leaf(_) => 1,
                NodeKind::Internal(children) => {
                    1 + children.iter().map(|&c| depth(nodes, c)).max().unwrap_or(0)
                }
            }
        }
        depth(&self.nodes, self.root)
    }

    /// Index `key` under `bbox`, replacing any box previously stored for it.
    pub fn insert(&mut self, key: K, bbox: BoundingBox) {
        if self.entries.contains_key(&key) {
            let _ = self.remove(&key);
        }
        let _ = self.entries.insert(key, bbox);

        let leaf = self.choose_leaf(&bbox);
        if let NodeKind::Leaf(entries) = &mut self.nodes[leaf].kind {
            entries.push((key, bbox));
        }
        self.extend_upward(leaf, &bbox);

        if self.nodes[leaf].child_count() > self.params.leaf_capacity {
            self.split(leaf);
        }
    }

    /// Remove `key`, returning the box it was indexed under.
    pub fn remove(&mut self, key: &K) -> Option<BoundingBox> {
        let bbox = *self.entries.get(key)?;
        let leaf = self.find_leaf(key, &bbox)?;
        let _ = self.entries.remove(key);
        if let NodeKind::Leaf(entries) = &mut self.nodes[leaf].kind {
            entries.retain(|(k, _)| k != key);
        }
        self.condense(leaf);
        Some(bbox)
    }

    /// Every key whose box intersects `query`, each exactly once.
    #[must_use]
    pub fn query(&self, query: &BoundingBox) -> Vec<K> {
        let mut found = Vec::new();
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.bbox.intersects(query) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(entries) => found.extend(
                    entries
                        .iter()
                        .filter(|(_, b)| b.intersects(query))
                        .map(|(k, _)| *k),
                ),
                NodeKind::Internal(children) => stack.extend(children.iter().copied()),
            }
        }
        found
    }

    /// Descend from the root to the leaf that needs the least enlargement.
    ///
    /// Ties go to the smaller resulting area, then to the first child.
    fn choose_leaf(&self, bbox: &BoundingBox) -> usize {
        let mut idx = self.root;
        while let NodeKind::Internal(children) = &self.nodes[idx].kind {
            let mut best = children[0];
            let mut best_cost = (f64::INFINITY, f64::INFINITY);
            for &child in children {
                let child_box = &self.nodes[child].bbox;
                let cost = (child_box.enlargement(bbox), child_box.union(bbox).area());
                if cost < best_cost {
                    best = child;
                    best_cost = cost;
                }
            }
            idx = best;
        }
        idx
    }

    fn find_leaf(&self, key: &K, bbox: &BoundingBox) -> Option<usize> {
        let mut stack = vec![self.root];
        while let Some(idx) = stack.pop() {
            let node = &self.nodes[idx];
            if !node.bbox.contains(bbox) {
                continue;
            }
            match &node.kind {
                NodeKind::Leaf(entries) => {
                    if entries.iter().any(|(k, _)| k == key) {
                        return Some(idx);
                    }
                }
                NodeKind::Internal(children) => stack.extend(children.iter().copied()),
            }
        }
        None
    }

    fn extend_upward(&mut self, mut idx: usize, bbox: &BoundingBox) {
        loop {
            let node = &mut self.nodes[idx];
            node.bbox = node.bbox.union(bbox);
            match node.parent {
                Some(parent) => idx = parent,
                None => return,
            }
        }
    }

    fn refit(&mut self, idx: usize) {
        let bbox = match &self.nodes[idx].kind {
            NodeKind::Leaf(entries) => entries.iter().map(|(_, b)| *b).collect(),
            NodeKind::Internal(children) => children.iter().map(|&c| self.nodes[c].bbox).collect(),
        };
        self.nodes[idx].bbox = bbox;
    }

    fn alloc(&mut self, node: TreeNode<K>) -> usize {
        if let Some(idx) = self.free.pop() {
            self.nodes[idx] = node;
            idx
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    fn release(&mut self, idx: usize) {
        self.nodes[idx] = TreeNode::leaf(None);
        self.free.push(idx);
    }

    /// Split an overfull node in two and propagate upward.
    fn split(&mut self, idx: usize) {
        let parent = self.nodes[idx].parent;
        let kind = std::mem::replace(&mut self.nodes[idx].kind, NodeKind::Internal(Vec::new()));

        let (left_kind, right_kind) = match kind {
            NodeKind::Leaf(entries) => {
                let boxes: Vec<BoundingBox> = entries.iter().map(|(_, b)| *b).collect();
                let (left, right) = partition(&boxes, self.params.leaf_min_fill().max(1));
                (
                    NodeKind::Leaf(left.iter().map(|&i| entries[i]).collect()),
                    NodeKind::Leaf(right.iter().map(|&i| entries[i]).collect()),
                )
            }
            NodeKind::Internal(children) => {
                let boxes: Vec<BoundingBox> = children.iter().map(|&c| self.nodes[c].bbox).collect();
                let (left, right) = partition(&boxes, self.params.min_children);
                (
                    NodeKind::Internal(left.iter().map(|&i| children[i]).collect()),
                    NodeKind::Internal(right.iter().map(|&i| children[i]).collect()),
                )
            }
        };

        self.nodes[idx].kind = left_kind;
        let sibling = self.alloc(TreeNode {
            bbox: BoundingBox::EMPTY,
            parent,
            kind: right_kind,
        });
        let moved = match &self.nodes[sibling].kind {
            NodeKind::Internal(children) => children.clone(),
            NodeKind::Leaf(_) => Vec::new(),
        };
        for child in moved {
            self.nodes[child].parent = Some(sibling);
        }
        self.refit(idx);
        self.refit(sibling);

        match parent {
            None => {
                let root = self.alloc(TreeNode {
                    bbox: BoundingBox::EMPTY,
                    parent: None,
                    kind: NodeKind::Internal(vec![idx, sibling]),
                });
                self.nodes[idx].parent = Some(root);
                self.nodes[sibling].parent = Some(root);
                self.refit(root);
                self.root = root;
            }
            Some(parent) => {
                if let NodeKind::Internal(children) = &mut self.nodes[parent].kind {
                    children.push(sibling);
                }
                if self.nodes[parent].child_count() > self.params.max_children {
                    self.split(parent);
                }
            }
        }
    }

    /// Walk from a leaf that just lost an entry up to the root, pruning empty
    /// nodes and shrinking boxes.
    fn condense(&mut self, leaf: usize) {
        let mut idx = leaf;
        while let Some(parent) = self.nodes[idx].parent {
            if self.nodes[idx].child_count() == 0 {
                if let NodeKind::Internal(children) = &mut self.nodes[parent].kind {
                    children.retain(|&c| c != idx);
                }
                self.release(idx);
            } else {
                self.refit(idx);
            }
            idx = parent;
        }

        // Root: collapse chains of single-child internal nodes.
        loop {
            let root = self.root;
            let (emptied, only_child) = match &self.nodes[root].kind {
                NodeKind::Internal(children) => match children.as_slice() {
                    [] => (true, None),
                    [child] => (false, Some(*child)),
                    _ => (false, None),
                },
                NodeKind::Leaf(_) => (false, None),
            };
            if emptied {
                self.nodes[root].kind = NodeKind::Leaf(Vec::new());
            }
            let Some(child) = only_child else {
                self.refit(root);
                return;
            };
            self.nodes[child].parent = None;
            self.release(root);
            self.root = child;
        }
    }
}

impl RTree<ObjectId> {
    /// Index every object of `store` under its bounding box.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError`] if `params` are invalid.
    pub fn from_store(store: &dyn ObjectStore, params: IndexParams) -> Result<Self, IndexError> {
        let mut index = Self::with_params(params)?;
        for object in store.objects() {
            index.insert(object.id(), object.bbox());
        }
        tracing::debug!(objects = index.len(), height = index.height(), "built spatial index");
        Ok(index)
    }
}

/// Partition `boxes` into two groups of at least `min_fill` each, minimising
/// the summed area of the two group boxes.
///
/// Candidates come from sorting along each axis by lower then by upper edge
/// and cutting at every admissible position.
fn partition(boxes: &[BoundingBox], min_fill: usize) -> (Vec<usize>, Vec<usize>) {
    let n = boxes.len();
    let min_fill = min_fill.clamp(1, n / 2);
    let mut best: Option<(f64, Vec<usize>, usize)> = None;

    for axis in 0..2 {
        for by_upper in [false, true] {
            let mut order: Vec<usize> = (0..n).collect();
            order.sort_by(|&a, &b| {
                let (a_lo, a_hi) = boxes[a].extent(axis);
                let (b_lo, b_hi) = boxes[b].extent(axis);
                let (ka, kb) = if by_upper { (a_hi, b_hi) } else { (a_lo, b_lo) };
                ka.total_cmp(&kb)
            });

            // prefix[k] covers order[..k], suffix[k] covers order[k..]
            let mut prefix = vec![BoundingBox::EMPTY; n + 1];
            let mut suffix = vec![BoundingBox::EMPTY; n + 1];
            for k in 0..n {
                prefix[k + 1] = prefix[k].union(&boxes[order[k]]);
            }
            for k in (0..n).rev() {
                suffix[k] = suffix[k + 1].union(&boxes[order[k]]);
            }

            for cut in min_fill..=(n - min_fill) {
                let cost = prefix[cut].area() + suffix[cut].area();
                if best.as_ref().is_none_or(|(best_cost, _, _)| cost < *best_cost) {
                    best = Some((cost, order.clone(), cut));
                }
            }
        }
    }

    match best {
        Some((_, order, cut)) => {
            let right = order[cut..].to_vec();
            let mut left = order;
            left.truncate(cut);
            (left, right)
        }
        None => ((0..n / 2).collect(), (n / 2..n).collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_params() -> IndexParams {
        IndexParams {
            min_children: 2,
            max_children: 4,
            leaf_capacity: 4,
        }
    }

    #[test]
    fn test_validate_params() {
        assert!(IndexParams::default().validate().is_ok());
        let bad = IndexParams {
            min_children: 3,
            max_children: 4,
            leaf_capacity: 8,
        };
        assert_eq!(bad.validate(), Err(IndexError::Fanout { min: 3, max: 4 }));
        let bad_leaf = IndexParams {
            leaf_capacity: 1,
            ..IndexParams::default()
        };
        assert_eq!(bad_leaf.validate(), Err(IndexError::LeafCapacity(1)));
    }

    #[test]
    fn test_partition_separates_clusters() {
        let boxes = [
            BoundingBox::new(0.0, 0.0, 1.0, 1.0),
            BoundingBox::new(100.0, 100.0, 101.0, 101.0),
            BoundingBox::new(1.0, 1.0, 2.0, 2.0),
            BoundingBox::new(101.0, 101.0, 102.0, 102.0),
        ];
        let (mut left, mut right) = partition(&boxes, 1);
        left.sort_unstable();
        right.sort_unstable();
        assert_eq!(left, vec![0, 2]);
        assert_eq!(right, vec![1, 3]);
    }

    #[test]
    fn test_tree_grows_and_shrinks() {
        let mut tree = RTree::with_params(small_params()).unwrap();
        for i in 0..64u32 {
            let x = f64::from(i % 8) * 10.0;
            let y = f64::from(i / 8) * 10.0;
            tree.insert(i, BoundingBox::new(x, y, x + 1.0, y + 1.0));
        }
        assert_eq!(tree.len(), 64);
        assert!(tree.height() > 2);

        for i in 0..64u32 {
            assert!(tree.remove(&i).is_some());
        }
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 1);
        assert_eq!(tree.bounds(), None);
    }

    #[test]
    fn test_reinsert_replaces_box() {
        let mut tree = RTree::new();
        tree.insert(7u32, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        tree.insert(7u32, BoundingBox::new(50.0, 50.0, 51.0, 51.0));
        assert_eq!(tree.len(), 1);
        assert!(tree.query(&BoundingBox::new(0.0, 0.0, 1.0, 1.0)).is_empty());
        assert_eq!(tree.query(&BoundingBox::new(49.0, 49.0, 52.0, 52.0)), vec![7]);
    }

    #[test]
    fn test_parents_stay_consistent_after_splits() {
        let mut tree = RTree::with_params(small_params()).unwrap();
        for i in 0..200u32 {
            let v = f64::from(i);
            tree.insert(i, BoundingBox::new(v, -v, v + 0.5, -v + 0.5));
        }
        for (idx, node) in tree.nodes.iter().enumerate() {
            if tree.free.contains(&idx) {
                continue;
            }
            if let NodeKind::Internal(children) = &node.kind {
                assert!(children.len() <= tree.params.max_children);
                for &child in children {
                    assert_eq!(tree.nodes[child].parent, Some(idx));
                    assert!(node.bbox.contains(&tree.nodes[child].bbox));
                }
            }
        }
    }

    #[test]
    fn test_remove_keeps_entry_when_leaf_missing() {
        let mut tree = RTree::new();
        tree.insert(1u32, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
        let _ = tree
            .entries
            .insert(1, BoundingBox::new(40.0, 40.0, 41.0, 41.0));
        assert_eq!(tree.remove(&1), None);
        assert_eq!(tree.len(), 1);
        assert!(tree.entries.contains_key(&1));
    }
}
