//! Integration tests for the R-tree spatial index.

use std::collections::BTreeSet;

use quickcheck_macros::quickcheck;
use tessella_geo::{BoundingBox, IndexParams, Location, MemoryStore, NodeId, ObjectId, RTree, WayId};

fn tight_params() -> IndexParams {
    IndexParams {
        min_children: 2,
        max_children: 4,
        leaf_capacity: 3,
    }
}

fn to_box(&(x, y, w, h): &(u8, u8, u8, u8)) -> BoundingBox {
    let x = f64::from(x);
    let y = f64::from(y);
    BoundingBox::new(x, y, x + f64::from(w % 32), y + f64::from(h % 32))
}

fn brute_force(boxes: &[(u32, BoundingBox)], query: &BoundingBox) -> BTreeSet<u32> {
    boxes
        .iter()
        .filter(|(_, b)| b.intersects(query))
        .map(|(id, _)| *id)
        .collect()
}

fn sorted(found: Vec<u32>) -> Vec<u32> {
    let mut found = found;
    found.sort_unstable();
    found
}

#[test]
fn test_query_two_boxes() {
    let mut index = RTree::new();
    index.insert("id1", BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    index.insert("id2", BoundingBox::new(20.0, 20.0, 30.0, 30.0));

    let mut hits = index.query(&BoundingBox::new(5.0, 5.0, 25.0, 25.0));
    hits.sort_unstable();
    assert_eq!(hits, vec!["id1", "id2"]);

    assert!(index.query(&BoundingBox::new(40.0, 40.0, 50.0, 50.0)).is_empty());
}

#[test]
fn test_query_touching_edge() {
    let mut index = RTree::new();
    index.insert(1u32, BoundingBox::new(0.0, 0.0, 10.0, 10.0));
    assert_eq!(index.query(&BoundingBox::new(10.0, 10.0, 12.0, 12.0)), vec![1]);
}

#[test]
fn test_remove_then_query() {
    let mut index = RTree::with_params(tight_params()).unwrap();
    for i in 0..50u32 {
        let v = f64::from(i);
        index.insert(i, BoundingBox::new(v, v, v + 1.0, v + 1.0));
    }
    assert_eq!(index.remove(&10), Some(BoundingBox::new(10.0, 10.0, 11.0, 11.0)));
    assert_eq!(index.remove(&10), None);
    assert_eq!(
        sorted(index.query(&BoundingBox::new(9.5, 9.5, 11.5, 11.5))),
        vec![9, 11]
    );
    assert_eq!(index.len(), 49);
}

#[test]
fn test_bounds_shrink_after_remove() {
    let mut index = RTree::new();
    index.insert(1u32, BoundingBox::new(0.0, 0.0, 1.0, 1.0));
    index.insert(2u32, BoundingBox::new(100.0, 100.0, 101.0, 101.0));
    let _ = index.remove(&2);
    assert_eq!(index.bounds(), Some(BoundingBox::new(0.0, 0.0, 1.0, 1.0)));
}

#[test]
fn test_invalid_params_rejected() {
    let params = IndexParams {
        min_children: 1,
        ..IndexParams::default()
    };
    assert!(RTree::<u32>::with_params(params).is_err());
}

#[test]
fn test_from_store_indexes_every_object() {
    let mut store = MemoryStore::new();
    let no_tags: [(&str, &str); 0] = [];
    store
        .add_node(NodeId(1), Location { lon: 1.0, lat: 1.0 }, no_tags)
        .unwrap();
    store
        .add_node(NodeId(2), Location { lon: 3.0, lat: 2.0 }, no_tags)
        .unwrap();
    store
        .add_way(WayId(1), vec![NodeId(1), NodeId(2)], [("highway", "primary")])
        .unwrap();

    let index = RTree::from_store(&store, IndexParams::default()).unwrap();
    assert_eq!(index.len(), 3);
    let mut hits = index.query(&BoundingBox::new(2.0, 1.5, 2.5, 1.8));
    hits.sort_unstable();
    assert_eq!(hits, vec![ObjectId::Way(WayId(1))]);
}

#[quickcheck]
fn prop_query_matches_brute_force(raw: Vec<(u8, u8, u8, u8)>, query: (u8, u8, u8, u8)) -> bool {
    let boxes: Vec<(u32, BoundingBox)> = (0u32..).zip(raw.iter().map(to_box)).collect();
    let query = to_box(&query);

    let mut forward = RTree::with_params(tight_params()).unwrap();
    for (id, b) in &boxes {
        forward.insert(*id, *b);
    }
    let mut backward = RTree::with_params(tight_params()).unwrap();
    for (id, b) in boxes.iter().rev() {
        backward.insert(*id, *b);
    }

    let expected: Vec<u32> = brute_force(&boxes, &query).into_iter().collect();
    let found = forward.query(&query);
    let unique: BTreeSet<u32> = found.iter().copied().collect();

    unique.len() == found.len()
        && sorted(found) == expected
        && sorted(backward.query(&query)) == expected
}

#[quickcheck]
fn prop_query_after_removals(raw: Vec<(u8, u8, u8, u8)>, query: (u8, u8, u8, u8)) -> bool {
    let boxes: Vec<(u32, BoundingBox)> = (0u32..).zip(raw.iter().map(to_box)).collect();
    let query = to_box(&query);

    let mut index = RTree::with_params(tight_params()).unwrap();
    for (id, b) in &boxes {
        index.insert(*id, *b);
    }
    for (id, _) in boxes.iter().filter(|(id, _)| id % 2 == 0) {
        let _ = index.remove(id);
    }

    let kept: Vec<(u32, BoundingBox)> = boxes.into_iter().filter(|(id, _)| id % 2 == 1).collect();
    let expected: Vec<u32> = brute_force(&kept, &query).into_iter().collect();
    index.len() == kept.len() && sorted(index.query(&query)) == expected
}
