//! Integration tests for the generation-tagged tile cache.

use bytes::Bytes;
use tessella_render::{CacheConfig, CacheLookup, CapacityError, TileCache, TileFormat, TileId};

fn tile(x: u32) -> TileId {
    TileId::new(10, x, 0, TileFormat::Png)
}

fn cache(max_entries: usize, max_bytes: Option<usize>) -> TileCache {
    TileCache::new(&CacheConfig {
        max_entries,
        max_bytes,
    })
    .unwrap()
}

fn bytes(s: &'static str) -> Bytes {
    Bytes::from_static(s.as_bytes())
}

#[test]
fn test_hit_and_miss() {
    let cache = cache(4, None);
    assert_eq!(cache.get(&tile(1), 1), CacheLookup::Miss);
    assert!(cache.insert(tile(1), bytes("one"), 1));
    assert_eq!(cache.get(&tile(1), 1), CacheLookup::Hit(bytes("one")));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_lru_eviction_order() {
    let cache = cache(3, None);
    for x in 1..=3 {
        assert!(cache.insert(tile(x), bytes("t"), 1));
    }
    // Touch 1 so that 2 becomes the oldest.
    assert!(matches!(cache.get(&tile(1), 1), CacheLookup::Hit(_)));
    assert!(cache.insert(tile(4), bytes("t"), 1));

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.get(&tile(2), 1), CacheLookup::Miss);
    for x in [1, 3, 4] {
        assert!(matches!(cache.get(&tile(x), 1), CacheLookup::Hit(_)), "{x}");
    }
}

#[test]
fn test_reinsert_replaces_entry() {
    let cache = cache(2, None);
    assert!(cache.insert(tile(1), bytes("old"), 1));
    assert!(cache.insert(tile(1), bytes("newer"), 1));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.size_bytes(), 5);
    assert_eq!(cache.get(&tile(1), 1), CacheLookup::Hit(bytes("newer")));
}

#[test]
fn test_stale_generation_reads_as_absent() {
    let cache = cache(4, None);
    assert!(cache.insert(tile(1), bytes("v1"), 1));
    assert_eq!(cache.get(&tile(1), 2), CacheLookup::Stale);
    assert!(cache.is_empty());
    assert_eq!(cache.get(&tile(1), 2), CacheLookup::Miss);

    // An entry newer than the caller's generation is kept.
    assert!(cache.insert(tile(2), bytes("v3"), 3));
    assert_eq!(cache.get(&tile(2), 2), CacheLookup::Miss);
    assert_eq!(cache.get(&tile(2), 3), CacheLookup::Hit(bytes("v3")));
}

#[test]
fn test_older_generation_does_not_replace_newer() {
    let cache = cache(4, None);
    assert!(cache.insert(tile(1), bytes("v2"), 2));
    assert!(!cache.insert(tile(1), bytes("v1"), 1));
    assert_eq!(cache.get(&tile(1), 2), CacheLookup::Hit(bytes("v2")));
    assert!(cache.insert(tile(1), bytes("v3"), 3));
    assert_eq!(cache.get(&tile(1), 3), CacheLookup::Hit(bytes("v3")));
}

#[test]
fn test_byte_budget() {
    let cache = cache(100, Some(10));
    assert!(cache.insert(tile(1), bytes("aaaa"), 1));
    assert!(cache.insert(tile(2), bytes("bbbb"), 1));
    assert!(cache.insert(tile(3), bytes("cccc"), 1));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.size_bytes(), 8);
    assert_eq!(cache.get(&tile(1), 1), CacheLookup::Miss);

    assert!(!cache.insert(tile(4), bytes("far too large"), 1));
    assert_eq!(cache.len(), 2);
}

#[test]
fn test_clear() {
    let cache = cache(4, None);
    assert!(cache.insert(tile(1), bytes("x"), 1));
    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.size_bytes(), 0);
}

#[test]
fn test_zero_capacity_rejected() {
    let err = TileCache::new(&CacheConfig {
        max_entries: 0,
        max_bytes: None,
    })
    .unwrap_err();
    assert_eq!(err, CapacityError::ZeroCacheCapacity);

    let err = TileCache::new(&CacheConfig {
        max_entries: 1,
        max_bytes: Some(0),
    })
    .unwrap_err();
    assert_eq!(err, CapacityError::ZeroCacheBytes);
}
