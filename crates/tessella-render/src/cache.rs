//! Generation-tagged LRU cache of rendered tiles.
//!
//! Every entry remembers the render-context generation it was drawn under.
//! A lookup with a newer generation treats the entry as absent and drops it,
//! so a reload never has to sweep the cache.

use std::collections::{BTreeMap, HashMap};

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::CapacityError;
use crate::tile::TileId;

/// Result of a cache lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// Current bytes for the tile.
    Hit(Bytes),
    /// Nothing cached.
    Miss,
    /// An entry from an older generation was found and evicted.
    Stale,
}

#[derive(Debug)]
struct Entry {
    bytes: Bytes,
    generation: u64,
    stamp: u64,
}

#[derive(Debug, Default)]
struct CacheState {
    entries: HashMap<TileId, Entry>,
    /// Recency stamp to tile, oldest first.
    recency: BTreeMap<u64, TileId>,
    clock: u64,
    bytes: usize,
}

impl CacheState {
    const fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    fn remove(&mut self, tile: &TileId) -> Option<Entry> {
        let entry = self.entries.remove(tile)?;
        let _ = self.recency.remove(&entry.stamp);
        self.bytes -= entry.bytes.len();
        Some(entry)
    }

    fn evict_oldest(&mut self) -> Option<TileId> {
        let (_, tile) = self.recency.pop_first()?;
        if let Some(entry) = self.entries.remove(&tile) {
            self.bytes -= entry.bytes.len();
        }
        Some(tile)
    }
}

/// Bounded tile cache with least-recently-used eviction.
#[derive(Debug)]
pub struct TileCache {
    state: Mutex<CacheState>,
    max_entries: usize,
    max_bytes: Option<usize>,
}

impl TileCache {
    /// Create an empty cache.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityError`] for a zero entry limit or byte budget.
    pub fn new(config: &CacheConfig) -> Result<Self, CapacityError> {
        config.validate()?;
        Ok(Self {
            state: Mutex::new(CacheState::default()),
            max_entries: config.max_entries,
            max_bytes: config.max_bytes,
        })
    }

    /// Look up `tile` as of `generation`.
    ///
    /// A hit refreshes the entry's recency. An entry from an older
    /// generation is removed and reported as [`CacheLookup::Stale`]; one from
    /// a newer generation than the caller knows of is left alone.
    pub fn get(&self, tile: &TileId, generation: u64) -> CacheLookup {
        let mut state = self.state.lock();
        let stamp = state.tick();
        let Some(entry) = state.entries.get_mut(tile) else {
            return CacheLookup::Miss;
        };
        if entry.generation < generation {
            let old = entry.generation;
            let _ = state.remove(tile);
            debug!(tile = %tile, cached = old, current = generation, "dropped stale tile");
            return CacheLookup::Stale;
        }
        if entry.generation > generation {
            return CacheLookup::Miss;
        }
        let previous = std::mem::replace(&mut entry.stamp, stamp);
        let bytes = entry.bytes.clone();
        let _ = state.recency.remove(&previous);
        let _ = state.recency.insert(stamp, *tile);
        CacheLookup::Hit(bytes)
    }

    /// Store `bytes` for `tile`, evicting least recently used entries past
    /// capacity.
    ///
    /// Returns false, storing nothing, if the tile alone exceeds the byte
    /// budget or the cache already holds it from a newer generation.
    pub fn insert(&self, tile: TileId, bytes: Bytes, generation: u64) -> bool {
        if self.max_bytes.is_some_and(|limit| bytes.len() > limit) {
            debug!(tile = %tile, size = bytes.len(), "tile larger than cache budget");
            return false;
        }
        let mut state = self.state.lock();
        if state
            .entries
            .get(&tile)
            .is_some_and(|entry| entry.generation > generation)
        {
            debug!(tile = %tile, generation, "kept newer cached tile");
            return false;
        }
        let _ = state.remove(&tile);
        let stamp = state.tick();
        state.bytes += bytes.len();
        let _ = state.recency.insert(stamp, tile);
        let _ = state.entries.insert(
            tile,
            Entry {
                bytes,
                generation,
                stamp,
            },
        );
        while state.entries.len() > self.max_entries
            || self.max_bytes.is_some_and(|limit| state.bytes > limit)
        {
            match state.evict_oldest() {
                Some(evicted) => debug!(tile = %evicted, "evicted tile"),
                None => break,
            }
        }
        true
    }

    /// Number of cached tiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Returns true if nothing is cached.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total size of the cached tiles in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.state.lock().bytes
    }

    /// Drop every entry.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.recency.clear();
        state.bytes = 0;
    }
}
