//! Coordinator counters.
//!
//! Counters are plain atomics bumped on the request path; reading them
//! through [`Stats::snapshot`] has no effect on the coordinator.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct Stats {
    pub(crate) requests: AtomicU64,
    pub(crate) cache_hits: AtomicU64,
    pub(crate) cache_misses: AtomicU64,
    pub(crate) stale_misses: AtomicU64,
    pub(crate) coalesced: AtomicU64,
    pub(crate) jobs_started: AtomicU64,
    pub(crate) jobs_completed: AtomicU64,
    pub(crate) jobs_failed: AtomicU64,
    pub(crate) timeouts: AtomicU64,
    pub(crate) draw_calls: AtomicU64,
    render_micros: AtomicU64,
}

pub(crate) fn bump(counter: &AtomicU64) {
    let _ = counter.fetch_add(1, Ordering::Relaxed);
}

impl Stats {
    pub(crate) fn add_render_time(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        let _ = self.render_micros.fetch_add(micros, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let load = |counter: &AtomicU64| counter.load(Ordering::Relaxed);
        StatsSnapshot {
            requests: load(&self.requests),
            cache_hits: load(&self.cache_hits),
            cache_misses: load(&self.cache_misses),
            stale_misses: load(&self.stale_misses),
            coalesced: load(&self.coalesced),
            jobs_started: load(&self.jobs_started),
            jobs_completed: load(&self.jobs_completed),
            jobs_failed: load(&self.jobs_failed),
            timeouts: load(&self.timeouts),
            draw_calls: load(&self.draw_calls),
            render_time: Duration::from_micros(load(&self.render_micros)),
        }
    }
}

/// Point-in-time copy of the coordinator counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Tile requests received, valid or not.
    pub requests: u64,
    /// Requests answered from the cache.
    pub cache_hits: u64,
    /// Requests that found no current cache entry, stale ones included.
    pub cache_misses: u64,
    /// Misses caused by an entry from an older generation.
    pub stale_misses: u64,
    /// Requests that joined a job another request had started.
    pub coalesced: u64,
    /// Jobs registered.
    pub jobs_started: u64,
    /// Jobs that produced tiles.
    pub jobs_completed: u64,
    /// Jobs that ended with an error.
    pub jobs_failed: u64,
    /// Waiters released by their timeout.
    pub timeouts: u64,
    /// Tiles handed to the drawing backend.
    pub draw_calls: u64,
    /// Time spent in cascade and drawing, summed over jobs.
    pub render_time: Duration,
}

impl StatsSnapshot {
    /// Share of requests served from the cache, from 0.0 to 1.0.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.cache_hits as f64 / self.requests as f64
    }
}
