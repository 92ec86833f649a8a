//! The render-job coordinator.
//!
//! A tile request is answered from the cache when possible. Otherwise the
//! request joins the job rendering its meta tile, starting one if none is in
//! flight. Jobs queue for a bounded number of admission permits, run the
//! cascade and the drawing backend on a blocking worker, and publish one
//! outcome that every waiter receives.
//!
//! Stylesheet, object store and spatial index form one immutable
//! [`RenderContext`] behind an [`ArcSwap`]. A request snapshots it once; the
//! job it starts renders with that snapshot, so reloads never disturb jobs
//! already running. Jobs are registered per generation, so a request made
//! after a reload never waits on a job that renders with the old context.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use bytes::Bytes;
use parking_lot::Mutex;
use tessella_common::warning::clear_warnings;
use tessella_css::{CompileOptions, ParseError, StyledObject, Stylesheet, compile_with, evaluate_all};
use tessella_geo::{ObjectStore, SpatialIndex};
use tokio::sync::{Semaphore, watch};
use tracing::{debug, info, warn};

use crate::backend::{DrawRequest, DrawingBackend};
use crate::cache::{CacheLookup, TileCache};
use crate::config::CoordinatorConfig;
use crate::error::{ConfigError, ReloadError, RenderError, TileError, TimeoutError};
use crate::job::{
    Job, JobOutcome, JobRegistry, JobStatus, Registration, RenderedBlock, wait_for_outcome,
};
use crate::stats::{Stats, StatsSnapshot, bump};
use crate::tile::{MetaId, TileId};

/// Everything a job renders against, published and replaced as a unit.
pub struct RenderContext {
    /// Compiled stylesheet.
    pub stylesheet: Arc<Stylesheet>,
    /// Source the stylesheet was compiled from, kept for recompiling against
    /// a new store's interner.
    pub source: Arc<str>,
    /// Geographic objects.
    pub store: Arc<dyn ObjectStore>,
    /// Spatial index over `store`.
    pub index: Arc<SpatialIndex>,
    /// Bumped on every reload; cache entries from older generations are
    /// stale.
    pub generation: u64,
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("rules", &self.stylesheet.len())
            .field("objects", &self.index.len())
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

struct Shared {
    config: CoordinatorConfig,
    context: ArcSwap<RenderContext>,
    backend: Arc<dyn DrawingBackend>,
    cache: TileCache,
    jobs: JobRegistry,
    permits: Semaphore,
    stats: Stats,
    /// Serializes reloads so generations increase one at a time.
    reload: Mutex<()>,
}

/// Coordinates tile requests, render jobs and the tile cache.
///
/// Cloning is cheap; clones share all state.
#[derive(Clone)]
pub struct Coordinator {
    shared: Arc<Shared>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("context", &*self.shared.context.load())
            .field("jobs", &self.shared.jobs.len())
            .field("cached_tiles", &self.shared.cache.len())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    /// Create a coordinator over `store` with an empty stylesheet.
    ///
    /// Load a stylesheet with [`Coordinator::reload_stylesheet`] before
    /// requesting tiles; until then every tile shows only the background.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if `config` does not validate.
    pub fn new(
        config: CoordinatorConfig,
        store: Arc<dyn ObjectStore>,
        backend: Arc<dyn DrawingBackend>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let index = SpatialIndex::from_store(store.as_ref(), config.index)?;
        let context = RenderContext {
            stylesheet: Arc::new(Stylesheet::default()),
            source: Arc::from(""),
            store,
            index: Arc::new(index),
            generation: 0,
        };
        let shared = Shared {
            cache: TileCache::new(&config.cache)?,
            permits: Semaphore::new(config.max_running_jobs),
            context: ArcSwap::from_pointee(context),
            backend,
            jobs: JobRegistry::new(),
            stats: Stats::default(),
            reload: Mutex::new(()),
            config,
        };
        Ok(Self {
            shared: Arc::new(shared),
        })
    }

    /// The configuration the coordinator runs with.
    #[must_use]
    pub fn config(&self) -> &CoordinatorConfig {
        &self.shared.config
    }

    /// The render context new jobs currently start from.
    #[must_use]
    pub fn context(&self) -> Arc<RenderContext> {
        self.shared.context.load_full()
    }

    /// Current render generation.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.shared.context.load().generation
    }

    /// Counters since construction.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    /// Number of tiles in the cache.
    #[must_use]
    pub fn cached_tiles(&self) -> usize {
        self.shared.cache.len()
    }

    /// Number of jobs queued or running.
    #[must_use]
    pub fn jobs_in_flight(&self) -> usize {
        self.shared.jobs.len()
    }

    /// Return the bytes of `tile`, rendering its meta tile if needed.
    ///
    /// Concurrent requests for tiles of the same meta tile share one render.
    /// `timeout` bounds how long this caller waits and defaults to the
    /// configured request timeout; the render itself carries on and fills
    /// the cache regardless.
    ///
    /// # Errors
    ///
    /// - [`TileError::Lookup`] for a tile outside the grid
    /// - [`TileError::Render`] if the job failed; every waiter of the job
    ///   gets the same error
    /// - [`TileError::Timeout`] if the wait exceeded `timeout`
    pub async fn request_tile(
        &self,
        tile: TileId,
        timeout: Option<Duration>,
    ) -> Result<Bytes, TileError> {
        let stats = &self.shared.stats;
        bump(&stats.requests);
        tile.validate()?;

        let context = self.context();
        let generation = context.generation;
        match self.shared.cache.get(&tile, generation) {
            CacheLookup::Hit(bytes) => {
                bump(&stats.cache_hits);
                debug!(tile = %tile, "cache hit");
                return Ok(bytes);
            }
            CacheLookup::Stale => {
                bump(&stats.cache_misses);
                bump(&stats.stale_misses);
            }
            CacheLookup::Miss => bump(&stats.cache_misses),
        }

        let meta = MetaId::for_tile(&tile, self.shared.config.meta_tile_size);
        let recheck = || self.cached_at(&tile, generation);
        let registration = match self.shared.jobs.register_unless(meta, generation, recheck) {
            Ok(registration) => registration,
            Err(bytes) => return Ok(bytes),
        };
        let receiver = self.attach(registration, context);
        let block = self.wait(meta, receiver, timeout).await?;
        block
            .tiles
            .get(&tile)
            .cloned()
            .ok_or_else(|| RenderError::MissingTile(tile.to_string()).into())
    }

    /// Render `meta` and, while it contains styled objects, the blocks
    /// covering it on every zoom level up to `max_zoom`.
    ///
    /// Returns the number of blocks rendered.
    ///
    /// # Errors
    ///
    /// Stops at the first block that fails or times out.
    pub async fn prerender(&self, meta: MetaId, max_zoom: u8) -> Result<usize, TileError> {
        let block_size = self.shared.config.meta_tile_size;
        let origin = TileId::new(meta.zoom, meta.x, meta.y, meta.format);
        origin.validate()?;

        let mut pending = vec![MetaId::for_tile(&origin, block_size)];
        let mut rendered = 0;
        while let Some(meta) = pending.pop() {
            let context = self.context();
            let registration = self.shared.jobs.register(meta, context.generation);
            let receiver = self.attach(registration, context);
            let block = self.wait(meta, receiver, None).await?;
            rendered += 1;
            if block.styled_objects > 0 && meta.zoom < max_zoom {
                pending.extend(meta.sub_identifiers(block_size));
            }
        }
        info!(rendered, max_zoom, "prerender finished");
        Ok(rendered)
    }

    /// Compile `source` and make it the stylesheet of every job started from
    /// now on.
    ///
    /// Jobs already running finish with the stylesheet they started with.
    /// Their tiles are tagged with the old generation and read as stale.
    ///
    /// # Errors
    ///
    /// Returns the [`ParseError`] and leaves the current stylesheet in place
    /// if `source` does not compile.
    pub fn reload_stylesheet(&self, source: &str) -> Result<(), ParseError> {
        let _reload = self.shared.reload.lock();
        let current = self.shared.context.load_full();
        let stylesheet = compile_with(source, &self.compile_options(), current.store.interner())?;
        let rules = stylesheet.len();
        let generation = current.generation + 1;
        self.shared.context.store(Arc::new(RenderContext {
            stylesheet: Arc::new(stylesheet),
            source: Arc::from(source),
            store: Arc::clone(&current.store),
            index: Arc::clone(&current.index),
            generation,
        }));
        clear_warnings();
        info!(generation, rules, "stylesheet reloaded");
        Ok(())
    }

    /// Replace the object store.
    ///
    /// The index is rebuilt and the current stylesheet recompiled against the
    /// new store's interner before both are published together.
    ///
    /// # Errors
    ///
    /// Returns [`ReloadError`] and keeps the current data if indexing or
    /// recompiling fails.
    pub fn reload_data(&self, store: Arc<dyn ObjectStore>) -> Result<(), ReloadError> {
        let _reload = self.shared.reload.lock();
        let current = self.shared.context.load_full();
        let index = SpatialIndex::from_store(store.as_ref(), self.shared.config.index)?;
        let stylesheet = compile_with(&current.source, &self.compile_options(), store.interner())?;
        let generation = current.generation + 1;
        let objects = index.len();
        self.shared.context.store(Arc::new(RenderContext {
            stylesheet: Arc::new(stylesheet),
            source: Arc::clone(&current.source),
            store,
            index: Arc::new(index),
            generation,
        }));
        clear_warnings();
        info!(generation, objects, "data reloaded");
        Ok(())
    }

    fn compile_options(&self) -> CompileOptions {
        CompileOptions {
            strict_attributes: self.shared.config.strict_attributes,
        }
    }

    fn cached_at(&self, tile: &TileId, generation: u64) -> Option<Bytes> {
        match self.shared.cache.get(tile, generation) {
            CacheLookup::Hit(bytes) => Some(bytes),
            CacheLookup::Miss | CacheLookup::Stale => None,
        }
    }

    /// Subscribe to the registered job, spawning it first if it is new.
    fn attach(
        &self,
        registration: Registration,
        context: Arc<RenderContext>,
    ) -> watch::Receiver<Option<JobOutcome>> {
        let stats = &self.shared.stats;
        match registration {
            Registration::Joined(receiver) => {
                bump(&stats.coalesced);
                receiver
            }
            Registration::Started(job) => {
                bump(&stats.jobs_started);
                let receiver = job.subscribe();
                let _ = tokio::spawn(run_job(Arc::clone(&self.shared), job, context));
                receiver
            }
        }
    }

    async fn wait(
        &self,
        meta: MetaId,
        receiver: watch::Receiver<Option<JobOutcome>>,
        timeout: Option<Duration>,
    ) -> Result<Arc<RenderedBlock>, TileError> {
        let limit = timeout.unwrap_or_else(|| self.shared.config.request_timeout());
        match tokio::time::timeout(limit, wait_for_outcome(receiver, meta)).await {
            Ok(outcome) => outcome.map_err(TileError::from),
            Err(_) => {
                bump(&self.shared.stats.timeouts);
                debug!(meta = %meta, ?limit, "waiter timed out");
                Err(TimeoutError(limit).into())
            }
        }
    }
}

/// Fails the job if its task is dropped before publishing an outcome.
struct AbandonGuard {
    shared: Arc<Shared>,
    job: Arc<Job>,
}

impl Drop for AbandonGuard {
    fn drop(&mut self) {
        if self.job.status().is_terminal() {
            return;
        }
        let meta = self.job.meta();
        let abandoned = Err(RenderError::Abandoned(meta.to_string()));
        if self.shared.jobs.finish(&self.job, abandoned) {
            bump(&self.shared.stats.jobs_failed);
            warn!(meta = %meta, "render job abandoned");
        }
    }
}

async fn run_job(shared: Arc<Shared>, job: Arc<Job>, context: Arc<RenderContext>) {
    let _abandon = AbandonGuard {
        shared: Arc::clone(&shared),
        job: Arc::clone(&job),
    };
    let meta = job.meta();
    let Ok(permit) = shared.permits.acquire().await else {
        return;
    };
    job.set_status(JobStatus::Running);
    let generation = job.generation();
    debug!(meta = %meta, generation, queued = ?job.age(), "job admitted");

    let started = Instant::now();
    let worker = Arc::clone(&shared);
    let result =
        tokio::task::spawn_blocking(move || render_block(&meta, &context, &worker)).await;
    shared.stats.add_render_time(started.elapsed());
    drop(permit);

    let outcome = match result {
        Ok(rendered) => rendered.map(Arc::new),
        Err(err) => Err(RenderError::WorkerPanicked(err.to_string())),
    };
    match &outcome {
        Ok(block) => {
            for (tile, bytes) in &block.tiles {
                let _ = shared.cache.insert(*tile, bytes.clone(), generation);
            }
            bump(&shared.stats.jobs_completed);
            info!(
                meta = %meta,
                tiles = block.tiles.len(),
                objects = block.styled_objects,
                elapsed = ?job.age(),
                "rendered meta tile"
            );
        }
        Err(err) => {
            bump(&shared.stats.jobs_failed);
            warn!(meta = %meta, error = %err, "render job failed");
        }
    }
    let _ = shared.jobs.finish(&job, outcome);
}

/// Cascade the block once, then draw each member tile.
fn render_block(
    meta: &MetaId,
    context: &RenderContext,
    shared: &Shared,
) -> Result<RenderedBlock, RenderError> {
    let overlap = shared.config.tile_overlap;
    let store = context.store.as_ref();
    let candidates = context.index.query(&meta.bounds().expand(overlap));
    let styled = evaluate_all(&candidates, meta.zoom, &context.stylesheet, store);

    let members = meta.members();
    let mut tiles = HashMap::with_capacity(members.len());
    for tile in members {
        let bounds = tile.bounds();
        let reach = bounds.expand(overlap);
        let objects: Vec<StyledObject> = styled
            .iter()
            .filter(|styled| {
                store
                    .resolve(styled.id)
                    .is_some_and(|object| object.bbox().intersects(&reach))
            })
            .cloned()
            .collect();
        bump(&shared.stats.draw_calls);
        let bytes = shared.backend.draw(&DrawRequest {
            tile,
            bounds,
            canvas: &context.stylesheet.canvas,
            objects: &objects,
            store,
        })?;
        let _ = tiles.insert(tile, Bytes::from(bytes));
    }
    Ok(RenderedBlock {
        tiles,
        styled_objects: styled.len(),
    })
}
