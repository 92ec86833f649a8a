//! Integration tests for the render-job coordinator.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tessella_geo::projection::lon_lat_to_tile;
use tessella_geo::{IndexError, IndexParams, Location, MemoryStore, NodeId, ObjectStore, WayId};
use tessella_render::{
    CacheConfig, CapacityError, ConfigError, Coordinator, CoordinatorConfig, DrawRequest,
    DrawingBackend, LookupError, MetaId, RenderError, SceneBackend, TileError, TileFormat, TileId, TimeoutError,
};

const STYLE: &str = r#"
canvas { fill-color: #f2efe9 }
node[amenity] { icon-image: "cafe.png" }
way[highway] { width: 2; color: red }
"#;

/// A cafe and a short road near 10°E 10°N.
fn store() -> Arc<dyn ObjectStore> {
    let mut store = MemoryStore::new();
    store
        .add_node(NodeId(1), Location { lon: 10.0, lat: 10.0 }, [("amenity", "cafe")])
        .unwrap();
    store
        .add_node(NodeId(2), Location { lon: 10.2, lat: 10.1 }, [("ele", "12")])
        .unwrap();
    store
        .add_node(NodeId(3), Location { lon: 10.4, lat: 10.1 }, [("ele", "14")])
        .unwrap();
    store
        .add_way(WayId(1), vec![NodeId(2), NodeId(3)], [("highway", "primary")])
        .unwrap();
    Arc::new(store)
}

fn tile_at(zoom: u8) -> TileId {
    let (x, y) = lon_lat_to_tile(10.0, 10.0, zoom);
    TileId::new(zoom, x, y, TileFormat::Png)
}

fn config(meta_tile_size: u32) -> CoordinatorConfig {
    CoordinatorConfig {
        meta_tile_size,
        max_running_jobs: 4,
        ..CoordinatorConfig::default()
    }
}

/// Scene backend that counts calls, sleeps and optionally fails.
#[derive(Default)]
struct TestBackend {
    delay: Duration,
    fail: bool,
    panic: bool,
    calls: AtomicUsize,
    active: AtomicUsize,
    peak: AtomicUsize,
}

impl TestBackend {
    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl DrawingBackend for TestBackend {
    fn draw(&self, request: &DrawRequest<'_>) -> Result<Vec<u8>, RenderError> {
        let _ = self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        let _ = self.peak.fetch_max(running, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        let _ = self.active.fetch_sub(1, Ordering::SeqCst);
        if self.panic {
            panic!("brush snapped");
        }
        if self.fail {
            return Err(RenderError::Backend("out of ink".to_string()));
        }
        SceneBackend::default().draw(request)
    }
}

fn coordinator(config: CoordinatorConfig, backend: Arc<TestBackend>) -> Coordinator {
    let coordinator = Coordinator::new(config, store(), backend).unwrap();
    coordinator.reload_stylesheet(STYLE).unwrap();
    coordinator
}

async fn request_many(
    coordinator: &Coordinator,
    tiles: Vec<TileId>,
) -> Vec<Result<bytes::Bytes, TileError>> {
    let handles: Vec<_> = tiles
        .into_iter()
        .map(|tile| {
            let coordinator = coordinator.clone();
            tokio::spawn(async move { coordinator.request_tile(tile, None).await })
        })
        .collect();
    let mut results = Vec::new();
    for handle in handles {
        results.push(handle.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread")]
async fn test_concurrent_requests_render_once() {
    let backend = TestBackend::slow(Duration::from_millis(100));
    let coordinator = coordinator(config(1), Arc::clone(&backend));
    let tile = tile_at(12);

    let results = request_many(&coordinator, vec![tile; 8]).await;
    assert_eq!(backend.calls(), 1);
    let first = results[0].as_ref().unwrap();
    assert!(results.iter().all(|result| result.as_ref() == Ok(first)));

    let stats = coordinator.stats();
    assert_eq!(stats.requests, 8);
    assert_eq!(stats.jobs_started, 1);
    assert_eq!(stats.jobs_completed, 1);
    assert_eq!(stats.draw_calls, 1);
    assert_eq!(stats.coalesced + stats.cache_hits, 7);
    assert_eq!(coordinator.jobs_in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_one_job_per_meta_tile() {
    let backend = TestBackend::slow(Duration::from_millis(50));
    let coordinator = coordinator(config(2), Arc::clone(&backend));
    let meta = MetaId::for_tile(&tile_at(12), 2);

    let results = request_many(&coordinator, meta.members()).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(coordinator.stats().jobs_started, 1);
    assert_eq!(backend.calls(), 4);
    assert_eq!(coordinator.cached_tiles(), 4);

    // Every member is now served from the cache.
    for tile in meta.members() {
        assert!(coordinator.request_tile(tile, None).await.is_ok());
    }
    assert_eq!(backend.calls(), 4);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_failure_fans_out() {
    let backend = Arc::new(TestBackend {
        delay: Duration::from_millis(100),
        fail: true,
        ..TestBackend::default()
    });
    let coordinator = coordinator(config(1), Arc::clone(&backend));

    let results = request_many(&coordinator, vec![tile_at(12); 6]).await;
    assert_eq!(backend.calls(), 1);
    for result in results {
        assert_eq!(
            result,
            Err(TileError::Render(RenderError::Backend("out of ink".to_string())))
        );
    }
    assert_eq!(coordinator.cached_tiles(), 0);
    assert_eq!(coordinator.stats().jobs_failed, 1);
    assert_eq!(coordinator.jobs_in_flight(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_worker_panic_is_reported() {
    let backend = Arc::new(TestBackend {
        panic: true,
        ..TestBackend::default()
    });
    let coordinator = coordinator(config(1), backend);
    let err = coordinator.request_tile(tile_at(8), None).await.unwrap_err();
    assert!(
        matches!(err, TileError::Render(RenderError::WorkerPanicked(_))),
        "{err:?}"
    );
    assert_eq!(coordinator.cached_tiles(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timeout_releases_only_that_waiter() {
    let backend = TestBackend::slow(Duration::from_millis(300));
    let coordinator = coordinator(config(1), Arc::clone(&backend));
    let tile = tile_at(12);

    let impatient = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move {
            coordinator
                .request_tile(tile, Some(Duration::from_millis(20)))
                .await
        })
    };
    let patient = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.request_tile(tile, None).await })
    };

    assert_eq!(
        impatient.await.unwrap(),
        Err(TileError::Timeout(TimeoutError(Duration::from_millis(20))))
    );
    assert!(patient.await.unwrap().is_ok());
    assert_eq!(backend.calls(), 1);
    assert_eq!(coordinator.stats().timeouts, 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_timed_out_job_still_fills_cache() {
    let backend = TestBackend::slow(Duration::from_millis(100));
    let coordinator = coordinator(config(1), Arc::clone(&backend));
    let tile = tile_at(12);

    let err = coordinator
        .request_tile(tile, Some(Duration::from_millis(10)))
        .await
        .unwrap_err();
    assert!(matches!(err, TileError::Timeout(_)));

    for _ in 0..50 {
        if coordinator.cached_tiles() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(coordinator.cached_tiles(), 1);
    assert!(coordinator.request_tile(tile, None).await.is_ok());
    assert_eq!(backend.calls(), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_admission_bound() {
    let backend = TestBackend::slow(Duration::from_millis(30));
    let config = CoordinatorConfig {
        meta_tile_size: 1,
        max_running_jobs: 1,
        ..CoordinatorConfig::default()
    };
    let coordinator = coordinator(config, Arc::clone(&backend));
    let tiles: Vec<TileId> = (0..4).map(|x| TileId::new(3, x, 3, TileFormat::Png)).collect();

    let results = request_many(&coordinator, tiles).await;
    assert!(results.iter().all(Result::is_ok));
    assert_eq!(coordinator.stats().jobs_started, 4);
    assert_eq!(backend.peak.load(Ordering::SeqCst), 1);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_invalid_tile_is_lookup_error() {
    let coordinator = coordinator(config(4), TestBackend::slow(Duration::ZERO));
    assert_eq!(
        coordinator
            .request_tile(TileId::new(19, 0, 0, TileFormat::Png), None)
            .await,
        Err(TileError::Lookup(LookupError::ZoomOutOfRange(19)))
    );
    assert_eq!(
        coordinator
            .request_tile(TileId::new(2, 0, 4, TileFormat::Png), None)
            .await,
        Err(TileError::Lookup(LookupError::OutOfRange { zoom: 2, x: 0, y: 4 }))
    );
    assert_eq!(coordinator.stats().jobs_started, 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_scene_lists_styled_objects() {
    let coordinator = coordinator(config(4), TestBackend::slow(Duration::ZERO));
    let tile = tile_at(8);
    let bytes = coordinator.request_tile(tile, None).await.unwrap();
    let scene: serde_json::Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(scene["tile"], tile.to_string());
    assert_eq!(scene["canvas"]["fill-color"], "#f2efe9");
    let ids: Vec<&str> = scene["objects"]
        .as_array()
        .unwrap()
        .iter()
        .map(|object| object["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["node/1", "way/1"]);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reload_stylesheet_bumps_generation() {
    let backend = TestBackend::slow(Duration::ZERO);
    let coordinator = coordinator(config(1), Arc::clone(&backend));
    let tile = tile_at(12);
    let generation = coordinator.generation();

    let before = coordinator.request_tile(tile, None).await.unwrap();
    coordinator
        .reload_stylesheet(r#"node[amenity] { icon-image: "tea.png" }"#)
        .unwrap();
    assert_eq!(coordinator.generation(), generation + 1);

    let after = coordinator.request_tile(tile, None).await.unwrap();
    assert_ne!(before, after);
    assert_eq!(coordinator.stats().stale_misses, 1);
    assert_eq!(backend.calls(), 2);

    // A broken stylesheet leaves everything as it was.
    assert!(coordinator.reload_stylesheet("way { width: }").is_err());
    assert_eq!(coordinator.generation(), generation + 1);
    assert_eq!(coordinator.request_tile(tile, None).await.unwrap(), after);
}

fn icon_of(bytes: &[u8]) -> String {
    let scene: serde_json::Value = serde_json::from_slice(bytes).unwrap();
    scene["objects"][0]["attributes"]["icon-path"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reload_during_render_serves_new_style() {
    let backend = TestBackend::slow(Duration::from_millis(400));
    let coordinator = coordinator(config(1), Arc::clone(&backend));
    let tile = tile_at(12);

    let early = {
        let coordinator = coordinator.clone();
        tokio::spawn(async move { coordinator.request_tile(tile, None).await })
    };
    while backend.active.load(Ordering::SeqCst) == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    coordinator
        .reload_stylesheet(r#"node[amenity] { icon-image: "tea.png" }"#)
        .unwrap();

    let late = coordinator.request_tile(tile, None).await.unwrap();
    assert_eq!(icon_of(&late), "tea.png");
    assert_eq!(icon_of(&early.await.unwrap().unwrap()), "cafe.png");
    assert_eq!(coordinator.stats().jobs_started, 2);
    assert_eq!(coordinator.stats().coalesced, 0);

    // Whichever job finished last, the cache holds the new tile.
    let cached = coordinator.request_tile(tile, None).await.unwrap();
    assert_eq!(icon_of(&cached), "tea.png");
    assert_eq!(backend.calls(), 2);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_reload_data_swaps_store_and_index() {
    let coordinator = coordinator(config(1), TestBackend::slow(Duration::ZERO));
    let tile = tile_at(12);
    let generation = coordinator.generation();

    let mut replacement = MemoryStore::new();
    replacement
        .add_node(NodeId(7), Location { lon: 10.0, lat: 10.0 }, [("amenity", "bench")])
        .unwrap();
    coordinator.reload_data(Arc::new(replacement)).unwrap();
    assert_eq!(coordinator.generation(), generation + 1);
    assert_eq!(coordinator.context().index.len(), 1);

    let bytes = coordinator.request_tile(tile, None).await.unwrap();
    let scene: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(scene["objects"][0]["id"], "node/7");
    assert_eq!(scene["objects"][0]["attributes"]["icon-path"], "cafe.png");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_prerender_descends_where_styled() {
    let backend = TestBackend::slow(Duration::ZERO);
    let config = CoordinatorConfig {
        tile_overlap: 0.0,
        ..config(1)
    };
    let coordinator = coordinator(config, Arc::clone(&backend));
    let world = MetaId::for_tile(&TileId::new(0, 0, 0, TileFormat::Png), 1);

    // One block at zoom 0, then the four children of the single styled
    // block at each of zooms 1, 2 and 3.
    let rendered = coordinator.prerender(world, 3).await.unwrap();
    assert_eq!(rendered, 13);
    assert_eq!(backend.calls(), 13);
    assert!(
        coordinator
            .request_tile(tile_at(3), None)
            .await
            .is_ok()
    );
    assert_eq!(backend.calls(), 13);

    coordinator.reload_stylesheet("relation { width: 1 }").unwrap();
    assert_eq!(coordinator.prerender(world, 3).await.unwrap(), 1);
}

#[test]
fn test_config_validation() {
    let build = |config: CoordinatorConfig| {
        Coordinator::new(config, store(), Arc::new(SceneBackend::default())).map(|_| ())
    };
    assert_eq!(
        build(CoordinatorConfig {
            max_running_jobs: 0,
            ..CoordinatorConfig::default()
        }),
        Err(ConfigError::Capacity(CapacityError::ZeroRunningJobs))
    );
    assert_eq!(
        build(CoordinatorConfig {
            cache: CacheConfig {
                max_entries: 0,
                max_bytes: None,
            },
            ..CoordinatorConfig::default()
        }),
        Err(ConfigError::Capacity(CapacityError::ZeroCacheCapacity))
    );
    assert_eq!(
        build(CoordinatorConfig {
            meta_tile_size: 0,
            ..CoordinatorConfig::default()
        }),
        Err(ConfigError::Capacity(CapacityError::MetaTileSize { size: 0, max: 64 }))
    );
    assert_eq!(
        build(CoordinatorConfig {
            tile_overlap: -0.5,
            ..CoordinatorConfig::default()
        }),
        Err(ConfigError::Capacity(CapacityError::InvalidOverlap(-0.5)))
    );
    assert_eq!(
        build(CoordinatorConfig {
            index: IndexParams {
                min_children: 5,
                max_children: 8,
                leaf_capacity: 16,
            },
            ..CoordinatorConfig::default()
        }),
        Err(ConfigError::Index(IndexError::Fanout { min: 5, max: 8 }))
    );
    assert!(build(CoordinatorConfig::default()).is_ok());
}
