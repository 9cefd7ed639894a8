//! End-to-end behavior of the engine, read policy and orchestrator over
//! in-process stores

mod support;

use mirrorcache::cache::{CacheState, CacheStateManager, ChunkWriter, ReadSource};
use mirrorcache::config::ResourceConfig;
use mirrorcache::engine::{
    quiet, BackgroundPool, Orchestrator, ProgressStatus, ResourceProgress,
};
use mirrorcache::error::MirrorError;
use mirrorcache::events::EventLog;
use mirrorcache::lock::DistributedLock;
use mirrorcache::resource::ResourceSet;
use mirrorcache::service::{MirrorService, ReadQuery};
use mirrorcache::store::{FileStore, KvStore, MemoryStore};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::{engine, fast_settings, resource, resource_with, Gate, ScriptedScanner};
use tempfile::TempDir;
use tokio::task::JoinSet;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

#[tokio::test]
async fn interrupted_scan_resumes_without_refetching_pages() {
    let memory = Arc::new(MemoryStore::new());
    let scanner = Arc::new(ScriptedScanner::new(10).failing_once_at(6));
    let engine = engine(memory.clone(), scanner.clone());
    let orders = resource("orders", 3);

    let first = engine.run(&orders, &quiet).await;
    assert_eq!(first.status, ProgressStatus::Error);
    assert_eq!(first.count(), 6);
    assert!(memory.contains(&orders.keys().position()));

    let second = engine.run(&orders, &quiet).await;
    assert!(second.is_complete());
    assert_eq!(second.count(), 10);
    assert_eq!(scanner.requested(), vec![0, 3, 6, 6, 9]);

    let ids: Vec<u64> = second
        .records
        .iter()
        .map(|r| r["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, (0..10).collect::<Vec<_>>());
}

#[tokio::test]
async fn three_hundred_records_land_in_a_week_long_snapshot() {
    let memory = Arc::new(MemoryStore::new());
    let scanner = Arc::new(ScriptedScanner::new(300));
    let engine = engine(memory.clone(), scanner.clone());
    let orders = resource("orders", 100);
    let reader = CacheStateManager::new(engine.clone(), Arc::new(BackgroundPool::new(1)));

    let cold = reader.read(&orders).await;
    assert_eq!(cold.source, ReadSource::Inline);
    assert!(cold.is_complete);
    assert_eq!(cold.records.len(), 300);
    assert_eq!(scanner.requested(), vec![0, 100, 200]);

    assert!(!memory.contains(&orders.keys().position()));
    let ttl = memory.ttl(&orders.keys().complete()).unwrap();
    assert!(ttl > 6 * DAY && ttl <= 7 * DAY);

    let warm = reader.read(&orders).await;
    assert_eq!(warm.source, ReadSource::Complete);
    assert_eq!(warm.records.len(), 300);
    assert_eq!(scanner.requested().len(), 3);
}

#[tokio::test]
async fn completion_clears_resumable_state() {
    let memory = Arc::new(MemoryStore::new());
    let engine = engine(memory.clone(), Arc::new(ScriptedScanner::new(7)));
    let pins = resource("pins", 2);

    engine.run(&pins, &quiet).await.into_result().unwrap();

    let keys = pins.keys();
    assert!(memory.contains(&keys.complete()));
    assert!(!memory.contains(&keys.partial()));
    assert!(!memory.contains(&keys.position()));
    assert!(!memory.contains(&keys.lock()));
    assert_eq!(
        engine.snapshots().state(&pins).await.unwrap(),
        CacheState::Complete
    );
}

#[tokio::test]
async fn partial_read_returns_at_once_and_continues_in_background() {
    let memory = Arc::new(MemoryStore::new());
    let designs = resource("designs", 2);

    // Leave a two-record partial behind
    let broken = engine(memory.clone(), Arc::new(ScriptedScanner::new(6).failing_once_at(2)));
    assert_eq!(broken.run(&designs, &quiet).await.count(), 2);

    let gate = Gate::new();
    let scanner = Arc::new(ScriptedScanner::new(6).gated(gate.clone()));
    let engine = engine(memory.clone(), scanner);
    let pool = Arc::new(BackgroundPool::new(2));
    let reader = CacheStateManager::new(engine.clone(), pool.clone());

    let read = tokio::time::timeout(Duration::from_secs(5), reader.read(&designs))
        .await
        .expect("partial read must not wait for the scan");
    assert_eq!(read.source, ReadSource::Partial);
    assert!(!read.is_complete);
    assert_eq!(read.records.len(), 2);
    assert_eq!(pool.stats().running, 1);

    // The continuation holds the lock, so a second read does not start another
    let again = reader.read(&designs).await;
    assert_eq!(again.source, ReadSource::Partial);
    assert_eq!(pool.stats().submitted, 1);

    gate.open();
    pool.drain().await;

    let done = reader.read(&designs).await;
    assert_eq!(done.source, ReadSource::Complete);
    assert_eq!(done.records.len(), 6);
    assert_eq!(pool.stats().completed, 1);
}

#[tokio::test]
async fn contended_miss_serves_empty_instead_of_waiting() {
    let memory = Arc::new(MemoryStore::new());
    let boards = resource("boards", 5);
    let engine = engine(memory.clone(), Arc::new(ScriptedScanner::new(5)));

    let other = DistributedLock::new(memory.clone(), Duration::from_secs(300));
    assert!(other.acquire(&boards, 1, Duration::ZERO).await);

    let reader = CacheStateManager::new(engine, Arc::new(BackgroundPool::new(1)));
    let read = reader.read(&boards).await;
    assert_eq!(read.source, ReadSource::Pending);
    assert!(read.records.is_empty());
    assert!(!read.is_complete);

    other.release(&boards).await;
}

#[tokio::test]
async fn pause_is_reported_and_scan_resumes_after() {
    let memory = Arc::new(MemoryStore::new());
    let products = resource("products", 2);
    let scanner = Arc::new(ScriptedScanner::new(6).pausing(memory.clone(), &products));
    let engine = engine(memory.clone(), scanner.clone());
    let orchestrator = Orchestrator::new(engine.clone());

    let report = orchestrator.run_all(&[&products], false, &quiet).await;
    let summary = report.get("products").unwrap();
    assert_eq!(summary.status, ProgressStatus::Paused);
    assert_eq!(summary.count, 2);
    assert!(memory.contains(&products.keys().position()));
    assert!(!report.all_complete());
    assert_eq!(report.failed().count(), 0);

    engine.pause_control().resume(&products).await.unwrap();
    let report = orchestrator.run_all(&[&products], false, &quiet).await;
    assert!(report.all_complete());
    assert_eq!(report.get("products").unwrap().count, 6);
    assert_eq!(scanner.requested(), vec![0, 2, 4]);
}

#[tokio::test]
async fn progress_is_monotonic_and_never_early_complete() {
    let memory = Arc::new(MemoryStore::new());
    let engine = engine(memory, Arc::new(ScriptedScanner::new(9)));
    let orders = resource_with(ResourceConfig {
        page_size: 2,
        estimated_total: Some(9),
        ..ResourceConfig::new("orders", "orders")
    });

    let seen: Mutex<Vec<ResourceProgress>> = Mutex::new(Vec::new());
    let observer = |p: &ResourceProgress| seen.lock().unwrap().push(p.clone());
    engine.run(&orders, &observer).await;

    let seen = seen.into_inner().unwrap();
    let (last, updates) = seen.split_last().unwrap();
    assert_eq!(last.status, ProgressStatus::Complete);
    assert_eq!(last.percent, 100);
    assert_eq!(last.count, 9);

    for pair in seen.windows(2) {
        assert!(pair[0].count <= pair[1].count);
        assert!(pair[0].percent <= pair[1].percent);
    }
    for update in updates {
        assert_eq!(update.status, ProgressStatus::Fetching);
        assert!(update.percent < 100);
    }
}

#[tokio::test]
async fn exactly_one_concurrent_acquirer_wins() {
    let memory: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let orders = resource("orders", 10);

    let mut attempts = JoinSet::new();
    for _ in 0..8 {
        let lock = DistributedLock::new(memory.clone(), Duration::from_secs(60));
        let orders = orders.clone();
        attempts.spawn(async move { lock.acquire(&orders, 1, Duration::ZERO).await });
    }

    let mut winners = 0;
    while let Some(won) = attempts.join_next().await {
        if won.unwrap() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1);
}

#[tokio::test]
async fn stale_lock_is_taken_over() {
    let memory: Arc<dyn KvStore> = Arc::new(MemoryStore::new());
    let orders = resource("orders", 10);
    let lifetime = Duration::from_millis(50);

    let crashed = DistributedLock::new(memory.clone(), lifetime);
    let runner = DistributedLock::new(memory.clone(), lifetime);
    assert!(crashed.acquire(&orders, 1, Duration::ZERO).await);
    assert!(!runner.try_acquire(&orders).await);

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(runner.acquire(&orders, 1, Duration::ZERO).await);
    assert_eq!(runner.holder(&orders).await.unwrap().owner, runner.owner());
    assert!(!crashed.renew(&orders).await);
}

#[tokio::test]
async fn failing_resource_does_not_stop_siblings() {
    let memory = Arc::new(MemoryStore::new());
    let engine = engine(memory, Arc::new(ScriptedScanner::new(4).breaking("products")));
    let orders = resource("orders", 2);
    let products = resource("products", 2);
    let pins = resource("pins", 2);

    let report = Orchestrator::new(engine)
        .run_all(&[&orders, &products, &pins], false, &quiet)
        .await;

    assert_eq!(report.get("orders").unwrap().status, ProgressStatus::Complete);
    assert_eq!(report.get("pins").unwrap().status, ProgressStatus::Complete);
    let failed: Vec<_> = report.failed().map(|s| s.name.as_str()).collect();
    assert_eq!(failed, vec!["products"]);
    assert!(report.get("products").unwrap().error.is_some());
}

#[tokio::test]
async fn chunks_continue_across_resumes() {
    let memory = Arc::new(MemoryStore::new());
    let scanner = Arc::new(ScriptedScanner::new(10).failing_once_at(6));
    let engine = engine(memory.clone(), scanner);
    let orders = resource_with(ResourceConfig {
        page_size: 3,
        chunk_size: Some(4),
        ..ResourceConfig::new("orders", "orders")
    });

    engine.run(&orders, &quiet).await;
    let manifest = ChunkWriter::manifest_of(&*memory, &orders).await.unwrap().unwrap();
    assert_eq!((manifest.chunks, manifest.records), (2, 6));

    engine.run(&orders, &quiet).await.into_result().unwrap();
    let manifest = ChunkWriter::manifest_of(&*memory, &orders).await.unwrap().unwrap();
    assert_eq!((manifest.chunks, manifest.records), (3, 10));
    for index in 0..3 {
        assert!(memory.contains(&orders.keys().chunk(index)));
    }
    assert!(!memory.contains(&orders.keys().chunk(3)));
}

#[tokio::test]
async fn pool_rejects_when_saturated_and_counts_failures() {
    let pool = BackgroundPool::new(1);
    let gate = Gate::new();

    let held = gate.clone();
    assert!(pool.submit("slow", async move {
        held.wait().await;
        Ok(())
    }));
    assert!(!pool.submit("overflow", async { Ok(()) }));
    assert_eq!(pool.stats().rejected, 1);

    gate.open();
    pool.drain().await;

    assert!(pool.submit("broken", async {
        Err(MirrorError::scan("orders", "throttled"))
    }));
    pool.drain().await;

    let stats = pool.stats();
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.failed, 1);
    assert_eq!(stats.running, 0);
    assert_eq!(stats.last_failure.unwrap().label, "broken");
}

async fn file_service(dir: &TempDir, total: usize) -> MirrorService {
    let config = ResourceConfig {
        page_size: 2,
        ..ResourceConfig::new("designs", "designs")
    };
    MirrorService::new(
        ResourceSet::new(vec![resource_with(config)]),
        Arc::new(FileStore::open(dir.path().to_path_buf()).await.unwrap()),
        Arc::new(ScriptedScanner::new(total)),
        fast_settings(),
        EventLog::disabled(),
    )
}

#[tokio::test]
async fn invalidation_is_idempotent_on_the_file_store() {
    let dir = TempDir::new().unwrap();
    let service = file_service(&dir, 5).await;

    let first = service.read_page("designs", &ReadQuery::default()).await.unwrap();
    assert!(first.is_complete);
    assert_eq!(first.total, 5);

    service.invalidate("designs").await.unwrap();
    service.invalidate("designs").await.unwrap();
    assert_eq!(service.status().await.unwrap()[0].cache, CacheState::Absent);

    let again = service.read_page("designs", &ReadQuery::default()).await.unwrap();
    assert!(again.is_complete);
    assert_eq!(again.items, first.items);
    service.shutdown().await;
}

#[tokio::test]
async fn cursor_walks_the_whole_snapshot() {
    let dir = TempDir::new().unwrap();
    let service = file_service(&dir, 11).await;

    let mut items = Vec::new();
    let mut cursor = None;
    let mut pages = 0;
    loop {
        let page = service
            .read_page("designs", &ReadQuery::page(3, cursor))
            .await
            .unwrap();
        assert_eq!(page.total, 11);
        items.extend(page.items);
        pages += 1;
        match page.last_evaluated_key {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 4);
    let ids: Vec<u64> = items.iter().map(|r| r["id"].as_u64().unwrap()).collect();
    assert_eq!(ids, (0..11).collect::<Vec<_>>());
}
