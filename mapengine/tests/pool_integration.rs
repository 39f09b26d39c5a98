//! Integration tests for the connection pool under concurrency.
//!
//! These tests verify:
//! - Counts stay consistent with many threads acquiring, releasing and
//!   reclaiming at once
//! - Reclamation only ever closes unreferenced entries
//! - Shared entries survive until the last holder lets go
//! - Connection policies and deadlines

use mapengine::backend::{ConnectionKey, ConnectionKind, ConnectionPolicy, Dataset, MemoryBackend};
use mapengine::context::{ConcurrentMapContext, ContextConfig, EngineServices};
use mapengine::definition::{LayerDefinition, LayerKind, MapDefinition};
use mapengine::geometry::{Point, ShapeKind};
use mapengine::log::NoOpLogger;
use mapengine::pool::{ConnectionLease, ConnectionPool, PoolError};
use std::sync::{Arc, Barrier};
use std::time::{Duration, Instant};

// =============================================================================
// Test Helpers
// =============================================================================

const KEYS: usize = 8;

fn key(i: usize) -> ConnectionKey {
    ConnectionKey::new(ConnectionKind::Local, &format!("data/layer{}", i))
}

fn backend() -> Arc<MemoryBackend> {
    let backend = Arc::new(MemoryBackend::new());
    for i in 0..KEYS {
        let fid = i.to_string();
        backend.register(
            key(i),
            Dataset::new(ShapeKind::Point, &["FID"])
                .with_feature(vec![Point::new(i as f64, i as f64)], &[fid.as_str()]),
        );
    }
    backend
}

fn pool(backend: &Arc<MemoryBackend>) -> ConnectionPool {
    ConnectionPool::new(backend.clone(), Arc::new(NoOpLogger))
}

// =============================================================================
// Stress
// =============================================================================

#[test]
fn test_stress_acquire_release_reclaim() {
    const THREADS: usize = 50;
    const CYCLES: usize = 1000;
    const HOLDERS: usize = 3;

    let backend = backend();
    let pool = pool(&backend);
    let barrier = Barrier::new(THREADS);

    let held: Vec<ConnectionLease> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let pool = pool.clone();
                let barrier = &barrier;
                s.spawn(move || {
                    barrier.wait();
                    for c in 0..CYCLES {
                        let lease = pool.acquire(&key((t + c) % KEYS)).unwrap();
                        let count = lease
                            .with_connection(|conn| conn.feature_count().map_err(PoolError::from))
                            .unwrap();
                        assert_eq!(count, 1);
                        lease.release().unwrap();

                        if c % 100 == 0 {
                            pool.reclaim_unreferenced();
                        }
                    }
                    (t < HOLDERS).then(|| pool.acquire(&key(t)).unwrap())
                })
            })
            .collect();

        handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .collect()
    });

    pool.reclaim_unreferenced();

    // Exactly the entries still referenced remain, each with one holder.
    let expected: Vec<ConnectionKey> = (0..HOLDERS).map(key).collect();
    assert_eq!(pool.keys(), expected);
    for k in &expected {
        assert_eq!(pool.ref_count(k), Some(1));
    }
    assert_eq!(backend.open_count(), HOLDERS);

    drop(held);
    assert_eq!(pool.reclaim_unreferenced(), HOLDERS);
    assert!(pool.is_empty());
    assert_eq!(backend.open_count(), 0);
    assert_eq!(backend.double_close_count(), 0);

    let stats = pool.stats();
    assert_eq!(stats.outstanding(), 0);
    assert_eq!(stats.acquires, (THREADS * CYCLES + HOLDERS) as u64);
    assert_eq!(stats.open_connections(), 0);
}

// =============================================================================
// Sharing across contexts
// =============================================================================

#[test]
fn test_ten_contexts_share_one_connection() {
    let layer = LayerDefinition::new("POINT", LayerKind::Point, ConnectionKind::Local, "data/layer0");
    let definition = Arc::new(MapDefinition::new("shared").with_layer(layer));
    let backend = backend();
    let pool = pool(&backend);
    let services = EngineServices::new(pool.clone(), Arc::new(NoOpLogger));

    let mut contexts: Vec<ConcurrentMapContext> = (0..10)
        .map(|_| {
            let context = ConcurrentMapContext::from_definition(
                Arc::clone(&definition),
                services.clone(),
                ContextConfig::default(),
            )
            .unwrap();
            context.open_layer("POINT").unwrap();
            context
        })
        .collect();

    assert_eq!(pool.len(), 1);
    assert_eq!(pool.ref_count(&key(0)), Some(10));
    assert_eq!(backend.connect_count(), 1);

    let last = contexts.pop().unwrap();
    for context in contexts {
        assert!(context.teardown().is_clean());
    }
    assert_eq!(pool.reclaim_unreferenced(), 0);
    assert_eq!(pool.ref_count(&key(0)), Some(1));

    last.teardown();
    assert_eq!(pool.reclaim_unreferenced(), 1);
    assert!(pool.is_empty());
    assert_eq!(backend.close_count(), 1);
}

// =============================================================================
// Policies and deadlines
// =============================================================================

#[test]
fn test_deferred_entries_are_reclaimed_once_unreferenced() {
    let backend = backend();
    let pool = pool(&backend);

    let first = pool
        .acquire_with_policy(&key(1), ConnectionPolicy::Defer)
        .unwrap();
    let second = pool.acquire(&key(1)).unwrap();
    first.release().unwrap();

    assert_eq!(pool.reclaim_unreferenced(), 0);
    assert_eq!(pool.ref_count(&key(1)), Some(1));

    second.release().unwrap();
    assert_eq!(pool.reclaim_unreferenced(), 1);
    assert!(pool.is_empty());

    let report = pool.shutdown();
    assert!(report.is_clean());
    assert_eq!(report.closed, 0);
    assert_eq!(backend.open_count(), 0);
}

#[test]
fn test_always_policy_never_shares() {
    let backend = backend();
    let pool = pool(&backend);

    let a = pool
        .acquire_with_policy(&key(2), ConnectionPolicy::Always)
        .unwrap();
    let b = pool
        .acquire_with_policy(&key(2), ConnectionPolicy::Always)
        .unwrap();
    assert_ne!(a.entry_id(), b.entry_id());
    assert_eq!(backend.open_count(), 2);
    assert!(!pool.contains(&key(2)));

    drop(a);
    drop(b);
    assert_eq!(backend.open_count(), 0);
}

#[test]
fn test_deadline_expiry_releases_partial_acquisition() {
    let backend = backend();
    backend.set_connect_delay(Duration::from_millis(50));
    let pool = pool(&backend);

    let deadline = Instant::now() + Duration::from_millis(5);
    let err = pool
        .acquire_with_deadline(&key(3), ConnectionPolicy::Normal, Some(deadline))
        .unwrap_err();
    assert!(matches!(err, PoolError::Timeout { .. }));
    assert_eq!(pool.ref_count(&key(3)), Some(0));
    assert_eq!(pool.stats().timeouts, 1);

    assert_eq!(pool.reclaim_unreferenced(), 1);
    assert_eq!(backend.open_count(), 0);
}

#[test]
fn test_leases_released_on_other_threads() {
    let backend = backend();
    let pool = pool(&backend);

    let leases: Vec<ConnectionLease> = (0..4).map(|_| pool.acquire(&key(4)).unwrap()).collect();
    assert_eq!(pool.ref_count(&key(4)), Some(4));

    std::thread::scope(|s| {
        for lease in leases {
            s.spawn(move || lease.release().unwrap());
        }
    });

    assert_eq!(pool.ref_count(&key(4)), Some(0));
    assert_eq!(pool.reclaim_unreferenced(), 1);
}
