//! Integration Tests for Cache Behavior
//!
//! End-to-end checks of the public cache contract: memoization, expiry,
//! eviction, tag invalidation, single-flight and persistence.

use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::sleep;
use std::time::Duration;

use mini_memo::{
    cache::TagSet, CacheConfig, CacheInstance, EvictionStrategy, LoadOutcome, RemovalCause,
    StaleReason,
};
use parking_lot::Mutex;

// == Helper Functions ==

fn k(s: &str) -> String {
    s.to_string()
}

fn key_set(cache: &CacheInstance<String, u32>) -> BTreeSet<String> {
    cache.keys().into_iter().collect()
}

fn expected(keys: &[&str]) -> BTreeSet<String> {
    keys.iter().map(|s| s.to_string()).collect()
}

fn tags(list: &[&str]) -> TagSet {
    list.iter().map(|s| s.to_string()).collect()
}

// == Hit/Miss ==

#[test]
fn test_compute_runs_once_per_key() {
    let cache: CacheInstance<String, u32> = CacheInstance::new(CacheConfig::default()).unwrap();
    let first_calls = AtomicUsize::new(0);
    let second_calls = AtomicUsize::new(0);

    let value = cache
        .get_or_compute(k("answer"), || {
            first_calls.fetch_add(1, Ordering::SeqCst);
            Ok(42)
        })
        .unwrap();
    assert_eq!(value, 42);

    let value = cache
        .get_or_compute(k("answer"), || {
            second_calls.fetch_add(1, Ordering::SeqCst);
            Ok(7)
        })
        .unwrap();
    assert_eq!(value, 42);

    assert_eq!(first_calls.load(Ordering::SeqCst), 1);
    assert_eq!(second_calls.load(Ordering::SeqCst), 0);
    assert_eq!(cache.stats().hits, 1);
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn test_failed_compute_is_not_cached() {
    let cache: CacheInstance<String, u32> = CacheInstance::new(CacheConfig::default()).unwrap();

    let result = cache.get_or_compute(k("flaky"), || Err(anyhow::anyhow!("backend down")));
    assert!(result.is_err());
    assert!(!cache.contains_key(&k("flaky")));

    assert_eq!(cache.get_or_compute(k("flaky"), || Ok(5)).unwrap(), 5);
}

#[test]
fn test_compute_runs_without_holding_the_cache() {
    let cache: CacheInstance<String, u32> =
        CacheInstance::new(CacheConfig::default().with_capacity(4)).unwrap();
    cache.put(k("base"), 40);

    let value = cache
        .get_or_compute(k("derived"), || {
            let base = cache.get(&k("base")).unwrap_or(0);
            cache.put(k("side"), 1);
            Ok(base + 2)
        })
        .unwrap();

    assert_eq!(value, 42);
    assert_eq!(key_set(&cache), expected(&["base", "derived", "side"]));
}

// == TTL ==

#[test]
fn test_ttl_expiry() {
    let cache: CacheInstance<String, u32> =
        CacheInstance::new(CacheConfig::default().with_ttl(Duration::from_millis(100))).unwrap();
    let calls = AtomicUsize::new(0);
    let compute = || {
        calls.fetch_add(1, Ordering::SeqCst);
        Ok(1)
    };

    cache.get_or_compute(k("a"), compute).unwrap();
    cache.get_or_compute(k("a"), compute).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    sleep(Duration::from_millis(200));
    cache.get_or_compute(k("a"), compute).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn test_sliding_ttl_keeps_accessed_entries_alive() {
    let cache: CacheInstance<String, u32> = CacheInstance::new(
        CacheConfig::default()
            .with_ttl(Duration::from_millis(200))
            .with_refresh_ttl_on_access(true),
    )
    .unwrap();
    cache.put(k("session"), 1);

    sleep(Duration::from_millis(150));
    assert_eq!(cache.get(&k("session")), Some(1));
    sleep(Duration::from_millis(150));
    assert_eq!(cache.get(&k("session")), Some(1));
    sleep(Duration::from_millis(150));

    // 450ms after creation, 150ms after the last access.
    assert_eq!(cache.get(&k("session")), Some(1));

    sleep(Duration::from_millis(300));
    assert_eq!(cache.get(&k("session")), None);
}

#[test]
fn test_fixed_ttl_ignores_access() {
    let cache: CacheInstance<String, u32> =
        CacheInstance::new(CacheConfig::default().with_ttl(Duration::from_millis(200))).unwrap();
    cache.put(k("a"), 1);

    sleep(Duration::from_millis(150));
    assert_eq!(cache.get(&k("a")), Some(1));
    sleep(Duration::from_millis(150));
    assert_eq!(cache.get(&k("a")), None);
}

// == Eviction ==

#[test]
fn test_lru_eviction_order() {
    let cache: CacheInstance<String, u32> =
        CacheInstance::new(CacheConfig::default().with_capacity(3)).unwrap();
    cache.put(k("A"), 1);
    cache.put(k("B"), 2);
    cache.put(k("C"), 3);
    cache.get(&k("A"));
    cache.put(k("D"), 4);

    assert_eq!(key_set(&cache), expected(&["D", "A", "C"]));
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn test_fifo_eviction_order() {
    let cache: CacheInstance<String, u32> = CacheInstance::new(
        CacheConfig::default()
            .with_capacity(3)
            .with_eviction_strategy(EvictionStrategy::Fifo),
    )
    .unwrap();
    cache.put(k("A"), 1);
    cache.put(k("B"), 2);
    cache.put(k("C"), 3);
    cache.get(&k("A"));
    cache.put(k("D"), 4);

    assert_eq!(key_set(&cache), expected(&["D", "B", "C"]));
}

#[test]
fn test_lfu_evicts_least_used_then_oldest() {
    let cache: CacheInstance<String, u32> = CacheInstance::new(
        CacheConfig::default()
            .with_capacity(3)
            .with_eviction_strategy(EvictionStrategy::Lfu),
    )
    .unwrap();
    cache.put(k("A"), 1);
    cache.put(k("B"), 2);
    cache.put(k("C"), 3);
    cache.get(&k("A"));
    cache.get(&k("C"));

    cache.put(k("D"), 4);
    assert_eq!(key_set(&cache), expected(&["A", "C", "D"]));

    // D is the only key left at count 1.
    cache.put(k("E"), 5);
    assert_eq!(key_set(&cache), expected(&["A", "C", "E"]));
}

#[test]
fn test_eviction_fires_hook_after_lock_release() {
    let removed: Arc<Mutex<Vec<(String, RemovalCause)>>> = Arc::new(Mutex::new(Vec::new()));
    let cache: Arc<Mutex<Option<CacheInstance<String, u32>>>> = Arc::new(Mutex::new(None));

    let log = removed.clone();
    let handle = cache.clone();
    let instance: CacheInstance<String, u32> = CacheInstance::new(
        CacheConfig::default()
            .with_capacity(1)
            .with_expiration_hook(move |key: &String, _, cause| {
                log.lock().push((key.clone(), cause));
                // Re-entering the cache from a hook must not deadlock.
                if let Some(c) = handle.lock().as_ref() {
                    let _ = c.len();
                }
            }),
    )
    .unwrap();
    *cache.lock() = Some(instance.clone());

    instance.put(k("a"), 1);
    instance.put(k("b"), 2);
    instance.invalidate(&k("b"));

    assert_eq!(
        *removed.lock(),
        vec![
            (k("a"), RemovalCause::Evicted),
            (k("b"), RemovalCause::Invalidated)
        ]
    );
}

// == Tags ==

fn tagged_cache() -> CacheInstance<String, u32> {
    CacheInstance::new(CacheConfig::default().with_tags_fn(|key: &String, _: &u32| {
        match key.as_str() {
            "one" => tags(&["t1"]),
            "both" => tags(&["t1", "t2"]),
            _ => TagSet::new(),
        }
    }))
    .unwrap()
}

#[test]
fn test_tag_invalidation_or() {
    let cache = tagged_cache();
    cache.put(k("one"), 1);
    cache.put(k("both"), 2);
    cache.put(k("plain"), 3);

    assert_eq!(cache.invalidate_by_tags(&["t1", "t2"], false).unwrap(), 2);
    assert_eq!(key_set(&cache), expected(&["plain"]));
}

#[test]
fn test_tag_invalidation_and() {
    let cache = tagged_cache();
    cache.put(k("one"), 1);
    cache.put(k("both"), 2);

    assert_eq!(cache.invalidate_by_tags(&["t1", "t2"], true).unwrap(), 1);
    assert_eq!(key_set(&cache), expected(&["one"]));
}

#[test]
fn test_tag_invalidation_requires_tags() {
    let cache = tagged_cache();
    let none: [&str; 0] = [];
    assert!(cache.invalidate_by_tags(&none, false).is_err());
}

// == Versioning and Dirty Entries ==

#[test]
fn test_version_change_invalidates_entries() {
    let version = Arc::new(Mutex::new("v1".to_string()));
    let supplier = version.clone();
    let reasons: Arc<Mutex<Vec<RemovalCause>>> = Arc::new(Mutex::new(Vec::new()));
    let log = reasons.clone();

    let cache: CacheInstance<String, u32> = CacheInstance::new(
        CacheConfig::default()
            .with_version_supplier(move || supplier.lock().clone())
            .with_expiration_hook(move |_: &String, _, cause| log.lock().push(cause)),
    )
    .unwrap();

    cache.put(k("a"), 1);
    assert_eq!(cache.get(&k("a")), Some(1));

    *version.lock() = "v2".to_string();
    assert_eq!(cache.get(&k("a")), None);
    assert_eq!(
        *reasons.lock(),
        vec![RemovalCause::Expired(StaleReason::VersionMismatch)]
    );
}

#[test]
fn test_predicate_rejects_values() {
    let cache: CacheInstance<String, u32> =
        CacheInstance::new(CacheConfig::default().with_predicate(|v: &u32| *v > 0)).unwrap();

    assert_eq!(cache.get_or_compute(k("zero"), || Ok(0)).unwrap(), 0);
    assert!(!cache.contains_key(&k("zero")));
    assert_eq!(cache.stats().rejections, 1);
}

// == Single-Flight ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_flight_deduplicates_concurrent_misses() {
    let cache: CacheInstance<String, u32> = CacheInstance::new(CacheConfig::default()).unwrap();
    let calls = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..5 {
        let cache = cache.clone();
        let calls = calls.clone();
        handles.push(tokio::spawn(async move {
            cache
                .get_or_compute_async(k("slow"), move || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(100)).await;
                    Ok(99)
                })
                .await
        }));
    }

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), 99);
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(!cache.is_computing(&k("slow")));
    assert_eq!(cache.get(&k("slow")), Some(99));
}

#[tokio::test]
async fn test_single_flight_failure_reaches_every_waiter() {
    let cache: CacheInstance<String, u32> = CacheInstance::new(CacheConfig::default()).unwrap();

    let make = |cache: CacheInstance<String, u32>| async move {
        cache
            .get_or_compute_async(k("broken"), || async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                Err(anyhow::anyhow!("upstream failed"))
            })
            .await
    };
    let (a, b) = tokio::join!(make(cache.clone()), make(cache.clone()));

    assert!(a.is_err());
    assert!(b.is_err());
    assert!(!cache.contains_key(&k("broken")));
    assert!(!cache.is_computing(&k("broken")));
}

// == Persistence ==

#[test]
fn test_round_trip_restores_keys_values_and_tags() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state").join("cache.json");
    let config = || {
        CacheConfig::default()
            .with_capacity(3)
            .with_file_path(path.clone())
            .with_tags_fn(|key: &String, _: &u32| tags(&[format!("len:{}", key.len()).as_str()]))
    };

    let original: CacheInstance<String, u32> = CacheInstance::new(config()).unwrap();
    original.put(k("a"), 1);
    original.put(k("bb"), 2);
    original.put(k("ccc"), 3);
    original.get(&k("a"));
    original.save().unwrap();

    let restored: CacheInstance<String, u32> = CacheInstance::new(config()).unwrap();
    assert!(matches!(
        restored.load().unwrap(),
        LoadOutcome::Loaded { entries: 3, .. }
    ));

    assert_eq!(key_set(&restored), key_set(&original));
    for key in original.keys() {
        assert_eq!(
            restored.peek(&key).map(|e| e.data),
            original.peek(&key).map(|e| e.data)
        );
        assert_eq!(restored.tags_of(&key), original.tags_of(&key));
    }

    // Recency survives: "bb" is least recently used in both.
    original.put(k("dddd"), 4);
    restored.put(k("dddd"), 4);
    assert_eq!(key_set(&restored), key_set(&original));
    assert!(!restored.contains_key(&k("bb")));
}

#[test]
fn test_interrupted_write_leaves_previous_file_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let cache: CacheInstance<String, u32> =
        CacheInstance::new(CacheConfig::default().with_file_path(path.clone())).unwrap();
    cache.put(k("stable"), 1);
    cache.save().unwrap();

    // A writer killed before its rename leaves only a stray temp file behind.
    std::fs::write(dir.path().join(".tmpPARTIAL"), b"{\"metadata\": {\"fileF").unwrap();

    let restored: CacheInstance<String, u32> =
        CacheInstance::new(CacheConfig::default().with_file_path(path)).unwrap();
    assert!(matches!(
        restored.load().unwrap(),
        LoadOutcome::Loaded { entries: 1, .. }
    ));
    assert_eq!(restored.get(&k("stable")), Some(1));
}

#[test]
fn test_readers_never_observe_partial_files() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.json");
    let cache: CacheInstance<String, u32> =
        CacheInstance::new(CacheConfig::default().with_file_path(path.clone())).unwrap();
    for i in 0..200 {
        cache.put(format!("key-{}", i), i);
    }
    cache.save().unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let writer = {
        let cache = cache.clone();
        let done = done.clone();
        std::thread::spawn(move || {
            for round in 0..50u32 {
                cache.put(k("round"), round);
                cache.save().unwrap();
            }
            done.store(true, Ordering::SeqCst);
        })
    };

    loop {
        let finished = done.load(Ordering::SeqCst);
        let bytes = std::fs::read(&path).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&bytes).expect("cache file must always be complete JSON");
        assert!(json["entries"].as_object().unwrap().len() >= 200);
        if finished {
            break;
        }
    }
    writer.join().unwrap();
}
