use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Barrier;

use super::*;

fn value(cache: &LruCache<u32, String>, key: u32) -> CacheEntry<String> {
    cache.get_or_compute(&key, &CancelToken::new(), || Ok(format!("v{key}")))
}

#[test]
fn hit_returns_the_same_arc() {
    let cache = LruCache::new(4);
    let a = value(&cache, 1);
    let b = cache.get_or_compute(&1, &CancelToken::new(), || -> MediaResult<String> {
        panic!("must not recompute")
    });
    assert!(Arc::ptr_eq(a.value().unwrap(), b.value().unwrap()));
    assert_eq!(cache.len(), 1);
}

#[test]
fn least_recently_used_entry_is_evicted_first() {
    let cache = LruCache::new(2);
    value(&cache, 1);
    value(&cache, 2);
    value(&cache, 1);
    value(&cache, 3);
    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&1));
    assert!(!cache.contains(&2));
    assert!(cache.contains(&3));
}

#[test]
fn peek_neither_computes_nor_refreshes() {
    let cache = LruCache::new(2);
    assert!(cache.peek(&1).is_none());
    assert!(cache.is_empty());
    value(&cache, 1);
    value(&cache, 2);
    assert_eq!(cache.peek(&1).unwrap().value().unwrap().as_str(), "v1");
    value(&cache, 3);
    assert!(cache.peek(&1).is_none());
    assert!(cache.contains(&2));
}

#[test]
fn len_never_exceeds_capacity() {
    let cache = LruCache::new(3);
    for key in 0..20 {
        value(&cache, key);
        assert!(cache.len() <= 3);
    }
    cache.set_capacity(1);
    assert_eq!(cache.len(), 1);
    assert!(cache.contains(&19));
    assert_eq!(cache.capacity(), 1);
}

#[test]
fn errors_are_cached_until_erased() {
    let cache: LruCache<u32, String> = LruCache::new(4);
    let calls = AtomicUsize::new(0);
    let failing = || {
        calls.fetch_add(1, Ordering::SeqCst);
        Err(MediaError::decode("boom"))
    };
    let first = cache.get_or_compute(&7, &CancelToken::new(), failing);
    assert!(matches!(first.error(), Some(MediaError::Decode(m)) if m == "boom"));
    let second = cache.get_or_compute(&7, &CancelToken::new(), failing);
    assert!(second.is_error());
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    cache.erase(&7);
    cache.get_or_compute(&7, &CancelToken::new(), failing);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn cancelled_computations_are_not_cached() {
    let cache: LruCache<u32, String> = LruCache::new(4);
    let entry = cache.get_or_compute(&1, &CancelToken::new(), || Err(MediaError::Cancelled));
    assert!(entry.is_cancelled());
    assert!(cache.is_empty());
    assert!(!value(&cache, 1).is_error());
}

#[test]
fn concurrent_callers_share_one_computation() {
    let cache: LruCache<u32, String> = LruCache::new(4);
    let calls = AtomicUsize::new(0);
    let threads = 8;
    let barrier = Barrier::new(threads);
    let entries: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..threads)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    cache.get_or_compute(&42, &CancelToken::new(), || {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(Duration::from_millis(50));
                        Ok("answer".to_string())
                    })
                })
            })
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    let first = entries[0].value().unwrap();
    for e in &entries {
        assert!(Arc::ptr_eq(first, e.value().unwrap()));
    }
}

#[test]
fn waiter_stops_waiting_when_cancelled() {
    let cache: LruCache<u32, String> = LruCache::new(4);
    let started = Barrier::new(2);
    let release = Barrier::new(2);
    std::thread::scope(|s| {
        let worker = s.spawn(|| {
            cache.get_or_compute(&1, &CancelToken::new(), || {
                started.wait();
                release.wait();
                Ok("late".to_string())
            })
        });
        started.wait();

        let cancel = CancelToken::new();
        cancel.cancel();
        let entry = cache.get_or_compute(&1, &cancel, || -> MediaResult<String> {
            panic!("waiter must not compute")
        });
        assert!(entry.is_cancelled());

        release.wait();
        assert!(!worker.join().unwrap().is_error());
    });
    assert!(cache.contains(&1));
}

#[test]
fn waiters_retry_after_an_abandoned_computation() {
    let cache: LruCache<u32, String> = LruCache::new(4);
    let started = Barrier::new(2);
    std::thread::scope(|s| {
        let worker = s.spawn(|| {
            cache.get_or_compute(&1, &CancelToken::new(), || {
                started.wait();
                std::thread::sleep(Duration::from_millis(50));
                Err(MediaError::Cancelled)
            })
        });
        started.wait();
        let entry = value(&cache, 1);
        assert_eq!(entry.value().map(|v| v.as_str()), Some("v1"));
        assert!(worker.join().unwrap().is_error());
    });
}

#[test]
fn panicking_computation_releases_the_key() {
    let cache: LruCache<u32, String> = LruCache::new(4);
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        cache.get_or_compute(&1, &CancelToken::new(), || -> MediaResult<String> {
            panic!("compute failed hard")
        })
    }));
    assert!(result.is_err());
    assert!(!value(&cache, 1).is_error());
}

#[test]
fn erase_where_and_clear() {
    let cache = LruCache::new(8);
    for key in 0..6 {
        value(&cache, key);
    }
    cache.erase_where(|k| k % 2 == 0);
    assert_eq!(cache.len(), 3);
    assert!(cache.contains(&1));
    assert!(!cache.contains(&2));
    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn into_result_maps_errors() {
    let ok: CacheEntry<u8> = CacheEntry::Value(Arc::new(3));
    assert_eq!(*ok.into_result().unwrap(), 3);
    let err: CacheEntry<u8> = CacheEntry::from_error(MediaError::open("bad"));
    assert!(matches!(err.into_result(), Err(MediaError::Open(m)) if m == "bad"));
    let range: CacheEntry<u8> = CacheEntry::from_error(MediaError::OutOfRange {
        frame: 9,
        frame_count: 4,
    });
    let msg = range.into_result().unwrap_err().to_string();
    assert_eq!(msg, "frame 9 is out of range (stream has 4 frames)");
}

#[test]
fn cancelled_entry_is_recognisable() {
    assert!(CacheEntry::<u8>::cancelled().is_cancelled());
    assert!(!CacheEntry::<u8>::from_error(MediaError::decode("x")).is_cancelled());
    // A message that merely reads like cancellation is still a decode error.
    let lookalike = CacheEntry::<u8>::from_error(MediaError::decode("operation cancelled"));
    assert!(!lookalike.is_cancelled());
    assert!(!CacheEntry::Value(Arc::new(1u8)).is_cancelled());
}
