use std::sync::Arc;
use std::thread;

use gcglib::cache::{Cache, CacheError};

#[test]
fn evicts_least_recently_used_first() {
    let cache = Cache::new(10).expect("positive budget");
    cache.insert("a", 1, 4).expect("fits");
    cache.insert("b", 2, 4).expect("fits");
    // Touch "a" so "b" becomes the oldest entry.
    assert_eq!(cache.get(&"a"), Some(1));

    cache.insert("c", 3, 4).expect("fits after eviction");
    assert!(cache.contains(&"a"));
    assert!(!cache.contains(&"b"));
    assert!(cache.contains(&"c"));
    assert_eq!(cache.total_cost(), 8);
}

#[test]
fn large_entry_evicts_several() {
    let cache = Cache::new(10).expect("positive budget");
    for key in 0..5u32 {
        cache.insert(key, key * 10, 2).expect("fits");
    }
    assert_eq!(cache.total_cost(), 10);

    cache.insert(99, 990, 7).expect("fits after eviction");
    assert_eq!(cache.total_cost(), 9);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.get(&4), Some(40));
    assert_eq!(cache.get(&0), None);
}

#[test]
fn oversized_entry_is_rejected_without_eviction() {
    let cache = Cache::new(5).expect("positive budget");
    cache.insert(1, "one", 3).expect("fits");
    let err = cache.insert(2, "two", 6).expect_err("too costly");
    assert!(matches!(err, CacheError::TooCostly { cost: 6, max_cost: 5 }));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.total_cost(), 3);
}

#[test]
fn replacing_a_key_updates_its_cost() {
    let cache = Cache::new(10).expect("positive budget");
    assert_eq!(cache.insert("k", 1, 6).expect("fits"), None);
    assert_eq!(cache.insert("k", 2, 2).expect("fits"), Some(1));
    assert_eq!(cache.total_cost(), 2);
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
    assert_eq!(cache.total_cost(), 0);
}

#[test]
fn shared_between_threads() {
    let cache = Arc::new(Cache::new(1000).expect("positive budget"));
    let workers: Vec<_> = (0..4u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..100 {
                    cache.insert(t * 1000 + i, i, 1).expect("fits");
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker finishes");
    }
    assert_eq!(cache.len(), 400);
    assert_eq!(cache.total_cost(), 400);
    assert_eq!(cache.get(&3042), Some(42));
}
