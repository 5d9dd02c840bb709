//! Tests for the LRU cache
//!
//! These tests verify:
//! - Basic get/insert semantics
//! - The capacity bound is enforced
//! - Eviction order follows recency of both reads and writes
//! - A zero capacity disables caching

use segkv::cache::{CacheStats, LruCache};

#[test]
fn test_get_missing() {
    let mut cache = LruCache::new(4);
    assert_eq!(cache.get("nope"), None);
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn test_insert_and_get() {
    let mut cache = LruCache::new(4);
    cache.insert("k", "v");

    assert_eq!(cache.get("k"), Some("v".to_string()));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn test_insert_replaces_value() {
    let mut cache = LruCache::new(4);
    cache.insert("k", "v1");
    cache.insert("k", "v2");

    assert_eq!(cache.get("k"), Some("v2".to_string()));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_empty_value_is_cached() {
    let mut cache = LruCache::new(4);
    cache.insert("k", "");
    assert_eq!(cache.get("k"), Some(String::new()));
}

#[test]
fn test_capacity_is_enforced() {
    let mut cache = LruCache::new(3);
    for i in 0..100 {
        cache.insert(&format!("key{}", i), "v");
        assert!(cache.len() <= 3);
    }

    assert_eq!(cache.len(), 3);
    assert_eq!(cache.stats().evictions, 97);
    assert!(cache.contains("key99"));
    assert!(cache.contains("key98"));
    assert!(cache.contains("key97"));
    assert!(!cache.contains("key0"));
}

#[test]
fn test_evicts_least_recently_used() {
    let mut cache = LruCache::new(2);
    cache.insert("a", "1");
    cache.insert("b", "2");

    // Touch "a" so "b" becomes the oldest
    assert!(cache.get("a").is_some());
    cache.insert("c", "3");

    assert!(cache.contains("a"));
    assert!(!cache.contains("b"));
    assert!(cache.contains("c"));
}

#[test]
fn test_overwrite_refreshes_recency() {
    let mut cache = LruCache::new(2);
    cache.insert("a", "1");
    cache.insert("b", "2");
    cache.insert("a", "1b");
    cache.insert("c", "3");

    assert_eq!(cache.get("a"), Some("1b".to_string()));
    assert!(!cache.contains("b"));
}

#[test]
fn test_zero_capacity_disables_cache() {
    let mut cache = LruCache::new(0);
    cache.insert("a", "1");

    assert!(cache.is_empty());
    assert_eq!(cache.get("a"), None);
    assert_eq!(cache.capacity(), 0);
}

#[test]
fn test_clear_keeps_stats() {
    let mut cache = LruCache::new(2);
    cache.insert("a", "1");
    cache.get("a");
    cache.clear();

    assert!(cache.is_empty());
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 0,
            evictions: 0
        }
    );
}
