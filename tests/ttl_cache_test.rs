//! Tests for [`TtlCache`]: expiry, LRU eviction, statistics and sweeping.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use ollama_relay::cache::{CacheConfig, TtlCache};

fn cache(max: usize) -> TtlCache<String> {
    TtlCache::new(
        "test",
        CacheConfig::new()
            .max_size(max)
            .default_ttl(Duration::from_secs(60))
            .cleanup_interval(Duration::from_secs(10)),
    )
}

#[test]
fn miss_on_unknown_key() {
    let c = cache(10);
    assert!(c.get("nonexistent").is_none());
    let stats = c.stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 0);
}

#[test]
fn fresh_cache_reports_zero_hit_rate() {
    let stats = cache(10).stats();
    assert_eq!(stats.hit_rate, 0.0);
    assert_eq!(stats.size, 0);
    assert_eq!(stats.max_size, 10);
    assert_eq!(stats.default_ttl_secs, 60.0);
    assert_eq!(stats.cleanup_interval_secs, 10.0);
}

#[test]
fn hit_rate_tracks_lookups() {
    let c = cache(10);
    c.set("k", "v".to_string());
    c.get("k");
    c.get("k");
    c.get("k");
    c.get("missing");
    let stats = c.stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.misses, 1);
    assert!((stats.hit_rate - 0.75).abs() < f64::EPSILON);
}

#[tokio::test(start_paused = true)]
async fn oldest_untouched_key_is_evicted_at_capacity() {
    let c: TtlCache<i32> = TtlCache::new(
        "scenario",
        CacheConfig::new()
            .max_size(2)
            .default_ttl(Duration::from_secs(60)),
    );
    c.set("a", 1);
    c.set("b", 2);
    c.set("c", 3);

    assert_eq!(c.get("a"), None);
    assert_eq!(c.get("b"), Some(2));
    assert_eq!(c.get("c"), Some(3));
    assert_eq!(c.stats().evictions, 1);
}

#[tokio::test(start_paused = true)]
async fn least_recently_accessed_is_evicted() {
    let c = cache(2);
    c.set("a", "1".to_string());
    c.set("b", "2".to_string());
    assert_eq!(c.get("a").as_deref(), Some("1"));
    c.set("c", "3".to_string());

    assert!(c.get("b").is_none());
    assert_eq!(c.get("a").as_deref(), Some("1"));
    assert_eq!(c.get("c").as_deref(), Some("3"));
    assert_eq!(c.stats().evictions, 1);
}

#[tokio::test(start_paused = true)]
async fn one_insert_past_capacity_evicts_exactly_one() {
    let c = cache(5);
    for i in 0..6 {
        c.set(format!("k{i}"), i.to_string());
    }
    let stats = c.stats();
    assert_eq!(stats.evictions, 1);
    assert_eq!(stats.size, 5);
    assert!(c.get("k0").is_none(), "oldest untouched key goes first");
}

#[tokio::test(start_paused = true)]
async fn size_never_exceeds_capacity() {
    let c = cache(3);
    for i in 0..50 {
        c.set(format!("k{i}"), i.to_string());
        if i % 3 == 0 {
            c.get(&format!("k{}", i / 2));
        }
        assert!(c.len() <= 3);
    }
    assert_eq!(c.stats().evictions, 47);
}

#[tokio::test(start_paused = true)]
async fn expired_entry_counts_expiration_and_miss() {
    let c = cache(10);
    c.set_with_ttl("short", "v".to_string(), Duration::from_secs(1));
    tokio::time::advance(Duration::from_millis(1500)).await;

    assert!(c.get("short").is_none());
    let stats = c.stats();
    assert_eq!(stats.expirations, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 0);
}

#[tokio::test(start_paused = true)]
async fn per_entry_ttl_overrides_default() {
    let c = cache(10);
    c.set("default", "a".to_string());
    c.set_with_ttl("long", "b".to_string(), Duration::from_secs(600));

    tokio::time::advance(Duration::from_secs(120)).await;
    assert!(c.get("default").is_none());
    assert_eq!(c.get("long").as_deref(), Some("b"));
}

#[tokio::test(start_paused = true)]
async fn access_does_not_extend_ttl() {
    let c = cache(10);
    c.set("k", "v".to_string());
    for _ in 0..5 {
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(c.get("k").is_some());
    }
    tokio::time::advance(Duration::from_secs(6)).await;
    assert!(c.get("k").is_none());
}

#[tokio::test(start_paused = true)]
async fn access_metadata_is_tracked() {
    let c = cache(10);
    c.set("k", "v".to_string());
    let created = c.entry("k").unwrap().created_at;

    tokio::time::advance(Duration::from_secs(5)).await;
    c.get("k");
    c.get("k");

    let meta = c.entry("k").unwrap();
    assert_eq!(meta.access_count, 2);
    assert_eq!(meta.created_at, created);
    assert_eq!(meta.last_accessed.duration_since(created), Duration::from_secs(5));
    assert_eq!(meta.ttl, Duration::from_secs(60));
    assert!(meta.tag.is_none());
}

#[test]
fn clear_counts_evictions_once() {
    let c = cache(10);
    c.set("a", "1".to_string());
    c.set("b", "2".to_string());
    c.set("c", "3".to_string());

    c.clear();
    assert_eq!(c.stats().evictions, 3);
    assert!(c.is_empty());

    c.clear();
    assert_eq!(c.stats().evictions, 3);
}

#[tokio::test(start_paused = true)]
async fn purge_expired_counts_each_entry() {
    let c = cache(10);
    c.set_with_ttl("a", "1".to_string(), Duration::from_secs(5));
    c.set_with_ttl("b", "2".to_string(), Duration::from_secs(5));
    c.set_with_ttl("c", "3".to_string(), Duration::from_secs(500));

    assert_eq!(c.purge_expired(), 0);
    tokio::time::advance(Duration::from_secs(6)).await;
    assert_eq!(c.purge_expired(), 2);

    let stats = c.stats();
    assert_eq!(stats.expirations, 2);
    assert_eq!(stats.size, 1);
    // Purging does not count as a lookup
    assert_eq!(stats.misses, 0);
}

#[tokio::test(start_paused = true)]
async fn sweeper_purges_without_reads() {
    let c = Arc::new(cache(10));
    let token = CancellationToken::new();
    let sweeper = c.spawn_sweeper(token.clone());

    c.set_with_ttl("a", "1".to_string(), Duration::from_secs(15));
    c.set_with_ttl("b", "2".to_string(), Duration::from_secs(300));

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(c.len(), 1);
    assert_eq!(c.stats().expirations, 1);

    token.cancel();
    sweeper.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn cancelled_sweeper_stops_purging() {
    let c = Arc::new(cache(10));
    let token = CancellationToken::new();
    let sweeper = c.spawn_sweeper(token.clone());

    token.cancel();
    sweeper.await.unwrap();

    c.set_with_ttl("a", "1".to_string(), Duration::from_secs(1));
    tokio::time::sleep(Duration::from_secs(30)).await;
    // Still held until read
    assert_eq!(c.len(), 1);
    assert!(c.get("a").is_none());
}

#[tokio::test(start_paused = true)]
async fn sweeper_ends_when_cache_dropped() {
    let c = Arc::new(cache(10));
    let sweeper = c.spawn_sweeper(CancellationToken::new());
    drop(c);
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert!(sweeper.is_finished());
}

#[test]
fn thread_safety() {
    use std::thread;

    let c = Arc::new(cache(64));
    let mut handles = Vec::new();

    for t in 0..4 {
        let c = Arc::clone(&c);
        handles.push(thread::spawn(move || {
            for i in 0..100 {
                let key = format!("t{t}-k{}", i % 20);
                c.set(key.clone(), i.to_string());
                c.get(&key);
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    let stats = c.stats();
    assert!(stats.size <= 64);
    assert_eq!(stats.hits + stats.misses, 400);
}
