use super::*;
use std::time::Duration;
use tokio::time::advance;

#[tokio::test(start_paused = true)]
async fn get_returns_value_before_expiry() {
    let mut cache = RemoteCache::new(Duration::from_secs(10));
    cache.set("wallets", 7u32);

    advance(Duration::from_secs(9)).await;
    assert_eq!(cache.get("wallets"), Some(7));
    assert!(cache.has("wallets"));
}

#[tokio::test(start_paused = true)]
async fn entry_expires_exactly_at_deadline() {
    let mut cache = RemoteCache::new(Duration::from_secs(10));
    cache.set("wallets", 7u32);

    advance(Duration::from_secs(10)).await;
    assert_eq!(cache.get("wallets"), None);
    assert!(cache.is_empty(), "expired entry is evicted on read");
}

#[tokio::test(start_paused = true)]
async fn reads_do_not_extend_lifetime() {
    let mut cache = RemoteCache::new(Duration::from_secs(10));
    cache.set("k", "v".to_string());

    for _ in 0..4 {
        advance(Duration::from_secs(2)).await;
        assert!(cache.get("k").is_some());
    }
    advance(Duration::from_secs(2)).await;
    assert!(cache.get("k").is_none());
}

#[tokio::test(start_paused = true)]
async fn set_with_ttl_overrides_default() {
    let mut cache = RemoteCache::new(DEFAULT_TTL);
    cache.set_with_ttl("short", 1u8, Duration::from_millis(50));
    cache.set("long", 2u8);

    advance(Duration::from_millis(60)).await;
    assert!(!cache.has("short"));
    assert!(cache.has("long"));
}

#[tokio::test(start_paused = true)]
async fn set_replaces_and_restarts_lifetime() {
    let mut cache = RemoteCache::new(Duration::from_secs(10));
    cache.set("k", 1u8);
    advance(Duration::from_secs(8)).await;
    cache.set("k", 2u8);
    advance(Duration::from_secs(8)).await;

    assert_eq!(cache.get("k"), Some(2));
    let entry = cache.entry("k").unwrap();
    assert_eq!(entry.expires_at() - entry.created_at(), Duration::from_secs(10));
}

#[test]
fn missing_key_is_a_miss_not_an_error() {
    let mut cache: RemoteCache<u8> = RemoteCache::default();
    assert_eq!(cache.get("nothing"), None);
    assert!(!cache.has("nothing"));
    cache.delete("nothing");
}

#[test]
fn delete_and_clear_remove_entries() {
    let mut cache = RemoteCache::default();
    cache.set("a", 1u8);
    cache.set("b", 2u8);

    cache.delete("a");
    assert_eq!(cache.len(), 1);

    cache.clear();
    assert!(cache.is_empty());
}

#[test]
fn clear_advances_generation_and_blocks_stale_writes() {
    let mut cache = RemoteCache::default();
    let before = cache.generation();

    assert!(cache.set_if_current("wallets", 1u8, before));
    cache.clear();
    assert_eq!(cache.generation(), before + 1);

    assert!(!cache.set_if_current("wallets", 2u8, before));
    assert!(!cache.has("wallets"));

    assert!(cache.set_if_current("wallets", 3u8, cache.generation()));
    assert_eq!(cache.get("wallets"), Some(3));
}

#[tokio::test(start_paused = true)]
async fn stats_report_remaining_ttl_sorted_by_key() {
    let mut cache = RemoteCache::new(Duration::from_secs(300));
    cache.set("wallets", 1u8);
    cache.set_with_ttl("packages", 2u8, Duration::from_secs(1));

    advance(Duration::from_secs(2)).await;
    let stats = cache.stats();

    assert_eq!(stats.entry_count, 2);
    assert_eq!(stats.entries[0].key, "packages");
    assert!(stats.entries[0].expired);
    assert_eq!(stats.entries[0].remaining_ttl_ms, 0);
    assert_eq!(stats.entries[1].key, "wallets");
    assert!(!stats.entries[1].expired);
    assert_eq!(stats.entries[1].remaining_ttl_ms, 298_000);
}
