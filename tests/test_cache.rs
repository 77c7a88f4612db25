//! Integration Test: result cache and key normalization

use medisearch::cache::{cache_key, cache_key_bounded, normalize_query, CacheManager};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);

#[test]
fn test_query_variants_share_a_key() {
    let variants = ["Triệu chứng sốt?", "TRIỆU CHỨNG SỐT", "triệu   chứng   sốt!!!"];
    let keys: Vec<String> = variants
        .iter()
        .map(|q| cache_key("search", q, &[("n_results", "10".to_string())]))
        .collect();

    assert!(keys.iter().all(|k| k == "search:triệu_chứng_sốt:n_results=10"));

    // Normalizing twice changes nothing
    let once = normalize_query("  Đau   ĐẦU, chóng mặt!! ");
    assert_eq!(normalize_query(&once), once);
}

#[test]
fn test_long_queries_are_hashed() {
    let long_query = "đau bụng dữ dội kèm sốt cao ".repeat(20);
    let key = cache_key("response", &long_query, &[]);

    let digest = key.strip_prefix("response:").unwrap();
    assert_eq!(digest.len(), 64);
    assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    assert_eq!(key, cache_key("response", &long_query.to_uppercase(), &[]));

    let short = cache_key_bounded("search", "ho", &[], 200);
    assert_eq!(short, "search:ho");
}

#[test]
fn test_cached_value_roundtrip_through_normalized_key() {
    let cache: CacheManager<Vec<String>> = CacheManager::new(8);
    let value = vec!["sot-xuat-huyet".to_string(), "cum".to_string()];

    cache.set(cache_key("search", "Sốt cao?", &[]), value.clone(), HOUR);

    assert_eq!(cache.get(&cache_key("search", "sốt   CAO", &[])), Some(value));
    assert_eq!(cache.get(&cache_key("search", "sốt nhẹ", &[])), None);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_rate, 0.5);
}

#[test]
fn test_expired_entry_counts_one_miss_then_absent() {
    let cache = CacheManager::new(8);
    cache.set("k", 42, Duration::from_millis(30));
    assert_eq!(cache.get("k"), Some(42));

    thread::sleep(Duration::from_millis(80));

    assert_eq!(cache.get("k"), None);
    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.size, 0);

    // Entry is gone, so the next lookup is a plain miss
    assert_eq!(cache.get("k"), None);
    assert_eq!(cache.stats().misses, 2);
}

#[test]
fn test_capacity_never_exceeded() {
    let cache = CacheManager::new(5);
    for i in 0..50 {
        cache.set(format!("k{i}"), i, HOUR);
        assert!(cache.len() <= 5);
    }

    let stats = cache.stats();
    assert_eq!(stats.size, 5);
    assert_eq!(stats.evictions, 45);
    // Most recent five survive
    for i in 45..50 {
        assert_eq!(cache.get(&format!("k{i}")), Some(i));
    }
}

#[test]
fn test_parallel_writers_and_readers() {
    let cache = Arc::new(CacheManager::new(64));

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for i in 0..200 {
                    let key = format!("t{t}-{}", i % 10);
                    cache.set(key.clone(), i, HOUR);
                    assert!(cache.get(&key).is_some());
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let stats = cache.stats();
    assert_eq!(stats.size, 40);
    assert_eq!(stats.hits, 800);
    assert_eq!(stats.evictions, 0);
}
