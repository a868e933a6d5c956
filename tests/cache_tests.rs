//! Enrichment cache integration tests.
//!
//! Exercises the freshness, idempotency, access-tracking, sweep and stats
//! behavior against a real (in-memory or temp-file) SQLite store. Entries
//! are backdated by writing rows through the store handle directly, then
//! read back through the cache under test.

use chrono::{Duration, Utc};
use std::sync::Arc;
use vuln_triage::enrichment::{CallSource, EnrichmentCache, EpssRow, KevRow, Store};

// ============================================================================
// Helpers
// ============================================================================

fn store_and_cache() -> (Arc<Store>, EnrichmentCache) {
    let store = Arc::new(Store::open_in_memory().unwrap());
    let cache = EnrichmentCache::new(Arc::clone(&store));
    (store, cache)
}

/// Insert an EPSS entry whose `cached_at` lies `age` in the past.
fn backdate_epss(store: &Store, cve_id: &str, age: Duration) {
    let at = Utc::now() - age;
    store
        .upsert_epss(&EpssRow {
            cve_id: cve_id.to_string(),
            epss_score: 0.42,
            percentile: 90.0,
            model_version: "v1".to_string(),
            score_date: "2024-01-01".to_string(),
            cached_at: at,
            last_accessed: at,
        })
        .unwrap();
}

/// Insert a KEV entry whose `cached_at` lies `age` in the past.
fn backdate_kev(store: &Store, cve_id: &str, age: Duration) {
    let at = Utc::now() - age;
    store
        .upsert_kev(&KevRow {
            cve_id: cve_id.to_string(),
            vendor_project: "Vendor".to_string(),
            product: "Product".to_string(),
            vulnerability_name: "Name".to_string(),
            date_added: "2024-01-01".to_string(),
            short_description: "desc".to_string(),
            required_action: "patch".to_string(),
            due_date: "2024-02-01".to_string(),
            cached_at: at,
            last_accessed: at,
        })
        .unwrap();
}

// ============================================================================
// Freshness
// ============================================================================

#[test]
fn cache_miss_then_hit_within_window() {
    let (_store, cache) = store_and_cache();

    assert!(cache
        .get_epss("CVE-2024-0001", Duration::days(7))
        .unwrap()
        .is_none());

    cache
        .put_epss("CVE-2024-0001", 0.42, 90.0, "v1", "2024-01-01")
        .unwrap();

    let rec = cache
        .get_epss("CVE-2024-0001", Duration::days(7))
        .unwrap()
        .expect("entry cached moments ago must be fresh");
    assert_eq!(rec.epss_score, 0.42);
    assert_eq!(rec.percentile, 90.0);
    assert_eq!(rec.model_version, "v1");
    assert_eq!(rec.score_date, "2024-01-01");
}

#[test]
fn entry_past_max_age_is_absent() {
    let (store, cache) = store_and_cache();
    backdate_epss(&store, "CVE-2024-0001", Duration::days(7) + Duration::seconds(1));

    assert!(cache
        .get_epss("CVE-2024-0001", Duration::days(7))
        .unwrap()
        .is_none());
    // A longer window still sees it.
    assert!(cache
        .get_epss("CVE-2024-0001", Duration::days(8))
        .unwrap()
        .is_some());
}

#[test]
fn recent_access_does_not_revive_stale_entry() {
    let (store, cache) = store_and_cache();
    backdate_epss(&store, "CVE-2024-0001", Duration::hours(2));

    // Fresh under a 3h window; the hit bumps last_accessed to now.
    assert!(cache
        .get_epss("CVE-2024-0001", Duration::hours(3))
        .unwrap()
        .is_some());

    // Still stale under a 1h window: freshness keys on cached_at, and the
    // access bump above must not extend it.
    assert!(cache
        .get_epss("CVE-2024-0001", Duration::hours(1))
        .unwrap()
        .is_none());
}

#[test]
fn epss_and_kev_freshness_agree() {
    let (store, cache) = store_and_cache();
    let age = Duration::days(2);
    backdate_epss(&store, "CVE-2024-0001", age);
    backdate_kev(&store, "CVE-2024-0001", age);

    for window in [Duration::days(1), Duration::days(3)] {
        let epss_fresh = cache.get_epss("CVE-2024-0001", window).unwrap().is_some();
        let kev_fresh = cache.get_kev_membership("CVE-2024-0001", window).unwrap();
        assert_eq!(
            epss_fresh, kev_fresh,
            "EPSS and KEV freshness diverged at window {window}"
        );
    }
}

// ============================================================================
// Idempotent upsert
// ============================================================================

#[test]
fn repeated_identical_put_changes_only_timestamps() {
    let (store, cache) = store_and_cache();

    cache
        .put_epss("CVE-2024-0001", 0.42, 90.0, "v1", "2024-01-01")
        .unwrap();
    let first = store.get_epss("CVE-2024-0001").unwrap().unwrap();

    cache
        .put_epss("CVE-2024-0001", 0.42, 90.0, "v1", "2024-01-01")
        .unwrap();
    let second = store.get_epss("CVE-2024-0001").unwrap().unwrap();

    assert_eq!(first.epss_score, second.epss_score);
    assert_eq!(first.percentile, second.percentile);
    assert_eq!(first.model_version, second.model_version);
    assert_eq!(first.score_date, second.score_date);
    assert!(second.cached_at >= first.cached_at);
    assert_eq!(store.count_epss().unwrap(), 1);
}

#[test]
fn upsert_with_new_values_overwrites() {
    let (_store, cache) = store_and_cache();

    cache
        .put_epss("CVE-2024-0001", 0.42, 90.0, "v1", "2024-01-01")
        .unwrap();
    cache
        .put_epss("CVE-2024-0001", 0.55, 95.0, "v2", "2024-02-01")
        .unwrap();

    let rec = cache
        .get_epss("CVE-2024-0001", Duration::days(7))
        .unwrap()
        .unwrap();
    assert_eq!(rec.epss_score, 0.55);
    assert_eq!(rec.model_version, "v2");
}

// ============================================================================
// Access tracking isolation
// ============================================================================

#[test]
fn fresh_read_touches_last_accessed_but_not_cached_at() {
    let (store, cache) = store_and_cache();
    backdate_epss(&store, "CVE-2024-0001", Duration::hours(1));
    let before = store.get_epss("CVE-2024-0001").unwrap().unwrap();

    cache
        .get_epss("CVE-2024-0001", Duration::days(7))
        .unwrap()
        .unwrap();

    let after = store.get_epss("CVE-2024-0001").unwrap().unwrap();
    assert_eq!(after.cached_at, before.cached_at);
    assert!(after.last_accessed > before.last_accessed);
}

#[test]
fn stats_never_mutates_access_times() {
    let (store, cache) = store_and_cache();
    backdate_epss(&store, "CVE-2024-0001", Duration::hours(1));
    backdate_kev(&store, "CVE-2024-0002", Duration::hours(1));
    let epss_before = store.get_epss("CVE-2024-0001").unwrap().unwrap();
    let kev_before = store.get_kev("CVE-2024-0002").unwrap().unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.epss_entries, 1);
    assert_eq!(stats.kev_entries, 1);

    let epss_after = store.get_epss("CVE-2024-0001").unwrap().unwrap();
    let kev_after = store.get_kev("CVE-2024-0002").unwrap().unwrap();
    assert_eq!(epss_after.last_accessed, epss_before.last_accessed);
    assert_eq!(kev_after.last_accessed, kev_before.last_accessed);
}

#[test]
fn list_fresh_kev_ids_filters_and_does_not_touch() {
    let (store, cache) = store_and_cache();
    backdate_kev(&store, "CVE-2024-0001", Duration::hours(2));
    backdate_kev(&store, "CVE-2024-0002", Duration::days(3));
    let before = store.get_kev("CVE-2024-0001").unwrap().unwrap();

    let fresh = cache.list_fresh_kev_ids(Duration::days(1)).unwrap();
    assert!(fresh.contains("CVE-2024-0001"));
    assert!(!fresh.contains("CVE-2024-0002"));

    let after = store.get_kev("CVE-2024-0001").unwrap().unwrap();
    assert_eq!(after.last_accessed, before.last_accessed);
}

// ============================================================================
// Sweep
// ============================================================================

#[test]
fn sweep_deletes_expired_and_reports_counts() {
    let (store, cache) = store_and_cache();
    for id in ["CVE-2024-0001", "CVE-2024-0002", "CVE-2024-0003"] {
        backdate_epss(&store, id, Duration::days(10));
    }
    backdate_epss(&store, "CVE-2024-0004", Duration::days(2));
    backdate_kev(&store, "CVE-2024-0005", Duration::days(2));
    backdate_kev(&store, "CVE-2024-0006", Duration::hours(1));

    let report = cache.sweep(Duration::days(7), Duration::days(1)).unwrap();
    assert_eq!(report.epss_deleted, 3);
    assert_eq!(report.kev_deleted, 1);

    let stats = cache.stats().unwrap();
    assert_eq!(stats.epss_entries, 1);
    assert_eq!(stats.kev_entries, 1);
}

#[test]
fn sweep_retention_is_independent_from_read_freshness() {
    let (store, cache) = store_and_cache();
    backdate_epss(&store, "CVE-2024-0001", Duration::days(5));

    // Stale for a 1-day reader...
    assert!(cache
        .get_epss("CVE-2024-0001", Duration::days(1))
        .unwrap()
        .is_none());
    // ...but a 7-day retention sweep keeps it on disk.
    let report = cache.sweep(Duration::days(7), Duration::days(1)).unwrap();
    assert_eq!(report.epss_deleted, 0);
    assert_eq!(cache.stats().unwrap().epss_entries, 1);
}

// ============================================================================
// Call ledger
// ============================================================================

#[test]
fn ledger_counts_split_by_cache_flag() {
    let (_store, cache) = store_and_cache();
    let params = serde_json::json!({"cve": ["CVE-2024-0001"]});

    cache
        .record_call(
            CallSource::Epss,
            "https://api.first.org/data/v1/epss",
            &params,
            200,
            std::time::Duration::from_millis(80),
            false,
        )
        .unwrap();
    cache
        .record_call(
            CallSource::Epss,
            "cache",
            &params,
            200,
            std::time::Duration::ZERO,
            true,
        )
        .unwrap();
    cache
        .record_call(
            CallSource::Kev,
            "https://www.cisa.gov/feeds/kev.json",
            &serde_json::json!({"refresh": "full-catalog"}),
            503,
            std::time::Duration::from_millis(40),
            false,
        )
        .unwrap();

    let stats = cache.stats().unwrap();
    assert_eq!(stats.total_calls, 3);
    assert_eq!(stats.cached_calls, 1);
    assert_eq!(stats.calls_last_24h_by_source.get("EPSS"), Some(&2));
    assert_eq!(stats.calls_last_24h_by_source.get("KEV"), Some(&1));
}

// ============================================================================
// Persistence
// ============================================================================

#[test]
fn entries_survive_reopening_the_store() {
    let dir = tempfile::TempDir::new().unwrap();
    let db_path = dir.path().join("triage-cache.db");

    {
        let cache = EnrichmentCache::new(Arc::new(Store::open(&db_path).unwrap()));
        cache
            .put_epss("CVE-2024-0001", 0.42, 90.0, "v1", "2024-01-01")
            .unwrap();
    }

    let cache = EnrichmentCache::new(Arc::new(Store::open(&db_path).unwrap()));
    let rec = cache
        .get_epss("CVE-2024-0001", Duration::days(7))
        .unwrap()
        .expect("entry must survive a reopen");
    assert_eq!(rec.epss_score, 0.42);
}
