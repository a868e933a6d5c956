//! Typed cache operations over the persistent store.
//!
//! The cache applies the freshness policy on every read, touches access
//! timestamps on fresh hits, and exposes the call ledger and aggregate
//! statistics. It is constructed around an injected store handle and owns no
//! global connection state; clone the `Arc<Store>` to share one database
//! between a cache and anything else that needs it.

use super::freshness::is_fresh;
use super::kev::KevEntry;
use super::store::{CallRow, EpssRow, KevRow, Store};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Which remote source a call-ledger entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSource {
    Epss,
    Kev,
}

impl CallSource {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Epss => "EPSS",
            Self::Kev => "KEV",
        }
    }
}

impl fmt::Display for CallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Aggregate cache statistics.
///
/// Read-only: computing these never mutates a record's access time.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub epss_entries: u64,
    pub kev_entries: u64,
    pub total_calls: u64,
    pub cached_calls: u64,
    /// Calls in the last 24 hours, keyed by source name, windowed on the
    /// ledger entry timestamp rather than insertion order.
    pub calls_last_24h_by_source: HashMap<String, u64>,
}

/// Counts returned by [`EnrichmentCache::sweep`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub epss_deleted: usize,
    pub kev_deleted: usize,
}

/// Enrichment cache over a shared store handle.
pub struct EnrichmentCache {
    store: Arc<Store>,
}

impl EnrichmentCache {
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    // ------------------------------------------------------------------
    // EPSS
    // ------------------------------------------------------------------

    /// Upsert an EPSS score, stamping `cached_at = last_accessed = now`.
    ///
    /// Idempotent: repeated calls with identical data produce the same
    /// stored state modulo timestamps.
    pub fn put_epss(
        &self,
        cve_id: &str,
        epss_score: f64,
        percentile: f64,
        model_version: &str,
        score_date: &str,
    ) -> Result<()> {
        let now = Utc::now();
        self.store.upsert_epss(&EpssRow {
            cve_id: cve_id.to_string(),
            epss_score,
            percentile,
            model_version: model_version.to_string(),
            score_date: score_date.to_string(),
            cached_at: now,
            last_accessed: now,
        })
    }

    /// Fetch a fresh EPSS record, or `None` if absent or stale.
    ///
    /// A fresh hit updates `last_accessed` as a side effect. The touch never
    /// changes `cached_at`, so it cannot extend the freshness window, and a
    /// failed touch is best-effort: logged, record still returned.
    pub fn get_epss(&self, cve_id: &str, max_age: Duration) -> Result<Option<EpssRow>> {
        let now = Utc::now();
        let Some(row) = self.store.get_epss(cve_id)? else {
            return Ok(None);
        };
        if !is_fresh(row.cached_at, now, max_age) {
            return Ok(None);
        }
        if let Err(e) = self.store.touch_epss_access(cve_id, now) {
            tracing::warn!("failed to update access time for {cve_id}: {e}");
            return Ok(Some(row));
        }
        Ok(Some(EpssRow {
            last_accessed: now,
            ..row
        }))
    }

    // ------------------------------------------------------------------
    // KEV
    // ------------------------------------------------------------------

    /// Upsert a KEV entry, stamping `cached_at = last_accessed = now`.
    pub fn put_kev(&self, entry: &KevEntry) -> Result<()> {
        let now = Utc::now();
        self.store.upsert_kev(&KevRow {
            cve_id: entry.cve_id.clone(),
            vendor_project: entry.vendor_project.clone(),
            product: entry.product.clone(),
            vulnerability_name: entry.vulnerability_name.clone(),
            date_added: entry.date_added.clone(),
            short_description: entry.short_description.clone(),
            required_action: entry.required_action.clone(),
            due_date: entry.due_date.clone(),
            cached_at: now,
            last_accessed: now,
        })
    }

    /// Upsert a full catalog snapshot atomically, stamping every entry with
    /// the same refresh instant.
    pub fn put_kev_all(&self, entries: &[KevEntry]) -> Result<()> {
        let now = Utc::now();
        let rows: Vec<KevRow> = entries
            .iter()
            .map(|entry| KevRow {
                cve_id: entry.cve_id.clone(),
                vendor_project: entry.vendor_project.clone(),
                product: entry.product.clone(),
                vulnerability_name: entry.vulnerability_name.clone(),
                date_added: entry.date_added.clone(),
                short_description: entry.short_description.clone(),
                required_action: entry.required_action.clone(),
                due_date: entry.due_date.clone(),
                cached_at: now,
                last_accessed: now,
            })
            .collect();
        self.store.upsert_kev_batch(&rows)
    }

    /// Fetch a fresh KEV record, or `None` if absent or stale.
    ///
    /// `None` is ambiguous between "never flagged" and "cache expired";
    /// callers that need the distinction re-check upstream (the
    /// orchestrator does exactly that).
    pub fn get_kev(&self, cve_id: &str, max_age: Duration) -> Result<Option<KevRow>> {
        let now = Utc::now();
        let Some(row) = self.store.get_kev(cve_id)? else {
            return Ok(None);
        };
        if !is_fresh(row.cached_at, now, max_age) {
            return Ok(None);
        }
        if let Err(e) = self.store.touch_kev_access(cve_id, now) {
            tracing::warn!("failed to update access time for {cve_id}: {e}");
            return Ok(Some(row));
        }
        Ok(Some(KevRow {
            last_accessed: now,
            ..row
        }))
    }

    /// Whether a fresh KEV entry exists for the identifier.
    pub fn get_kev_membership(&self, cve_id: &str, max_age: Duration) -> Result<bool> {
        Ok(self.get_kev(cve_id, max_age)?.is_some())
    }

    /// All identifiers with a fresh KEV entry. Does not touch access times.
    pub fn list_fresh_kev_ids(&self, max_age: Duration) -> Result<HashSet<String>> {
        let cutoff = Utc::now() - max_age;
        self.store.kev_ids_cached_since(cutoff)
    }

    /// Instant of the last full KEV catalog refresh, if any.
    pub fn latest_kev_refresh(&self) -> Result<Option<DateTime<Utc>>> {
        self.store.latest_kev_cached_at()
    }

    // ------------------------------------------------------------------
    // Call ledger and aggregates
    // ------------------------------------------------------------------

    /// Append one entry to the call ledger.
    pub fn record_call(
        &self,
        source: CallSource,
        endpoint: &str,
        parameters: &serde_json::Value,
        status_code: u16,
        latency: std::time::Duration,
        served_from_cache: bool,
    ) -> Result<()> {
        self.store.append_call(&CallRow {
            source: source.as_str().to_string(),
            endpoint: endpoint.to_string(),
            parameters: parameters.to_string(),
            status_code,
            latency_ms: latency.as_secs_f64() * 1000.0,
            served_from_cache,
            timestamp: Utc::now(),
        })
    }

    /// Aggregate statistics. Pure read; mutates nothing.
    pub fn stats(&self) -> Result<CacheStats> {
        Ok(CacheStats {
            epss_entries: self.store.count_epss()?,
            kev_entries: self.store.count_kev()?,
            total_calls: self.store.count_calls()?,
            cached_calls: self.store.count_cached_calls()?,
            calls_last_24h_by_source: self
                .store
                .calls_by_source_since(Utc::now() - Duration::hours(24))?,
        })
    }

    /// Delete entries whose `cached_at` is older than the given retention
    /// windows. Retention is storage hygiene; the per-read freshness check
    /// is what guarantees correctness, and the two are deliberately
    /// independent knobs.
    pub fn sweep(&self, epss_max_age: Duration, kev_max_age: Duration) -> Result<SweepReport> {
        let now = Utc::now();
        let epss_deleted = self.store.delete_epss_older_than(now - epss_max_age)?;
        let kev_deleted = self.store.delete_kev_older_than(now - kev_max_age)?;
        tracing::debug!(epss_deleted, kev_deleted, "cache sweep complete");
        Ok(SweepReport {
            epss_deleted,
            kev_deleted,
        })
    }
}
