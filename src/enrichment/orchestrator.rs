//! Batch lookup orchestration over the enrichment cache.
//!
//! For each request the orchestrator partitions identifiers into cache hits
//! and misses, dedups the misses, fetches them from the remote source in
//! bounded batches, merges results back into the cache, and returns one
//! complete map covering every requested identifier. Remote failure never
//! fails the request: cached hits are still served and only genuinely
//! uncached identifiers degrade to an unavailable outcome.
//!
//! Concurrent callers asking for the same identifier are coalesced through
//! an in-flight registry so at most one remote fetch per identifier is on
//! the wire at a time.

use super::cache::{CallSource, EnrichmentCache};
use super::epss::{EpssScore, EpssSource};
use super::freshness::is_fresh;
use super::inflight::{Claim, InflightRegistry};
use super::kev::{normalize_cve_id, KevSource};
use super::store::EpssRow;
use crate::error::Result;
use chrono::{Duration, Utc};
use indexmap::{IndexMap, IndexSet};
use rayon::prelude::*;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Default number of identifiers per EPSS request. The API takes
/// comma-joined identifiers in the query string; 100 keeps the URL around
/// 2 KB, comfortably under the endpoint's practical limit.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Hard ceiling on the configurable batch size.
pub const MAX_BATCH_SIZE: usize = 500;

/// Registry key for the single full-catalog KEV refresh.
const KEV_REFRESH_KEY: &str = "__catalog__";

/// Per-identifier EPSS lookup outcome.
#[derive(Debug, Clone)]
pub enum EpssOutcome {
    /// A fresh score, from cache or a just-completed fetch.
    Score(EpssRow),
    /// The source answered and has no data for this identifier. Definitive
    /// for this call; nothing is cached, so a later request asks again.
    NoData,
    /// The source could not be reached or answered garbage; distinct from
    /// `NoData` so callers can decide between partial enrichment and retry.
    Unavailable,
}

impl EpssOutcome {
    #[must_use]
    pub fn score(&self) -> Option<&EpssRow> {
        match self {
            Self::Score(row) => Some(row),
            Self::NoData | Self::Unavailable => None,
        }
    }
}

/// Per-identifier KEV lookup outcome.
///
/// Three-valued on purpose: "haven't checked" must never read as "not
/// exploited".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KevOutcome {
    /// Currently on the known-exploited list.
    Listed,
    /// Absent from a fresh full-catalog snapshot.
    NotListed,
    /// No fresh snapshot and the source is unreachable; membership unknown.
    Unavailable,
}

impl KevOutcome {
    #[must_use]
    pub const fn is_listed(self) -> bool {
        matches!(self, Self::Listed)
    }
}

/// Outcome of a coalesced catalog refresh, shared with waiting callers.
#[derive(Clone)]
enum KevRefresh {
    /// Refresh succeeded; membership is derived from this snapshot.
    Refreshed(Arc<HashSet<String>>),
    Failed,
}

/// Batch lookup orchestrator.
pub struct LookupOrchestrator {
    cache: EnrichmentCache,
    epss_source: Box<dyn EpssSource>,
    kev_source: Box<dyn KevSource>,
    batch_size: usize,
    epss_inflight: InflightRegistry<EpssOutcome>,
    kev_inflight: InflightRegistry<KevRefresh>,
}

impl LookupOrchestrator {
    pub fn new(
        cache: EnrichmentCache,
        epss_source: Box<dyn EpssSource>,
        kev_source: Box<dyn KevSource>,
    ) -> Self {
        Self {
            cache,
            epss_source,
            kev_source,
            batch_size: DEFAULT_BATCH_SIZE,
            epss_inflight: InflightRegistry::new(),
            kev_inflight: InflightRegistry::new(),
        }
    }

    /// Override the remote batch size (clamped to `1..=MAX_BATCH_SIZE`).
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.clamp(1, MAX_BATCH_SIZE);
        self
    }

    /// Access to the underlying cache for stats and sweep.
    #[must_use]
    pub const fn cache(&self) -> &EnrichmentCache {
        &self.cache
    }

    // ------------------------------------------------------------------
    // EPSS
    // ------------------------------------------------------------------

    /// Look up EPSS scores for a batch of identifiers.
    ///
    /// The returned map has exactly one entry per distinct requested
    /// identifier, in first-occurrence order. Errors only when the store is
    /// unreachable on the very first cache read; every later failure
    /// degrades per-identifier.
    pub fn lookup_epss(
        &self,
        ids: &[String],
        max_age: Duration,
    ) -> Result<IndexMap<String, EpssOutcome>> {
        let requested = dedup_ids(ids);
        if requested.is_empty() {
            return Ok(IndexMap::new());
        }

        // Partition into fresh hits and misses.
        let mut outcomes: HashMap<String, EpssOutcome> = HashMap::new();
        let mut misses: Vec<String> = Vec::new();
        let mut hit_ids: Vec<String> = Vec::new();
        for (index, id) in requested.iter().enumerate() {
            match self.cache.get_epss(id, max_age) {
                Ok(Some(row)) => {
                    hit_ids.push(id.clone());
                    outcomes.insert(id.clone(), EpssOutcome::Score(row));
                }
                Ok(None) => misses.push(id.clone()),
                Err(e) if index == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!("cache read failed for {id}, treating as miss: {e}");
                    misses.push(id.clone());
                }
            }
        }

        if !hit_ids.is_empty() {
            self.record_call_best_effort(
                CallSource::Epss,
                "cache",
                &serde_json::json!({ "cve": hit_ids }),
                200,
                std::time::Duration::ZERO,
                true,
            );
        }

        // Coalesce: fetch only identifiers nobody else is already fetching.
        let mut owned: Vec<String> = Vec::new();
        let mut waiting: Vec<(String, Arc<super::inflight::Slot<EpssOutcome>>)> = Vec::new();
        for id in misses {
            match self.epss_inflight.claim(&id) {
                Claim::Owner => owned.push(id),
                Claim::Waiter(slot) => waiting.push((id, slot)),
            }
        }

        // Independent chunks go out concurrently.
        let fetched: Vec<(String, EpssOutcome)> = owned
            .chunks(self.batch_size)
            .collect::<Vec<_>>()
            .par_iter()
            .flat_map(|chunk| self.fetch_epss_chunk(chunk))
            .collect();
        outcomes.extend(fetched);

        for (id, slot) in waiting {
            let outcome =
                InflightRegistry::wait(&slot).unwrap_or(EpssOutcome::Unavailable);
            outcomes.insert(id, outcome);
        }

        // The result is complete only now that every constituent call has
        // resolved; missing entries would be indistinguishable from data.
        Ok(requested
            .into_iter()
            .map(|id| {
                let outcome = outcomes.remove(&id).unwrap_or(EpssOutcome::Unavailable);
                (id, outcome)
            })
            .collect())
    }

    /// Fetch one chunk, audit the attempt, merge into the cache, and
    /// publish per-identifier outcomes to waiting callers.
    fn fetch_epss_chunk(&self, chunk: &[String]) -> Vec<(String, EpssOutcome)> {
        let started = Instant::now();
        let result = self.epss_source.fetch_batch(chunk);
        let latency = started.elapsed();
        let endpoint = self.epss_source.endpoint();
        let parameters = serde_json::json!({ "cve": chunk });

        let outcomes: Vec<(String, EpssOutcome)> = match result {
            Ok(batch) => {
                self.record_call_best_effort(
                    CallSource::Epss,
                    &endpoint,
                    &parameters,
                    200,
                    latency,
                    false,
                );
                let mut by_id: HashMap<String, EpssScore> = batch
                    .scores
                    .into_iter()
                    .map(|score| (normalize_cve_id(&score.cve_id), score))
                    .collect();
                chunk
                    .iter()
                    .map(|id| match by_id.remove(id) {
                        Some(score) => (id.clone(), self.merge_epss_score(id, &score)),
                        // The source has no data: report it, cache nothing,
                        // so the identifier is retried once data appears.
                        None => (id.clone(), EpssOutcome::NoData),
                    })
                    .collect()
            }
            Err(kind) => {
                tracing::warn!("EPSS batch of {} identifiers failed: {kind}", chunk.len());
                self.record_call_best_effort(
                    CallSource::Epss,
                    &endpoint,
                    &parameters,
                    kind.audit_status(),
                    latency,
                    false,
                );
                chunk
                    .iter()
                    .map(|id| (id.clone(), EpssOutcome::Unavailable))
                    .collect()
            }
        };

        for (id, outcome) in &outcomes {
            self.epss_inflight.publish(id, outcome.clone());
        }
        outcomes
    }

    /// Upsert a fetched score; a failed write is degraded, not fatal, since
    /// the fetched data can still be served to the caller.
    fn merge_epss_score(&self, id: &str, score: &EpssScore) -> EpssOutcome {
        if let Err(e) = self.cache.put_epss(
            id,
            score.epss,
            score.percentile,
            &score.model_version,
            &score.score_date,
        ) {
            tracing::warn!("failed to cache EPSS score for {id}: {e}");
        }
        let now = Utc::now();
        EpssOutcome::Score(EpssRow {
            cve_id: id.to_string(),
            epss_score: score.epss,
            percentile: score.percentile,
            model_version: score.model_version.clone(),
            score_date: score.score_date.clone(),
            cached_at: now,
            last_accessed: now,
        })
    }

    // ------------------------------------------------------------------
    // KEV
    // ------------------------------------------------------------------

    /// Look up KEV membership for a batch of identifiers.
    ///
    /// The source has no per-identifier query, so a stale snapshot triggers
    /// one full-catalog refresh (coalesced across concurrent callers) and
    /// membership is derived locally. Absence from a fresh snapshot is a
    /// definitive `NotListed`; without one, unknown identifiers are
    /// `Unavailable`, never `NotListed`.
    pub fn lookup_kev(
        &self,
        ids: &[String],
        max_age: Duration,
    ) -> Result<IndexMap<String, KevOutcome>> {
        let requested = dedup_ids(ids);
        if requested.is_empty() {
            return Ok(IndexMap::new());
        }

        let refreshed_at = self.cache.latest_kev_refresh()?;
        let now = Utc::now();
        let snapshot_fresh = refreshed_at.is_some_and(|at| is_fresh(at, now, max_age));

        if snapshot_fresh {
            let result = requested
                .iter()
                .map(|id| (id.clone(), self.kev_membership_from_cache(id, max_age)))
                .collect();
            self.record_call_best_effort(
                CallSource::Kev,
                "cache",
                &serde_json::json!({ "cve": requested }),
                200,
                std::time::Duration::ZERO,
                true,
            );
            return Ok(result);
        }

        let refresh = match self.kev_inflight.claim(KEV_REFRESH_KEY) {
            Claim::Owner => {
                let refresh = self.refresh_kev_catalog();
                self.kev_inflight.publish(KEV_REFRESH_KEY, refresh.clone());
                refresh
            }
            Claim::Waiter(slot) => {
                InflightRegistry::wait(&slot).unwrap_or(KevRefresh::Failed)
            }
        };

        Ok(requested
            .into_iter()
            .map(|id| {
                let outcome = match &refresh {
                    KevRefresh::Refreshed(members) => {
                        if members.contains(&id) {
                            KevOutcome::Listed
                        } else {
                            KevOutcome::NotListed
                        }
                    }
                    // No fresh snapshot: still-fresh cached entries are
                    // served; everything else is unknown, not "clean".
                    KevRefresh::Failed => self.kev_fallback(&id, max_age),
                };
                (id, outcome)
            })
            .collect())
    }

    /// Fetch and cache the full KEV catalog, auditing the attempt.
    fn refresh_kev_catalog(&self) -> KevRefresh {
        let started = Instant::now();
        let result = self.kev_source.fetch_catalog();
        let latency = started.elapsed();
        let endpoint = self.kev_source.endpoint();
        let parameters = serde_json::json!({ "refresh": "full-catalog" });

        match result {
            Ok(snapshot) => {
                self.record_call_best_effort(
                    CallSource::Kev,
                    &endpoint,
                    &parameters,
                    200,
                    latency,
                    false,
                );
                tracing::info!(
                    entries = snapshot.entries.len(),
                    version = %snapshot.catalog_version,
                    "refreshed KEV catalog"
                );
                let members: HashSet<String> = snapshot
                    .entries
                    .iter()
                    .map(|entry| entry.cve_id.clone())
                    .collect();
                if let Err(e) = self.cache.put_kev_all(&snapshot.entries) {
                    // Membership can still be answered from the snapshot in
                    // hand; only persistence for later runs was lost.
                    tracing::warn!("failed to cache KEV catalog: {e}");
                }
                KevRefresh::Refreshed(Arc::new(members))
            }
            Err(kind) => {
                tracing::warn!("KEV catalog refresh failed: {kind}");
                self.record_call_best_effort(
                    CallSource::Kev,
                    &endpoint,
                    &parameters,
                    kind.audit_status(),
                    latency,
                    false,
                );
                KevRefresh::Failed
            }
        }
    }

    fn kev_membership_from_cache(&self, id: &str, max_age: Duration) -> KevOutcome {
        match self.cache.get_kev_membership(id, max_age) {
            Ok(true) => KevOutcome::Listed,
            // Within a fresh snapshot window, absence means the catalog
            // does not list this identifier.
            Ok(false) => KevOutcome::NotListed,
            Err(e) => {
                tracing::warn!("cache read failed for {id}: {e}");
                KevOutcome::Unavailable
            }
        }
    }

    fn kev_fallback(&self, id: &str, max_age: Duration) -> KevOutcome {
        match self.cache.get_kev_membership(id, max_age) {
            Ok(true) => KevOutcome::Listed,
            // Without a fresh snapshot, absence is ambiguous between
            // expired and never-listed; report unknown.
            Ok(false) => KevOutcome::Unavailable,
            Err(e) => {
                tracing::warn!("cache read failed for {id}: {e}");
                KevOutcome::Unavailable
            }
        }
    }

    // ------------------------------------------------------------------

    /// The ledger is best-effort on the degraded path: a failed append is
    /// logged, never allowed to break a lookup.
    fn record_call_best_effort(
        &self,
        source: CallSource,
        endpoint: &str,
        parameters: &serde_json::Value,
        status_code: u16,
        latency: std::time::Duration,
        served_from_cache: bool,
    ) {
        if let Err(e) = self.cache.record_call(
            source,
            endpoint,
            parameters,
            status_code,
            latency,
            served_from_cache,
        ) {
            tracing::warn!("failed to record {source} call in audit log: {e}");
        }
    }
}

/// Normalize and dedup identifiers, preserving first-occurrence order.
fn dedup_ids(ids: &[String]) -> IndexSet<String> {
    ids.iter()
        .map(|id| normalize_cve_id(id))
        .filter(|id| !id.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserves_first_occurrence_order() {
        let ids = vec![
            "cve-2024-0002".to_string(),
            "CVE-2024-0001".to_string(),
            "CVE-2024-0002".to_string(),
            " CVE-2024-0001 ".to_string(),
        ];
        let deduped: Vec<String> = dedup_ids(&ids).into_iter().collect();
        assert_eq!(deduped, vec!["CVE-2024-0002", "CVE-2024-0001"]);
    }

    #[test]
    fn test_dedup_drops_empty_identifiers() {
        let ids = vec![String::new(), "  ".to_string(), "CVE-2024-1".to_string()];
        assert_eq!(dedup_ids(&ids).len(), 1);
    }

    #[test]
    fn test_kev_outcome_is_listed() {
        assert!(KevOutcome::Listed.is_listed());
        assert!(!KevOutcome::NotListed.is_listed());
        assert!(!KevOutcome::Unavailable.is_listed());
    }
}
