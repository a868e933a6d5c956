//! Pipeline orchestration: parse → enrich → score → report.
//!
//! Shared by the CLI so command handlers stay thin. Library callers can
//! drive the same stages directly.

use crate::config::TriageConfig;
use crate::enrichment::{
    EnrichmentCache, EnrichmentStats, EpssOutcome, KevOutcome, LookupOrchestrator, Store,
};
use crate::error::{Result, ScanParseErrorKind, TriageError};
use crate::model::{EnrichedVulnerability, Finding, IntelStatus};
use crate::scoring::{risk_level, risk_score, RiskWeights};
use indexmap::{IndexMap, IndexSet};
use std::sync::Arc;
use std::time::Instant;

/// Exit codes for CI integration
pub mod exit_codes {
    /// Run completed and reports were written
    pub const SUCCESS: i32 = 0;
    /// The scan parsed but contained no CVE-bearing findings
    pub const NO_FINDINGS: i32 = 1;
    /// An error occurred
    pub const ERROR: i32 = 2;
}

/// Everything one triage run produces, ready for rendering.
#[derive(Debug, Clone)]
pub struct TriageResults {
    /// Unique CVEs, sorted by descending risk
    pub vulnerabilities: Vec<EnrichedVulnerability>,
    pub enrichment: EnrichmentStats,
}

/// Build a lookup orchestrator from configuration: open (or skip) the
/// persistent store and wire up the remote clients.
#[cfg(feature = "enrichment")]
pub fn build_orchestrator(config: &TriageConfig) -> Result<LookupOrchestrator> {
    use crate::enrichment::epss::{EpssClient, EpssClientConfig};
    use crate::enrichment::kev::{KevClient, KevClientConfig};

    let store = if config.cache.enabled {
        Store::open(&config.cache.db_path)?
    } else {
        Store::open_in_memory()?
    };
    let cache = EnrichmentCache::new(Arc::new(store));

    let epss = EpssClient::new(EpssClientConfig {
        api_base: config.api.epss_base_url.clone(),
        timeout: config.api_timeout(),
    })?;
    let kev = KevClient::new(KevClientConfig {
        kev_url: config.api.kev_url.clone(),
        timeout: config.api_timeout(),
    })?;

    Ok(
        LookupOrchestrator::new(cache, Box::new(epss), Box::new(kev))
            .with_batch_size(config.api.batch_size),
    )
}

/// Stub for builds without the `enrichment` feature.
#[cfg(not(feature = "enrichment"))]
pub fn build_orchestrator(_config: &TriageConfig) -> Result<LookupOrchestrator> {
    Err(TriageError::config(
        "this build has the enrichment feature disabled",
    ))
}

/// Open just the cache for stats/sweep commands (no network clients).
pub fn open_cache(config: &TriageConfig) -> Result<EnrichmentCache> {
    Ok(EnrichmentCache::new(Arc::new(Store::open(
        &config.cache.db_path,
    )?)))
}

/// Aggregate raw findings by CVE, enrich them, and score the result.
pub fn enrich_findings(
    findings: &[Finding],
    orchestrator: &LookupOrchestrator,
    config: &TriageConfig,
) -> Result<TriageResults> {
    let aggregated = aggregate_findings(findings);
    if aggregated.is_empty() {
        return Err(TriageError::parse(
            "scan contained no CVE-bearing findings",
            ScanParseErrorKind::EmptyScan,
        ));
    }

    let ids: Vec<String> = aggregated.keys().cloned().collect();
    tracing::info!(unique_cves = ids.len(), "enriching findings");

    let started = Instant::now();
    let epss = orchestrator.lookup_epss(&ids, config.epss_max_age())?;
    let kev = orchestrator.lookup_kev(&ids, config.kev_max_age())?;
    let mut enrichment = EnrichmentStats::from_outcomes(&epss, &kev);
    enrichment.duration = started.elapsed();
    enrichment.log_summary();

    let weights = RiskWeights::default();
    let mut vulnerabilities: Vec<EnrichedVulnerability> = aggregated
        .into_iter()
        .map(|(cve_id, agg)| {
            let (epss_score, epss_percentile, epss_status) = match epss.get(&cve_id) {
                Some(EpssOutcome::Score(row)) => (
                    Some(row.epss_score),
                    Some(row.percentile),
                    IntelStatus::Scored,
                ),
                Some(EpssOutcome::NoData) => (None, None, IntelStatus::NoData),
                Some(EpssOutcome::Unavailable) | None => {
                    (None, None, IntelStatus::Unavailable)
                }
            };
            let in_kev = match kev.get(&cve_id) {
                Some(KevOutcome::Listed) => Some(true),
                Some(KevOutcome::NotListed) => Some(false),
                Some(KevOutcome::Unavailable) | None => None,
            };

            let score = risk_score(agg.cvss, epss_score, in_kev == Some(true), weights);
            EnrichedVulnerability {
                cve_id,
                title: agg.title,
                cvss: agg.cvss,
                epss_score,
                epss_percentile,
                epss_status,
                in_kev,
                affected_hosts: agg.hosts.into_iter().collect(),
                occurrences: agg.occurrences,
                risk_score: score,
                risk_level: risk_level(score),
            }
        })
        .collect();

    vulnerabilities.sort_by(|a, b| {
        b.risk_score
            .total_cmp(&a.risk_score)
            .then_with(|| a.cve_id.cmp(&b.cve_id))
    });

    Ok(TriageResults {
        vulnerabilities,
        enrichment,
    })
}

struct Aggregated {
    title: String,
    cvss: Option<f64>,
    hosts: IndexSet<String>,
    occurrences: usize,
}

/// Collapse raw findings into one entry per CVE: first non-empty title,
/// highest CVSS, union of hosts.
fn aggregate_findings(findings: &[Finding]) -> IndexMap<String, Aggregated> {
    let mut aggregated: IndexMap<String, Aggregated> = IndexMap::new();
    for finding in findings {
        let entry = aggregated
            .entry(finding.cve_id.clone())
            .or_insert_with(|| Aggregated {
                title: String::new(),
                cvss: None,
                hosts: IndexSet::new(),
                occurrences: 0,
            });
        entry.occurrences += 1;
        if entry.title.is_empty() && !finding.title.is_empty() {
            entry.title = finding.title.clone();
        }
        entry.cvss = match (entry.cvss, finding.cvss) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        if let Some(host) = &finding.host {
            entry.hosts.insert(host.clone());
        }
    }
    aggregated
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding(cve: &str, cvss: Option<f64>, host: Option<&str>) -> Finding {
        Finding {
            cve_id: cve.to_string(),
            title: "Test finding".to_string(),
            cvss,
            host: host.map(str::to_string),
            plugin_id: None,
        }
    }

    #[test]
    fn test_aggregate_merges_duplicate_cves() {
        let findings = vec![
            finding("CVE-2024-0001", Some(7.5), Some("web-01")),
            finding("CVE-2024-0001", Some(9.8), Some("db-01")),
            finding("CVE-2024-0001", None, Some("web-01")),
            finding("CVE-2024-0002", None, None),
        ];

        let aggregated = aggregate_findings(&findings);
        assert_eq!(aggregated.len(), 2);

        let first = &aggregated["CVE-2024-0001"];
        assert_eq!(first.cvss, Some(9.8));
        assert_eq!(first.occurrences, 3);
        assert_eq!(first.hosts.len(), 2);

        let second = &aggregated["CVE-2024-0002"];
        assert_eq!(second.cvss, None);
        assert_eq!(second.occurrences, 1);
    }

    #[test]
    fn test_aggregate_keeps_first_title() {
        let mut untitled = finding("CVE-2024-0001", None, None);
        untitled.title = String::new();
        let mut titled = finding("CVE-2024-0001", None, None);
        titled.title = "Real title".to_string();

        let aggregated = aggregate_findings(&[untitled, titled]);
        assert_eq!(aggregated["CVE-2024-0001"].title, "Real title");
    }

    #[test]
    fn test_exit_codes_values() {
        assert_eq!(exit_codes::SUCCESS, 0);
        assert_eq!(exit_codes::NO_FINDINGS, 1);
        assert_eq!(exit_codes::ERROR, 2);
    }
}
