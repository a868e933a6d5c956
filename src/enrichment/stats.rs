//! Per-run enrichment statistics.

use super::orchestrator::{EpssOutcome, KevOutcome};
use indexmap::IndexMap;
use serde::Serialize;
use std::time::Duration;

/// Counters describing one enrichment run.
#[derive(Debug, Default, Clone, Serialize)]
pub struct EnrichmentStats {
    /// Distinct identifiers submitted for enrichment
    pub identifiers_queried: usize,
    /// Identifiers that came back with an EPSS score
    pub epss_scored: usize,
    /// Identifiers the EPSS source has no data for
    pub epss_no_data: usize,
    /// Identifiers whose EPSS lookup failed
    pub epss_unavailable: usize,
    /// Identifiers on the known-exploited list
    pub kev_listed: usize,
    /// Identifiers confirmed absent from a fresh catalog snapshot
    pub kev_not_listed: usize,
    /// Identifiers whose KEV membership is unknown
    pub kev_unavailable: usize,
    /// Wall-clock duration of the enrichment stage
    #[serde(with = "duration_serde")]
    pub duration: Duration,
}

impl EnrichmentStats {
    /// Tally outcome maps produced by the orchestrator.
    #[must_use]
    pub fn from_outcomes(
        epss: &IndexMap<String, EpssOutcome>,
        kev: &IndexMap<String, KevOutcome>,
    ) -> Self {
        let mut stats = Self {
            identifiers_queried: epss.len().max(kev.len()),
            ..Self::default()
        };
        for outcome in epss.values() {
            match outcome {
                EpssOutcome::Score(_) => stats.epss_scored += 1,
                EpssOutcome::NoData => stats.epss_no_data += 1,
                EpssOutcome::Unavailable => stats.epss_unavailable += 1,
            }
        }
        for outcome in kev.values() {
            match outcome {
                KevOutcome::Listed => stats.kev_listed += 1,
                KevOutcome::NotListed => stats.kev_not_listed += 1,
                KevOutcome::Unavailable => stats.kev_unavailable += 1,
            }
        }
        stats
    }

    /// Log a summary of the enrichment run.
    pub fn log_summary(&self) {
        tracing::info!(
            "Enrichment complete: {} identifiers, {} EPSS scored ({} no data, {} unavailable), \
             {} in KEV ({} unavailable) in {:?}",
            self.identifiers_queried,
            self.epss_scored,
            self.epss_no_data,
            self.epss_unavailable,
            self.kev_listed,
            self.kev_unavailable,
            self.duration
        );
    }
}

/// Serde support for Duration
mod duration_serde {
    use serde::{Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_millis().serialize(serializer)
    }
}
