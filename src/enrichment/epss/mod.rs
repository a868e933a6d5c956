//! EPSS (Exploit Prediction Scoring System) source integration.
//!
//! See: <https://www.first.org/epss/>

#[cfg(feature = "enrichment")]
mod client;
pub mod response;

#[cfg(feature = "enrichment")]
pub use client::{EpssClient, EpssClientConfig, EPSS_API_BASE};

use crate::error::RemoteErrorKind;
use response::EpssResponse;

/// One fetched score, already normalized to data-model units
/// (percentile 0-100).
#[derive(Debug, Clone, PartialEq)]
pub struct EpssScore {
    pub cve_id: String,
    /// Exploitation probability, 0.0-1.0
    pub epss: f64,
    /// Percentile among all scored CVEs, 0.0-100.0
    pub percentile: f64,
    pub model_version: String,
    pub score_date: String,
}

/// Result of one batched EPSS query.
#[derive(Debug, Clone, Default)]
pub struct EpssBatch {
    pub scores: Vec<EpssScore>,
    /// Total count reported by the source for this query.
    pub total: u64,
}

impl EpssBatch {
    /// Normalize a raw API response.
    ///
    /// The per-item date wins over the envelope score date when present;
    /// the 0-1 percentile fraction is scaled to 0-100 here and nowhere
    /// else.
    #[must_use]
    pub fn from_response(response: EpssResponse) -> Self {
        let model_version = response.model_version;
        let envelope_date = response.score_date;
        let scores = response
            .data
            .into_iter()
            .map(|item| EpssScore {
                cve_id: item.cve,
                epss: item.epss,
                percentile: item.percentile * 100.0,
                model_version: model_version.clone(),
                score_date: if item.date.is_empty() {
                    envelope_date.clone()
                } else {
                    item.date
                },
            })
            .collect();
        Self {
            scores,
            total: response.total,
        }
    }
}

/// A remote EPSS source.
///
/// One call = one request: the orchestrator owns chunking, so an
/// implementation must put every identifier it is given into a single
/// query (the API accepts comma-joined identifiers).
pub trait EpssSource: Send + Sync {
    /// Fetch scores for a batch of identifiers in one request.
    ///
    /// Identifiers the source has no data for are simply absent from the
    /// result; that absence is meaningful to the caller, not an error.
    fn fetch_batch(&self, cve_ids: &[String]) -> Result<EpssBatch, RemoteErrorKind>;

    /// Endpoint description for the call ledger.
    fn endpoint(&self) -> String;
}
