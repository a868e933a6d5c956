//! CISA KEV (Known Exploited Vulnerabilities) source integration.
//!
//! The KEV source publishes one full-catalog feed with no per-identifier
//! query, so a refresh always replaces the whole cached membership set and
//! the orchestrator re-derives membership locally.
//!
//! See: <https://www.cisa.gov/known-exploited-vulnerabilities-catalog>

pub mod catalog;
#[cfg(feature = "enrichment")]
mod client;

pub use catalog::{normalize_cve_id, KevCatalogResponse, KevEntry, KevSnapshot, KevVulnerability};
#[cfg(feature = "enrichment")]
pub use client::{KevClient, KevClientConfig, KEV_CATALOG_URL};

use crate::error::RemoteErrorKind;

/// A remote KEV source.
pub trait KevSource: Send + Sync {
    /// Fetch the full catalog in one request.
    fn fetch_catalog(&self) -> Result<KevSnapshot, RemoteErrorKind>;

    /// Endpoint description for the call ledger.
    fn endpoint(&self) -> String;
}
