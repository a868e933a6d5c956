//! **Vulnerability triage with EPSS and CISA KEV enrichment.**
//!
//! `vuln-triage` turns raw vulnerability scanner exports into a prioritized
//! remediation queue. It parses findings from Nessus, Tenable, or Qualys
//! exports, enriches every unique CVE with two external threat-intelligence
//! signals, and ranks by composite risk:
//!
//! - **EPSS**: the exploitation-probability score published by FIRST.org,
//!   batched per request and cached for days at a time.
//! - **CISA KEV**: membership in the Known Exploited Vulnerabilities
//!   catalog, refreshed as a whole list and re-derived locally.
//!
//! The heart of the crate is the [`enrichment`] module: a SQLite-backed
//! cache with independent per-source freshness windows, a batch lookup
//! orchestrator that only goes to the network for identifiers the cache
//! cannot serve, an append-only ledger of every remote call, and in-flight
//! coalescing so concurrent lookups of the same identifier share one fetch.
//!
//! ## Getting started
//!
//! ```no_run
//! use vuln_triage::config::TriageConfig;
//! use vuln_triage::model::ScanSource;
//! use vuln_triage::{parsers, pipeline};
//!
//! fn main() -> vuln_triage::Result<()> {
//!     let config = TriageConfig::default();
//!     let findings =
//!         parsers::parse_scan("scan.nessus".as_ref(), ScanSource::Nessus)?;
//!
//!     let orchestrator = pipeline::build_orchestrator(&config)?;
//!     let results = pipeline::enrich_findings(&findings, &orchestrator, &config)?;
//!
//!     for vuln in results.vulnerabilities.iter().take(10) {
//!         println!(
//!             "{:>6.2}  {}  {}",
//!             vuln.risk_score, vuln.cve_id, vuln.title
//!         );
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Degradation model
//!
//! No remote failure is fatal: a failed EPSS batch or KEV refresh degrades
//! to "serve what is cached, mark the rest unavailable", and the
//! distinction between *no data* and *unavailable* is preserved all the way
//! into the reports so a partial enrichment is never mistaken for a clean
//! bill of health.
//!
//! ## Feature flags
//!
//! - `enrichment` (default): the `reqwest`-backed remote clients. Without
//!   it the cache, orchestrator and parsers still build, which is what the
//!   test suite's mock sources rely on.

// Lint to discourage unwrap() in production code - prefer explicit error handling
#![warn(clippy::unwrap_used)]
#![allow(
    // Statistical/report math casts are all bounded in practice
    clippy::cast_precision_loss,
    // # Errors / # Panics doc sections are aspirational here
    clippy::missing_errors_doc
)]

pub mod cli;
pub mod config;
pub mod enrichment;
pub mod error;
pub mod model;
pub mod parsers;
pub mod pipeline;
pub mod reports;
pub mod scoring;

// Re-export main types for convenience
pub use config::TriageConfig;
pub use enrichment::{
    CacheStats, CallSource, EnrichmentCache, EnrichmentStats, EpssOutcome, EpssRow,
    KevOutcome, KevRow, LookupOrchestrator, Store, SweepReport,
};
pub use error::{Result, TriageError};
pub use model::{EnrichedVulnerability, Finding, ScanSource};
pub use parsers::parse_scan;
pub use scoring::{risk_level, risk_score, RiskLevel, RiskWeights};
