//! Threat-intelligence enrichment.
//!
//! This module owns the persistent enrichment cache and everything that
//! feeds it: the SQLite store, the freshness policy, the EPSS and KEV
//! remote clients, and the lookup orchestrator that decides which
//! identifiers are served from cache and which go out on the wire.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vuln_triage::enrichment::{
//!     EnrichmentCache, LookupOrchestrator, Store,
//!     epss::EpssClient, kev::KevClient,
//!     freshness::{epss_default_max_age, kev_default_max_age},
//! };
//!
//! # fn main() -> vuln_triage::Result<()> {
//! let store = Arc::new(Store::open("triage-cache.db")?);
//! let orchestrator = LookupOrchestrator::new(
//!     EnrichmentCache::new(store),
//!     Box::new(EpssClient::with_defaults()?),
//!     Box::new(KevClient::with_defaults()?),
//! );
//!
//! let ids = vec!["CVE-2024-3094".to_string()];
//! let scores = orchestrator.lookup_epss(&ids, epss_default_max_age())?;
//! let kev = orchestrator.lookup_kev(&ids, kev_default_max_age())?;
//! # Ok(())
//! # }
//! ```

mod cache;
pub mod epss;
pub mod freshness;
mod inflight;
pub mod kev;
mod orchestrator;
pub mod stats;
pub mod store;

pub use cache::{CacheStats, CallSource, EnrichmentCache, SweepReport};
pub use orchestrator::{
    EpssOutcome, KevOutcome, LookupOrchestrator, DEFAULT_BATCH_SIZE, MAX_BATCH_SIZE,
};
pub use stats::EnrichmentStats;
pub use store::{EpssRow, KevRow, Store};
