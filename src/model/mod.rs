//! Domain types shared between the scan parsers, the enrichment pipeline
//! and the report generators.

use crate::scoring::RiskLevel;
use serde::Serialize;

/// Which scanner produced the export being parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ScanSource {
    /// Nessus `.nessus` XML (v2)
    Nessus,
    /// Tenable export (same `.nessus` format)
    Tenable,
    /// Qualys scan-results XML
    Qualys,
}

impl std::fmt::Display for ScanSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Nessus => "nessus",
            Self::Tenable => "tenable",
            Self::Qualys => "qualys",
        };
        f.write_str(name)
    }
}

/// One raw finding from a scanner export: a single (host, plugin, CVE)
/// observation. Findings with the same CVE are aggregated before
/// enrichment.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    /// Normalized CVE identifier
    pub cve_id: String,
    /// Plugin/vulnerability title from the scanner
    pub title: String,
    /// CVSS base score if the scanner reported one
    pub cvss: Option<f64>,
    /// Affected host, when the export carries it
    pub host: Option<String>,
    /// Scanner-side plugin or QID identifier
    pub plugin_id: Option<String>,
}

/// EPSS lookup status carried into reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntelStatus {
    /// A score was available (from cache or a fresh fetch)
    Scored,
    /// The source has no data for this identifier
    NoData,
    /// The source could not be reached
    Unavailable,
}

/// One unique CVE after aggregation, enrichment and scoring.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedVulnerability {
    pub cve_id: String,
    pub title: String,
    /// Highest CVSS base score across the findings for this CVE
    pub cvss: Option<f64>,
    pub epss_score: Option<f64>,
    pub epss_percentile: Option<f64>,
    pub epss_status: IntelStatus,
    /// `Some(true)` = on the KEV list, `Some(false)` = confirmed absent
    /// from a fresh snapshot, `None` = membership unknown.
    pub in_kev: Option<bool>,
    /// Hosts this CVE was observed on, deduplicated
    pub affected_hosts: Vec<String>,
    /// Number of raw findings that collapsed into this entry
    pub occurrences: usize,
    /// Composite risk score, 0-100
    pub risk_score: f64,
    pub risk_level: RiskLevel,
}
