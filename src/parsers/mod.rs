//! Scanner export parsers.
//!
//! Each supported scanner format gets its own module producing the same
//! plain [`Finding`] list; everything downstream (enrichment, scoring,
//! reports) is format-agnostic.

pub mod nessus;
pub mod qualys;

use crate::error::Result;
use crate::model::{Finding, ScanSource};
use std::fs;
use std::path::Path;

/// Parse a scan export file for the given source.
///
/// Tenable exports use the Nessus v2 format, so both sources share a
/// parser.
pub fn parse_scan(path: &Path, source: ScanSource) -> Result<Vec<Finding>> {
    let content =
        fs::read_to_string(path).map_err(|e| crate::error::TriageError::io(path, e))?;
    parse_scan_str(&content, source)
}

/// Parse scan content already in memory.
pub fn parse_scan_str(content: &str, source: ScanSource) -> Result<Vec<Finding>> {
    match source {
        ScanSource::Nessus | ScanSource::Tenable => nessus::parse_str(content),
        ScanSource::Qualys => qualys::parse_str(content),
    }
}

/// Matcher for CVE identifiers embedded in scanner output.
pub(crate) fn cve_pattern() -> &'static regex::Regex {
    static RE: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    RE.get_or_init(|| regex::Regex::new(r"CVE-\d{4}-\d{4,}").expect("valid literal pattern"))
}
