//! Nessus `.nessus` (v2) export parser.
//!
//! One `ReportItem` can reference several CVEs; each becomes its own
//! [`Finding`] so enrichment and aggregation key purely on the CVE
//! identifier. Items without CVE references (informational plugins) are
//! skipped.

use super::cve_pattern;
use crate::enrichment::kev::normalize_cve_id;
use crate::error::{Result, ScanParseErrorKind, TriageError};
use crate::model::Finding;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct NessusClientData {
    #[serde(rename = "Report", default)]
    reports: Vec<Report>,
}

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(rename = "ReportHost", default)]
    hosts: Vec<ReportHost>,
}

#[derive(Debug, Deserialize)]
struct ReportHost {
    #[serde(rename = "@name", default)]
    name: String,
    #[serde(rename = "ReportItem", default)]
    items: Vec<ReportItem>,
}

#[derive(Debug, Deserialize)]
struct ReportItem {
    #[serde(rename = "@pluginID", default)]
    plugin_id: String,
    #[serde(rename = "@pluginName", default)]
    plugin_name: String,
    #[serde(rename = "cve", default)]
    cves: Vec<String>,
    #[serde(rename = "cvss3_base_score")]
    cvss3_base_score: Option<f64>,
    #[serde(rename = "cvss_base_score")]
    cvss_base_score: Option<f64>,
}

/// Parse Nessus v2 XML content into findings.
pub fn parse_str(content: &str) -> Result<Vec<Finding>> {
    if !content.contains("<NessusClientData_v2") {
        return Err(TriageError::parse(
            "missing NessusClientData_v2 root element",
            ScanParseErrorKind::UnknownFormat,
        ));
    }

    let scan: NessusClientData = quick_xml::de::from_str(content).map_err(|e| {
        TriageError::parse(
            "reading Nessus XML",
            ScanParseErrorKind::InvalidXml(e.to_string()),
        )
    })?;

    let mut findings = Vec::new();
    for report in &scan.reports {
        for host in &report.hosts {
            for item in &host.items {
                // CVSSv3 wins when the plugin reports both generations.
                let cvss = item.cvss3_base_score.or(item.cvss_base_score);
                for cve in &item.cves {
                    let cve_id = normalize_cve_id(cve);
                    if !cve_pattern().is_match(&cve_id) {
                        continue;
                    }
                    findings.push(Finding {
                        cve_id,
                        title: item.plugin_name.clone(),
                        cvss,
                        host: (!host.name.is_empty()).then(|| host.name.clone()),
                        plugin_id: (!item.plugin_id.is_empty())
                            .then(|| item.plugin_id.clone()),
                    });
                }
            }
        }
    }

    tracing::debug!(findings = findings.len(), "parsed Nessus export");
    Ok(findings)
}
