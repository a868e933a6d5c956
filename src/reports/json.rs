//! JSON report generator.

use crate::error::{Result, TriageError};
use crate::pipeline::TriageResults;
use serde::Serialize;

#[derive(Serialize)]
struct JsonReport<'a> {
    generated_at: String,
    total_vulnerabilities: usize,
    enrichment: &'a crate::enrichment::EnrichmentStats,
    vulnerabilities: &'a [crate::model::EnrichedVulnerability],
}

/// Render the full results as pretty-printed JSON.
pub fn render_json(results: &TriageResults) -> Result<String> {
    let report = JsonReport {
        generated_at: chrono::Utc::now().to_rfc3339(),
        total_vulnerabilities: results.vulnerabilities.len(),
        enrichment: &results.enrichment,
        vulnerabilities: &results.vulnerabilities,
    };
    serde_json::to_string_pretty(&report)
        .map_err(|e| TriageError::config(format!("serializing JSON report: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentStats;
    use crate::model::{EnrichedVulnerability, IntelStatus};
    use crate::scoring::RiskLevel;

    #[test]
    fn test_json_report_shape() {
        let results = TriageResults {
            vulnerabilities: vec![EnrichedVulnerability {
                cve_id: "CVE-2024-3094".to_string(),
                title: "XZ Utils Backdoor".to_string(),
                cvss: Some(10.0),
                epss_score: Some(0.92),
                epss_percentile: Some(99.8),
                epss_status: IntelStatus::Scored,
                in_kev: Some(true),
                affected_hosts: vec!["db-01".to_string()],
                occurrences: 1,
                risk_score: 96.8,
                risk_level: RiskLevel::Critical,
            }],
            enrichment: EnrichmentStats::default(),
        };

        let json = render_json(&results).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["total_vulnerabilities"], 1);
        assert_eq!(
            parsed["vulnerabilities"][0]["cve_id"],
            "CVE-2024-3094"
        );
        assert_eq!(parsed["vulnerabilities"][0]["in_kev"], true);
        assert_eq!(parsed["vulnerabilities"][0]["risk_level"], "CRITICAL");
        assert!(parsed["generated_at"].is_string());
    }

    #[test]
    fn test_unknown_kev_serializes_as_null() {
        let results = TriageResults {
            vulnerabilities: vec![EnrichedVulnerability {
                cve_id: "CVE-2024-0001".to_string(),
                title: String::new(),
                cvss: None,
                epss_score: None,
                epss_percentile: None,
                epss_status: IntelStatus::Unavailable,
                in_kev: None,
                affected_hosts: vec![],
                occurrences: 1,
                risk_score: 0.0,
                risk_level: RiskLevel::Minimal,
            }],
            enrichment: EnrichmentStats::default(),
        };

        let json = render_json(&results).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(parsed["vulnerabilities"][0]["in_kev"].is_null());
        assert_eq!(
            parsed["vulnerabilities"][0]["epss_status"],
            "unavailable"
        );
    }
}
