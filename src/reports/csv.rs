//! CSV report generator.
//!
//! One row per unique CVE, ranked by risk, suitable for spreadsheet import
//! and patch-planning pipelines.

use crate::model::EnrichedVulnerability;

/// Render the prioritized CSV report.
#[must_use]
pub fn render_csv(vulnerabilities: &[EnrichedVulnerability]) -> String {
    let mut content = String::new();
    content.push_str(
        "Rank,CVE,Risk Score,Risk Level,CVSS,EPSS Score,EPSS Percentile,In CISA KEV,Affected Hosts,Occurrences,Title\n",
    );

    for (index, vuln) in vulnerabilities.iter().enumerate() {
        let kev = match vuln.in_kev {
            Some(true) => "yes",
            Some(false) => "no",
            None => "unknown",
        };
        content.push_str(&format!(
            "{},{},{:.2},{},{},{},{},{},\"{}\",{},\"{}\"\n",
            index + 1,
            vuln.cve_id,
            vuln.risk_score,
            vuln.risk_level,
            vuln.cvss.map_or_else(|| "-".to_string(), |v| format!("{v:.1}")),
            vuln.epss_score
                .map_or_else(|| "-".to_string(), |v| format!("{v:.5}")),
            vuln.epss_percentile
                .map_or_else(|| "-".to_string(), |v| format!("{v:.1}")),
            kev,
            escape_csv(&vuln.affected_hosts.join("; ")),
            vuln.occurrences,
            escape_csv(&vuln.title),
        ));
    }

    content
}

/// Escape a string for CSV embedding: double-quote escaping per RFC 4180,
/// plus newline flattening since fields are already wrapped in double
/// quotes.
fn escape_csv(s: &str) -> String {
    s.replace('"', "\"\"").replace('\n', " ")
}
