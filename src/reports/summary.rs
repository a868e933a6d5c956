//! Text summary report for the terminal.
//!
//! Sectioned plain text: top-N ranking table, threat-intelligence summary
//! with an EPSS probability distribution, risk-level distribution, and the
//! cache statistics when a persistent cache was in play.

use crate::enrichment::CacheStats;
use crate::model::EnrichedVulnerability;
use crate::pipeline::TriageResults;
use crate::scoring::RiskLevel;
use std::fmt::Write as _;

const RULE: &str =
    "======================================================================";

/// Render the terminal summary.
#[must_use]
pub fn render_summary(
    results: &TriageResults,
    cache_stats: Option<&CacheStats>,
    top_n: usize,
) -> String {
    let mut out = String::new();
    let vulns = &results.vulnerabilities;

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, " PRIORITIZATION REPORT");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);

    render_top_table(&mut out, vulns, top_n);
    render_intel_summary(&mut out, results);
    render_risk_distribution(&mut out, vulns);

    if let Some(stats) = cache_stats {
        render_cache_stats(&mut out, stats);
    }

    out
}

fn render_top_table(out: &mut String, vulns: &[EnrichedVulnerability], top_n: usize) {
    let shown = vulns.len().min(top_n);
    let _ = writeln!(out, "Top {shown} of {} unique CVEs:", vulns.len());
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:>4}  {:<16} {:>6}  {:<8} {:>5}  {:>8}  {:>4}  {}",
        "Rank", "CVE", "Risk", "Level", "CVSS", "EPSS", "KEV", "Title"
    );

    for (index, vuln) in vulns.iter().take(top_n).enumerate() {
        let kev = match vuln.in_kev {
            Some(true) => "YES",
            Some(false) => "no",
            None => "?",
        };
        let _ = writeln!(
            out,
            "{:>4}  {:<16} {:>6.2}  {:<8} {:>5}  {:>8}  {:>4}  {}",
            index + 1,
            vuln.cve_id,
            vuln.risk_score,
            vuln.risk_level.to_string(),
            vuln.cvss
                .map_or_else(|| "-".to_string(), |v| format!("{v:.1}")),
            vuln.epss_score
                .map_or_else(|| "-".to_string(), |v| format!("{:.2}%", v * 100.0)),
            kev,
            vuln.title,
        );
    }
    let _ = writeln!(out);
}

fn render_intel_summary(out: &mut String, results: &TriageResults) {
    let vulns = &results.vulnerabilities;
    let stats = &results.enrichment;
    let total = vulns.len();

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, " THREAT INTELLIGENCE SUMMARY");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
    let _ = writeln!(out, "Total unique CVEs: {total}");
    let _ = writeln!(
        out,
        "CVEs with EPSS scores: {}/{} ({})",
        stats.epss_scored,
        total,
        percent(stats.epss_scored, total)
    );
    let _ = writeln!(
        out,
        "CVEs in CISA KEV: {} ({})",
        stats.kev_listed,
        percent(stats.kev_listed, total)
    );
    if stats.epss_unavailable > 0 || stats.kev_unavailable > 0 {
        let _ = writeln!(
            out,
            "Intelligence unavailable: {} EPSS, {} KEV (source unreachable)",
            stats.epss_unavailable, stats.kev_unavailable
        );
    }

    let scores: Vec<f64> = vulns.iter().filter_map(|v| v.epss_score).collect();
    if !scores.is_empty() {
        let avg = scores.iter().sum::<f64>() / scores.len() as f64;
        let max = scores.iter().cloned().fold(0.0_f64, f64::max);
        let _ = writeln!(out);
        let _ = writeln!(out, "EPSS score statistics:");
        let _ = writeln!(out, "  Average: {avg:.4} ({:.2}%)", avg * 100.0);
        let _ = writeln!(out, "  Maximum: {max:.4} ({:.2}%)", max * 100.0);
        let _ = writeln!(out);
        let _ = writeln!(out, "Exploitation probability distribution:");
        let buckets = [
            ("Very High (>50%)", 0.5_f64, f64::MAX),
            ("High (10-50%)", 0.1, 0.5),
            ("Medium (1-10%)", 0.01, 0.1),
            ("Low (<1%)", 0.0, 0.01),
        ];
        for (label, low, high) in buckets {
            let count = scores.iter().filter(|s| **s > low && **s <= high).count();
            let _ = writeln!(out, "  {label:<18} {count} CVEs");
        }
    }
    let _ = writeln!(out);
}

fn render_risk_distribution(out: &mut String, vulns: &[EnrichedVulnerability]) {
    let _ = writeln!(out, "Risk level distribution:");
    for level in [
        RiskLevel::Critical,
        RiskLevel::High,
        RiskLevel::Medium,
        RiskLevel::Low,
        RiskLevel::Minimal,
    ] {
        let count = vulns.iter().filter(|v| v.risk_level == level).count();
        let _ = writeln!(
            out,
            "  {:<8} {:>4} ({})",
            level.to_string(),
            count,
            percent(count, vulns.len())
        );
    }
    let _ = writeln!(out);
}

fn render_cache_stats(out: &mut String, stats: &CacheStats) {
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, " CACHE STATISTICS");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out);
    let _ = writeln!(out, "EPSS entries cached: {}", stats.epss_entries);
    let _ = writeln!(out, "KEV entries cached:  {}", stats.kev_entries);
    let _ = writeln!(
        out,
        "Recorded calls: {} total, {} served from cache",
        stats.total_calls, stats.cached_calls
    );
    if !stats.calls_last_24h_by_source.is_empty() {
        let mut sources: Vec<_> = stats.calls_last_24h_by_source.iter().collect();
        sources.sort();
        let _ = writeln!(out, "Calls in the last 24h:");
        for (source, count) in sources {
            let _ = writeln!(out, "  {source}: {count}");
        }
    }
    let _ = writeln!(out);
}

fn percent(part: usize, total: usize) -> String {
    if total == 0 {
        return "0.0%".to_string();
    }
    format!("{:.1}%", part as f64 / total as f64 * 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrichment::EnrichmentStats;
    use crate::model::IntelStatus;

    fn results() -> TriageResults {
        TriageResults {
            vulnerabilities: vec![
                EnrichedVulnerability {
                    cve_id: "CVE-2023-46604".to_string(),
                    title: "Apache ActiveMQ RCE".to_string(),
                    cvss: Some(9.8),
                    epss_score: Some(0.97),
                    epss_percentile: Some(99.9),
                    epss_status: IntelStatus::Scored,
                    in_kev: Some(true),
                    affected_hosts: vec!["web-01".to_string()],
                    occurrences: 1,
                    risk_score: 97.2,
                    risk_level: RiskLevel::Critical,
                },
                EnrichedVulnerability {
                    cve_id: "CVE-2021-41617".to_string(),
                    title: "OpenSSH Privilege Escalation".to_string(),
                    cvss: Some(7.0),
                    epss_score: Some(0.002),
                    epss_percentile: Some(52.0),
                    epss_status: IntelStatus::Scored,
                    in_kev: Some(false),
                    affected_hosts: vec![],
                    occurrences: 3,
                    risk_score: 28.1,
                    risk_level: RiskLevel::Medium,
                },
            ],
            enrichment: EnrichmentStats {
                identifiers_queried: 2,
                epss_scored: 2,
                kev_listed: 1,
                kev_not_listed: 1,
                ..EnrichmentStats::default()
            },
        }
    }

    #[test]
    fn test_summary_contains_sections() {
        let summary = render_summary(&results(), None, 20);
        assert!(summary.contains("PRIORITIZATION REPORT"));
        assert!(summary.contains("THREAT INTELLIGENCE SUMMARY"));
        assert!(summary.contains("Risk level distribution:"));
        assert!(summary.contains("CVE-2023-46604"));
        assert!(!summary.contains("CACHE STATISTICS"));
    }

    #[test]
    fn test_top_n_truncates_table() {
        let summary = render_summary(&results(), None, 1);
        assert!(summary.contains("Top 1 of 2"));
        // Second entry falls out of the table but stays in distributions.
        assert!(!summary.contains("OpenSSH Privilege Escalation"));
    }

    #[test]
    fn test_cache_section_rendered_when_present() {
        let stats = CacheStats {
            epss_entries: 10,
            kev_entries: 1300,
            total_calls: 7,
            cached_calls: 3,
            calls_last_24h_by_source: std::collections::HashMap::from([(
                "EPSS".to_string(),
                4,
            )]),
        };
        let summary = render_summary(&results(), Some(&stats), 20);
        assert!(summary.contains("CACHE STATISTICS"));
        assert!(summary.contains("EPSS entries cached: 10"));
        assert!(summary.contains("EPSS: 4"));
    }

    #[test]
    fn test_empty_results_do_not_divide_by_zero() {
        let empty = TriageResults {
            vulnerabilities: vec![],
            enrichment: EnrichmentStats::default(),
        };
        let summary = render_summary(&empty, None, 20);
        assert!(summary.contains("Total unique CVEs: 0"));
        assert!(summary.contains("0.0%"));
    }
}
