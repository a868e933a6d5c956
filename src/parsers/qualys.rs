//! Qualys scan-results XML parser.
//!
//! Targets the classic `SCAN/IP/VULNS/CAT/VULN` layout with
//! `CVE_ID_LIST/CVE_ID/ID` references. Qualys exports vary across product
//! generations, so when the structured walk yields nothing the parser falls
//! back to scanning the raw document for CVE identifiers; a degraded parse
//! still beats an empty one for triage purposes.

use super::cve_pattern;
use crate::enrichment::kev::normalize_cve_id;
use crate::error::{Result, ScanParseErrorKind, TriageError};
use crate::model::Finding;
use serde::Deserialize;
use std::collections::BTreeSet;

#[derive(Debug, Deserialize)]
struct QualysScan {
    #[serde(rename = "IP", default)]
    ips: Vec<QualysIp>,
}

#[derive(Debug, Deserialize)]
struct QualysIp {
    #[serde(rename = "@value", default)]
    value: String,
    #[serde(rename = "VULNS")]
    vulns: Option<QualysVulns>,
}

#[derive(Debug, Deserialize)]
struct QualysVulns {
    #[serde(rename = "CAT", default)]
    categories: Vec<QualysCat>,
}

#[derive(Debug, Deserialize)]
struct QualysCat {
    #[serde(rename = "VULN", default)]
    vulns: Vec<QualysVuln>,
}

#[derive(Debug, Deserialize)]
struct QualysVuln {
    #[serde(rename = "@number", default)]
    number: String,
    #[serde(rename = "TITLE", default)]
    title: String,
    #[serde(rename = "CVSS3_BASE")]
    cvss3_base: Option<String>,
    #[serde(rename = "CVSS_BASE")]
    cvss_base: Option<String>,
    #[serde(rename = "CVE_ID_LIST")]
    cve_id_list: Option<CveIdList>,
}

#[derive(Debug, Deserialize)]
struct CveIdList {
    #[serde(rename = "CVE_ID", default)]
    ids: Vec<CveId>,
}

#[derive(Debug, Deserialize)]
struct CveId {
    #[serde(rename = "ID", default)]
    id: String,
}

/// Parse Qualys scan-results XML content into findings.
pub fn parse_str(content: &str) -> Result<Vec<Finding>> {
    if !content.contains("<SCAN") {
        return Err(TriageError::parse(
            "missing SCAN root element",
            ScanParseErrorKind::UnknownFormat,
        ));
    }

    let findings = match quick_xml::de::from_str::<QualysScan>(content) {
        Ok(scan) => structured_findings(&scan),
        Err(e) => {
            tracing::warn!("structured Qualys parse failed, falling back to scan: {e}");
            Vec::new()
        }
    };

    if !findings.is_empty() {
        tracing::debug!(findings = findings.len(), "parsed Qualys export");
        return Ok(findings);
    }

    Ok(fallback_findings(content))
}

fn structured_findings(scan: &QualysScan) -> Vec<Finding> {
    let mut findings = Vec::new();
    for ip in &scan.ips {
        let Some(vulns) = &ip.vulns else { continue };
        for cat in &vulns.categories {
            for vuln in &cat.vulns {
                let cvss = parse_cvss(vuln.cvss3_base.as_deref())
                    .or_else(|| parse_cvss(vuln.cvss_base.as_deref()));
                let Some(list) = &vuln.cve_id_list else {
                    continue;
                };
                for cve in &list.ids {
                    let cve_id = normalize_cve_id(&cve.id);
                    if !cve_pattern().is_match(&cve_id) {
                        continue;
                    }
                    findings.push(Finding {
                        cve_id,
                        title: vuln.title.trim().to_string(),
                        cvss,
                        host: (!ip.value.is_empty()).then(|| ip.value.clone()),
                        plugin_id: (!vuln.number.is_empty()).then(|| vuln.number.clone()),
                    });
                }
            }
        }
    }
    findings
}

/// Qualys wraps scores in CDATA and sometimes suffixes them; take the
/// leading numeric token.
fn parse_cvss(raw: Option<&str>) -> Option<f64> {
    let raw = raw?.trim();
    let numeric: String = raw
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    numeric.parse().ok()
}

/// Last resort: pull unique CVE identifiers out of the raw document.
fn fallback_findings(content: &str) -> Vec<Finding> {
    let ids: BTreeSet<String> = cve_pattern()
        .find_iter(content)
        .map(|m| normalize_cve_id(m.as_str()))
        .collect();
    if !ids.is_empty() {
        tracing::warn!(
            identifiers = ids.len(),
            "recovered CVE identifiers without host or title context"
        );
    }
    ids.into_iter()
        .map(|cve_id| Finding {
            cve_id,
            title: String::new(),
            cvss: None,
            host: None,
            plugin_id: None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<SCAN>
  <IP value="10.20.0.5" name="app-02.internal">
    <VULNS>
      <CAT number="1" value="General remote services">
        <VULN number="38170" severity="4">
          <TITLE><![CDATA[OpenSSH Privilege Escalation]]></TITLE>
          <CVSS_BASE><![CDATA[7.8]]></CVSS_BASE>
          <CVE_ID_LIST>
            <CVE_ID>
              <ID><![CDATA[CVE-2021-41617]]></ID>
              <URL><![CDATA[https://nvd.nist.gov/vuln/detail/CVE-2021-41617]]></URL>
            </CVE_ID>
          </CVE_ID_LIST>
        </VULN>
        <VULN number="91234" severity="5">
          <TITLE><![CDATA[Fortinet FortiOS Out-of-Bounds Write]]></TITLE>
          <CVSS3_BASE><![CDATA[9.6]]></CVSS3_BASE>
          <CVE_ID_LIST>
            <CVE_ID><ID><![CDATA[CVE-2024-21762]]></ID></CVE_ID>
          </CVE_ID_LIST>
        </VULN>
      </CAT>
    </VULNS>
  </IP>
</SCAN>"#;

    #[test]
    fn test_parse_structured_scan() {
        let findings = parse_str(SAMPLE).unwrap();
        assert_eq!(findings.len(), 2);

        let fortios = findings
            .iter()
            .find(|f| f.cve_id == "CVE-2024-21762")
            .unwrap();
        assert_eq!(fortios.cvss, Some(9.6));
        assert_eq!(fortios.host.as_deref(), Some("10.20.0.5"));
        assert_eq!(fortios.plugin_id.as_deref(), Some("91234"));
    }

    #[test]
    fn test_fallback_extracts_identifiers() {
        let xml = r#"<SCAN><SUMMARY>CVE-2024-3094 and CVE-2023-46604 observed</SUMMARY></SCAN>"#;
        let findings = parse_str(xml).unwrap();
        assert_eq!(findings.len(), 2);
        assert!(findings.iter().all(|f| f.host.is_none()));
    }

    #[test]
    fn test_parse_cvss_handles_cdata_noise() {
        assert_eq!(parse_cvss(Some("7.8")), Some(7.8));
        assert_eq!(parse_cvss(Some("9.6 (v3)")), Some(9.6));
        assert_eq!(parse_cvss(Some("-")), None);
        assert_eq!(parse_cvss(None), None);
    }

    #[test]
    fn test_wrong_root_is_unknown_format() {
        let err = parse_str("<NessusClientData_v2/>").unwrap_err();
        assert!(matches!(
            err,
            TriageError::Parse {
                source: ScanParseErrorKind::UnknownFormat,
                ..
            }
        ));
    }
}
