//! EPSS API response structures.
//!
//! The FIRST.org endpoint returns numeric fields as JSON strings and the
//! percentile as a 0-1 fraction; both quirks are absorbed here so the rest
//! of the crate speaks the data model (floats, percentile 0-100).

use serde::{Deserialize, Deserializer};

/// Top-level EPSS API response envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct EpssResponse {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub total: u64,
    #[serde(rename = "model-version", default)]
    pub model_version: String,
    #[serde(rename = "score-date", default)]
    pub score_date: String,
    #[serde(default)]
    pub data: Vec<EpssItem>,
}

/// One scored identifier in the response.
#[derive(Debug, Clone, Deserialize)]
pub struct EpssItem {
    pub cve: String,
    #[serde(deserialize_with = "lenient_f64")]
    pub epss: f64,
    #[serde(deserialize_with = "lenient_f64")]
    pub percentile: f64,
    /// Per-identifier score date; may be absent in older responses.
    #[serde(default)]
    pub date: String,
}

/// Accept a float encoded either as a JSON number or a JSON string.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(f64),
        Text(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(v) => Ok(v),
        Raw::Text(s) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_string_encoded_floats() {
        let json = r#"{
            "status": "OK",
            "status-code": 200,
            "version": "1.0",
            "model-version": "v2025.03.14",
            "score-date": "2025-08-01T00:00:00+0000",
            "total": 2,
            "data": [
                {"cve": "CVE-2024-3094", "epss": "0.92921", "percentile": "0.99858", "date": "2025-08-01"},
                {"cve": "CVE-2024-21762", "epss": "0.96104", "percentile": "0.99984", "date": "2025-08-01"}
            ]
        }"#;

        let parsed: EpssResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.total, 2);
        assert_eq!(parsed.model_version, "v2025.03.14");
        assert_eq!(parsed.data.len(), 2);
        assert!((parsed.data[0].epss - 0.92921).abs() < 1e-9);
        assert!((parsed.data[1].percentile - 0.99984).abs() < 1e-9);
    }

    #[test]
    fn test_parse_numeric_floats_and_missing_fields() {
        let json = r#"{"total": 1, "data": [{"cve": "CVE-2023-46604", "epss": 0.97, "percentile": 0.999}]}"#;
        let parsed: EpssResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.data[0].date, "");
        assert_eq!(parsed.model_version, "");
        assert!((parsed.data[0].epss - 0.97).abs() < 1e-9);
    }

    #[test]
    fn test_empty_data_means_no_scores() {
        let json = r#"{"status": "OK", "total": 0, "data": []}"#;
        let parsed: EpssResponse = serde_json::from_str(json).unwrap();
        assert!(parsed.data.is_empty());
    }
}
