//! CISA KEV (Known Exploited Vulnerabilities) catalog structures.

use serde::Deserialize;

/// Raw KEV catalog feed as published by CISA.
#[derive(Debug, Clone, Deserialize)]
pub struct KevCatalogResponse {
    /// Catalog title
    #[serde(default)]
    pub title: String,
    /// Catalog version
    #[serde(rename = "catalogVersion", default)]
    pub catalog_version: String,
    /// Date catalog was generated
    #[serde(rename = "dateReleased", default)]
    pub date_released: String,
    /// Total vulnerabilities in catalog
    #[serde(default)]
    pub count: usize,
    /// List of vulnerabilities
    pub vulnerabilities: Vec<KevVulnerability>,
}

/// Individual KEV entry from the CISA feed.
#[derive(Debug, Clone, Deserialize)]
pub struct KevVulnerability {
    #[serde(rename = "cveID")]
    pub cve_id: String,
    #[serde(rename = "vendorProject", default)]
    pub vendor_project: String,
    #[serde(default)]
    pub product: String,
    #[serde(rename = "vulnerabilityName", default)]
    pub vulnerability_name: String,
    #[serde(rename = "dateAdded", default)]
    pub date_added: String,
    #[serde(rename = "shortDescription", default)]
    pub short_description: String,
    #[serde(rename = "requiredAction", default)]
    pub required_action: String,
    #[serde(rename = "dueDate", default)]
    pub due_date: String,
}

/// One KEV entry in the form the cache stores.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KevEntry {
    pub cve_id: String,
    pub vendor_project: String,
    pub product: String,
    pub vulnerability_name: String,
    pub date_added: String,
    pub short_description: String,
    pub required_action: String,
    pub due_date: String,
}

impl KevEntry {
    /// Build from a raw feed item, normalizing the identifier.
    #[must_use]
    pub fn from_raw(raw: KevVulnerability) -> Self {
        Self {
            cve_id: normalize_cve_id(&raw.cve_id),
            vendor_project: raw.vendor_project,
            product: raw.product,
            vulnerability_name: raw.vulnerability_name,
            date_added: raw.date_added,
            short_description: raw.short_description,
            required_action: raw.required_action,
            due_date: raw.due_date,
        }
    }
}

/// A fetched full-catalog snapshot.
#[derive(Debug, Clone)]
pub struct KevSnapshot {
    pub catalog_version: String,
    pub date_released: String,
    pub entries: Vec<KevEntry>,
}

impl KevSnapshot {
    /// Normalize a raw feed response.
    #[must_use]
    pub fn from_response(response: KevCatalogResponse) -> Self {
        Self {
            catalog_version: response.catalog_version,
            date_released: response.date_released,
            entries: response
                .vulnerabilities
                .into_iter()
                .map(KevEntry::from_raw)
                .collect(),
        }
    }
}

/// Normalize a CVE identifier for consistent lookup.
#[must_use]
pub fn normalize_cve_id(cve_id: &str) -> String {
    cve_id.trim().to_uppercase()
}
