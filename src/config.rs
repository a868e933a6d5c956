//! Application configuration.
//!
//! Defaults → optional YAML config file → command-line overrides, merged in
//! that order. Every knob the enrichment pipeline honors lives here so the
//! CLI and library callers share one validated source of truth.

use crate::enrichment::MAX_BATCH_SIZE;
use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TriageConfig {
    pub cache: CacheConfig,
    pub api: ApiConfig,
    pub output: OutputConfig,
}

/// Enrichment cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path to the SQLite cache database
    pub db_path: PathBuf,
    /// Maximum acceptable age for cached EPSS scores, in days
    pub epss_max_age_days: i64,
    /// Maximum acceptable age for cached KEV entries, in days
    pub kev_max_age_days: i64,
    /// Disable persistence entirely (an in-memory store is still used so
    /// one run dedups its own lookups)
    pub enabled: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("triage-cache.db"),
            epss_max_age_days: crate::enrichment::freshness::epss_default_max_age().num_days(),
            kev_max_age_days: crate::enrichment::freshness::kev_default_max_age().num_days(),
            enabled: true,
        }
    }
}

/// Remote source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL for the EPSS API
    pub epss_base_url: String,
    /// URL of the CISA KEV catalog feed
    pub kev_url: String,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Identifiers per batched EPSS request
    pub batch_size: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            epss_base_url: "https://api.first.org".to_string(),
            kev_url:
                "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json"
                    .to_string(),
            timeout_secs: 10,
            batch_size: crate::enrichment::DEFAULT_BATCH_SIZE,
        }
    }
}

/// Report output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Entries shown in the text summary
    pub top_n: usize,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self { top_n: 20 }
    }
}

impl TriageConfig {
    /// Load configuration from a YAML file, falling back to defaults for
    /// absent keys.
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            std::fs::read_to_string(path).map_err(|e| TriageError::io(path, e))?;
        let config: Self = serde_yaml::from_str(&content)
            .map_err(|e| TriageError::config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants the rest of the pipeline assumes.
    pub fn validate(&self) -> Result<()> {
        if self.cache.epss_max_age_days < 0 || self.cache.kev_max_age_days < 0 {
            return Err(TriageError::config("max-age days must be non-negative"));
        }
        if self.api.batch_size == 0 || self.api.batch_size > MAX_BATCH_SIZE {
            return Err(TriageError::config(format!(
                "batch_size must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.api.timeout_secs == 0 {
            return Err(TriageError::config("timeout_secs must be at least 1"));
        }
        if self.api.epss_base_url.is_empty() || self.api.kev_url.is_empty() {
            return Err(TriageError::config("source URLs must not be empty"));
        }
        Ok(())
    }

    /// Effective EPSS freshness window.
    #[must_use]
    pub fn epss_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache.epss_max_age_days)
    }

    /// Effective KEV freshness window.
    #[must_use]
    pub fn kev_max_age(&self) -> chrono::Duration {
        chrono::Duration::days(self.cache.kev_max_age_days)
    }

    /// Per-request timeout for remote sources.
    #[must_use]
    pub fn api_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.api.timeout_secs)
    }
}
