//! CISA KEV catalog HTTP client.

use super::catalog::{KevCatalogResponse, KevSnapshot};
use super::KevSource;
use crate::error::{RemoteErrorKind, Result, TriageError};
use std::time::Duration;

/// Default CISA KEV catalog URL.
pub const KEV_CATALOG_URL: &str =
    "https://www.cisa.gov/sites/default/files/feeds/known_exploited_vulnerabilities.json";

/// KEV client configuration.
#[derive(Debug, Clone)]
pub struct KevClientConfig {
    /// KEV catalog URL
    pub kev_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for KevClientConfig {
    fn default() -> Self {
        Self {
            kev_url: KEV_CATALOG_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Blocking HTTP client for the KEV catalog feed.
pub struct KevClient {
    client: reqwest::blocking::Client,
    config: KevClientConfig,
}

impl KevClient {
    /// Create a new KEV client.
    pub fn new(config: KevClientConfig) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!(
                env!("CARGO_PKG_NAME"),
                "/",
                env!("CARGO_PKG_VERSION")
            ))
            .build()
            .map_err(|e| {
                TriageError::remote(
                    "building KEV HTTP client",
                    RemoteErrorKind::Network(e.to_string()),
                )
            })?;
        Ok(Self { client, config })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(KevClientConfig::default())
    }
}

impl KevSource for KevClient {
    fn fetch_catalog(&self) -> std::result::Result<KevSnapshot, RemoteErrorKind> {
        tracing::debug!(url = %self.config.kev_url, "fetching KEV catalog");

        let response = self.client.get(&self.config.kev_url).send().map_err(|e| {
            if e.is_timeout() {
                RemoteErrorKind::Timeout
            } else {
                RemoteErrorKind::Network(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteErrorKind::Status(status.as_u16()));
        }

        let parsed: KevCatalogResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                RemoteErrorKind::Timeout
            } else {
                RemoteErrorKind::Malformed(e.to_string())
            }
        })?;

        Ok(KevSnapshot::from_response(parsed))
    }

    fn endpoint(&self) -> String {
        self.config.kev_url.clone()
    }
}
