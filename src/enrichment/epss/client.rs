//! EPSS API HTTP client.

use super::response::EpssResponse;
use super::{EpssBatch, EpssSource};
use crate::error::{RemoteErrorKind, Result, TriageError};
use std::time::Duration;

/// Default base URL for the FIRST.org EPSS API.
pub const EPSS_API_BASE: &str = "https://api.first.org";

/// EPSS client configuration.
#[derive(Debug, Clone)]
pub struct EpssClientConfig {
    /// Base URL for the EPSS API
    pub api_base: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for EpssClientConfig {
    fn default() -> Self {
        Self {
            api_base: EPSS_API_BASE.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Blocking HTTP client for the EPSS API.
pub struct EpssClient {
    client: reqwest::blocking::Client,
    config: EpssClientConfig,
}

impl EpssClient {
    /// Create a new EPSS client.
    pub fn new(config: EpssClientConfig) -> Result<Self> {
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
                    "building EPSS HTTP client",
                    RemoteErrorKind::Network(e.to_string()),
                )
            })?;
        Ok(Self { client, config })
    }

    /// Create with default configuration.
    pub fn with_defaults() -> Result<Self> {
        Self::new(EpssClientConfig::default())
    }

    fn query_url(&self, cve_ids: &[String]) -> String {
        format!(
            "{}/data/v1/epss?cve={}",
            self.config.api_base,
            cve_ids.join(",")
        )
    }
}

fn map_transport_error(err: &reqwest::Error) -> RemoteErrorKind {
    if err.is_timeout() {
        RemoteErrorKind::Timeout
    } else {
        RemoteErrorKind::Network(err.to_string())
    }
}

impl EpssSource for EpssClient {
    fn fetch_batch(&self, cve_ids: &[String]) -> std::result::Result<EpssBatch, RemoteErrorKind> {
        let url = self.query_url(cve_ids);
        tracing::debug!(ids = cve_ids.len(), "querying EPSS API");

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| map_transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteErrorKind::Status(status.as_u16()));
        }

        let parsed: EpssResponse = response.json().map_err(|e| {
            if e.is_timeout() {
                RemoteErrorKind::Timeout
            } else {
                RemoteErrorKind::Malformed(e.to_string())
            }
        })?;

        Ok(EpssBatch::from_response(parsed))
    }

    fn endpoint(&self) -> String {
        format!("{}/data/v1/epss", self.config.api_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_config_defaults() {
        let config = EpssClientConfig::default();
        assert_eq!(config.api_base, EPSS_API_BASE);
        assert_eq!(config.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_query_url_joins_identifiers() {
        let client = EpssClient::with_defaults().unwrap();
        let url = client.query_url(&[
            "CVE-2024-3094".to_string(),
            "CVE-2023-46604".to_string(),
        ]);
        assert_eq!(
            url,
            "https://api.first.org/data/v1/epss?cve=CVE-2024-3094,CVE-2023-46604"
        );
    }
}
