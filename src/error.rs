//! Unified error types for vuln-triage.
//!
//! One library-wide error enum with context strings and specific kind
//! sub-enums, so callers can match on the failure class without losing the
//! operation that produced it.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for vuln-triage operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TriageError {
    /// Errors during scan export parsing
    #[error("Failed to parse scan export: {context}")]
    Parse {
        context: String,
        #[source]
        source: ScanParseErrorKind,
    },

    /// The persistent store is unreachable or a write could not be committed.
    ///
    /// Aborts the specific cache call only; callers treat it as transient
    /// and may retry or fall back to a remote fetch.
    #[error("Enrichment store unavailable: {context}")]
    Store {
        context: String,
        #[source]
        source: rusqlite::Error,
    },

    /// A remote intelligence source failed or returned garbage.
    ///
    /// Never fatal to a batch: the orchestrator degrades the affected
    /// identifiers to an unavailable outcome.
    #[error("Remote source failed: {context}")]
    Remote {
        context: String,
        #[source]
        source: RemoteErrorKind,
    },

    /// IO errors with path context
    #[error("IO error at {path:?}: {message}")]
    Io {
        path: Option<PathBuf>,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Configuration errors
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Specific scan-parse error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ScanParseErrorKind {
    #[error("Unknown scan format - expected Nessus or Qualys XML markers")]
    UnknownFormat,

    #[error("Invalid XML structure: {0}")]
    InvalidXml(String),

    #[error("Missing required field: {field} in {context}")]
    MissingField { field: String, context: String },

    #[error("No findings with CVE identifiers in scan")]
    EmptyScan,
}

/// Specific remote-source error kinds
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum RemoteErrorKind {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl RemoteErrorKind {
    /// HTTP status to record in the audit log for this failure.
    ///
    /// Network-level failures never produced a status line; the ledger
    /// records those as 0.
    #[must_use]
    pub const fn audit_status(&self) -> u16 {
        match self {
            Self::Status(code) => *code,
            Self::Network(_) | Self::Timeout | Self::Malformed(_) => 0,
        }
    }
}

/// Convenient Result type for vuln-triage operations
pub type Result<T> = std::result::Result<T, TriageError>;

impl TriageError {
    /// Create a parse error with context
    pub fn parse(context: impl Into<String>, source: ScanParseErrorKind) -> Self {
        Self::Parse {
            context: context.into(),
            source,
        }
    }

    /// Create a store error with context
    pub fn store(context: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }

    /// Create a remote-source error with context
    pub fn remote(context: impl Into<String>, source: RemoteErrorKind) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    /// Create an IO error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        let message = format!("{source}");
        Self::Io {
            path: Some(path),
            message,
            source,
        }
    }

    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }
}

impl From<std::io::Error> for TriageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            path: None,
            message: format!("{err}"),
            source: err,
        }
    }
}

impl From<rusqlite::Error> for TriageError {
    fn from(err: rusqlite::Error) -> Self {
        Self::store("store operation", err)
    }
}
