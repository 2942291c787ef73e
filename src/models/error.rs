//! Error types for pagefetch.
//!
//! Epistemic taxonomy:
//! - I^B materialized: Transient failures (network, timeout, non-success status) → retried
//! - B_i falsified: Structural failures (body or record shape is wrong) → fatal
//! - K_i violated: Persistence failures → fatal
//! - I^R unresolved: Settings that cannot drive a run → fatal before the first page

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Top-level error type for pagefetch.
#[derive(Debug, Error)]
pub enum FetchError {
    // ═══════════════════════════════════════════════════════════════════
    // I^B MATERIALIZED — Transient, retried on the same page
    // ═══════════════════════════════════════════════════════════════════

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status} on page {page}: {message}")]
    HttpStatus {
        page: u32,
        status: u16,
        message: String,
    },

    // ═══════════════════════════════════════════════════════════════════
    // B_i FALSIFIED — Response or record shape violates the contract
    // ═══════════════════════════════════════════════════════════════════

    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    // ═══════════════════════════════════════════════════════════════════
    // PERSISTENCE — Durable state could not be written or read
    // ═══════════════════════════════════════════════════════════════════

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Shape violations in fetched pages or persisted tables.
///
/// Retrying never fixes these: the same request reproduces the same body.
#[derive(Debug, Error)]
pub enum StructuralError {
    #[error("record {index} on page {page} has no id")]
    MissingId { page: u32, index: usize },

    #[error("page {page} body is not valid JSON: {message}")]
    InvalidBody { page: u32, message: String },

    #[error("page {page} body has no `data` list")]
    MissingData { page: u32 },

    #[error("existing table {path} is unreadable: {message}")]
    InvalidTable { path: PathBuf, message: String },
}

/// Coarse classification used for logging and retry decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Transient,
    Structural,
    Persistence,
    Config,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Transient => "transient",
            Self::Structural => "structural",
            Self::Persistence => "persistence",
            Self::Config => "config",
        };
        f.write_str(name)
    }
}

impl FetchError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::HttpStatus { .. } => ErrorKind::Transient,
            Self::Structural(_) => ErrorKind::Structural,
            Self::Io { .. } | Self::Csv(_) => ErrorKind::Persistence,
            Self::Config(_) => ErrorKind::Config,
        }
    }

    /// Check if this error is retryable.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

/// Result type alias for pagefetch.
pub type Result<T> = std::result::Result<T, FetchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let transient = FetchError::HttpStatus {
            page: 3,
            status: 503,
            message: "unavailable".to_string(),
        };
        assert!(transient.is_transient());
        assert!(FetchError::Timeout(Duration::from_secs(1)).is_transient());

        let structural: FetchError = StructuralError::MissingId { page: 1, index: 0 }.into();
        assert_eq!(structural.kind(), ErrorKind::Structural);
        assert!(!structural.is_transient());

        let io = FetchError::io(
            "writing table",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(io.kind(), ErrorKind::Persistence);
        assert_eq!(io.to_string(), "IO error: writing table");
    }
}
