//! HYG-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, AuditError>;

/// Top-level error type for the hygiene auditor.
///
/// Audit stages never surface these to the caller of a run; they are degraded
/// into findings. `AuditError` is for configuration loading, persistence
/// helpers, and other library entry points that can genuinely fail.
#[derive(Debug, Error)]
pub enum AuditError {
    #[error("[HYG-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[HYG-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[HYG-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[HYG-2001] scan failure for {path}: {details}")]
    Scan { path: PathBuf, details: String },

    #[error("[HYG-2002] malformed document {path}: {details}")]
    MalformedDocument { path: PathBuf, details: String },

    #[error("[HYG-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[HYG-3001] collaborator `{command}` failed: {details}")]
    Collaborator { command: String, details: String },

    #[error("[HYG-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[HYG-3003] collaborator `{command}` timed out after {timeout_secs}s")]
    Timeout { command: String, timeout_secs: u64 },
}

impl AuditError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "HYG-1001",
            Self::MissingConfig { .. } => "HYG-1002",
            Self::ConfigParse { .. } => "HYG-1003",
            Self::Scan { .. } => "HYG-2001",
            Self::MalformedDocument { .. } => "HYG-2002",
            Self::Serialization { .. } => "HYG-2101",
            Self::Collaborator { .. } => "HYG-3001",
            Self::Io { .. } => "HYG-3002",
            Self::Timeout { .. } => "HYG-3003",
        }
    }

    /// Whether a later run might not hit the same failure.
    ///
    /// The auditor itself never retries; this only labels log entries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Collaborator { .. } | Self::Timeout { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for AuditError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
