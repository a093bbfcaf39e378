//! UW-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, UwError>;

/// Top-level error type for unitwatch.
#[derive(Debug, Error)]
pub enum UwError {
    #[error("[UW-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[UW-1002] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[UW-2001] unit listing failed: {details}")]
    Connection { details: String },

    #[error("[UW-2101] state file {path} is corrupt: {details}")]
    StateCorrupt { path: PathBuf, details: String },

    #[error("[UW-2102] state file {path} is unreadable: {source}")]
    StateUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[UW-2103] failed to write state file {path}: {source}")]
    StateWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[UW-2201] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[UW-3001] notification delivery failed via {channel}: {details}")]
    Delivery {
        channel: &'static str,
        details: String,
    },

    #[error("[UW-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[UW-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl UwError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "UW-1001",
            Self::ConfigParse { .. } => "UW-1002",
            Self::Connection { .. } => "UW-2001",
            Self::StateCorrupt { .. } => "UW-2101",
            Self::StateUnreadable { .. } => "UW-2102",
            Self::StateWriteFailed { .. } => "UW-2103",
            Self::Serialization { .. } => "UW-2201",
            Self::Delivery { .. } => "UW-3001",
            Self::Io { .. } => "UW-3002",
            Self::Runtime { .. } => "UW-3900",
        }
    }

    /// Whether a fresh watcher (or a repeated delivery) might succeed.
    ///
    /// Corrupt state is never retryable: restarting would only re-read the
    /// same bytes.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::StateWriteFailed { .. }
                | Self::Delivery { .. }
                | Self::Io { .. }
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

    #[must_use]
    pub fn connection(details: impl Into<String>) -> Self {
        Self::Connection {
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for UwError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for UwError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
