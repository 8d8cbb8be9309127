//! LV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, LvError>;

/// Top-level error type for the log viewer.
#[derive(Debug, Error)]
pub enum LvError {
    #[error("[LV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[LV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[LV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[LV-1101] invalid filter value for {field}: {details}")]
    InvalidFilter {
        field: &'static str,
        details: String,
    },

    #[error("[LV-2001] SQL failure in {context}: {details}")]
    Sql {
        context: &'static str,
        details: String,
    },

    #[error("[LV-2002] malformed record {id}: {details}")]
    RecordDecode { id: i64, details: String },

    #[error("[LV-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[LV-3001] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[LV-3101] fetch engine already running; call stop() or restart() first")]
    AlreadyRunning,

    #[error("[LV-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl LvError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "LV-1001",
            Self::MissingConfig { .. } => "LV-1002",
            Self::ConfigParse { .. } => "LV-1003",
            Self::InvalidFilter { .. } => "LV-1101",
            Self::Sql { .. } => "LV-2001",
            Self::RecordDecode { .. } => "LV-2002",
            Self::Serialization { .. } => "LV-2101",
            Self::Io { .. } => "LV-3001",
            Self::AlreadyRunning => "LV-3101",
            Self::Runtime { .. } => "LV-3900",
        }
    }

    /// Whether a `restart` might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Sql { .. } | Self::Runtime { .. }
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

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for LvError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sql {
            context: "rusqlite",
            details: value.to_string(),
        }
    }
}

impl From<serde_json::Error> for LvError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for LvError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}
