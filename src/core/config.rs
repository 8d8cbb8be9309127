//! Configuration system: TOML file + env var overrides + defaults.

#![allow(missing_docs)]

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::buffer::screen_buffer::BufferConfig;
use crate::core::errors::{LvError, Result};
use crate::filter::{DEFAULT_TABLE, is_plain_identifier};

/// Backends compiled into this build.
pub const KNOWN_BACKENDS: &[&str] = &[
    #[cfg(feature = "sqlite")]
    "sqlite",
];

/// Upper bound for `buffer.low_buffer_threshold`.
pub const MAX_LOW_BUFFER_THRESHOLD: usize = 1 << 20;

/// Full viewer configuration model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    pub main: MainConfig,
    pub buffer: BufferSection,
    pub sqlite: SqliteConfig,
    /// File the configuration was read from, if any.
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// `[main]`: polling and backend selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct MainConfig {
    /// Tail re-poll interval in seconds; unset disables polling.
    pub timeout_secs: Option<f64>,
    /// Name of the backend section to use.
    pub backend: Option<String>,
}

/// `[buffer]`: cache sizing overrides (defaults derive from the page size).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct BufferSection {
    pub buffer_size: Option<usize>,
    pub low_buffer_threshold: Option<usize>,
}

/// `[sqlite]`: database location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SqliteConfig {
    pub path: Option<PathBuf>,
    pub table: String,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: None,
            table: DEFAULT_TABLE.to_string(),
        }
    }
}

impl Config {
    /// `$XDG_CONFIG_HOME/logview/config.toml`, falling back to `~/.config`.
    #[must_use]
    pub fn default_path() -> PathBuf {
        let base = env_var("XDG_CONFIG_HOME").map_or_else(
            || {
                let home = env_var("HOME").unwrap_or_else(|| "/tmp".to_string());
                PathBuf::from(home).join(".config")
            },
            PathBuf::from,
        );
        base.join("logview").join("config.toml")
    }

    /// Load from `path` (or the default location), apply env overrides, validate.
    ///
    /// An explicit path that does not exist is an error; a missing default
    /// file yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path_buf = path.map_or_else(Self::default_path, Path::to_path_buf);
        let is_explicit_path = path.is_some();

        let mut cfg = if path_buf.exists() {
            let mut parsed = Self::parse(&fs::read_to_string(&path_buf).map_err(|source| {
                LvError::Io {
                    path: path_buf.clone(),
                    source,
                }
            })?)?;
            parsed.source = Some(path_buf);
            parsed
        } else if is_explicit_path {
            return Err(LvError::MissingConfig { path: path_buf });
        } else {
            Self::default()
        };

        cfg.apply_env_overrides_from(env_var)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse TOML text without env overrides or validation.
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Tail re-poll interval.
    pub fn timeout(&self) -> Option<Duration> {
        self.main.timeout_secs.map(Duration::from_secs_f64)
    }

    /// Cache sizing for a window of `page_size` lines.
    pub fn buffer_config(&self, page_size: usize) -> BufferConfig {
        BufferConfig {
            page_size,
            buffer_size: self.buffer.buffer_size,
            low_buffer_threshold: self.buffer.low_buffer_threshold,
            timeout: self.timeout(),
        }
    }

    /// Driver factory for the configured backend.
    #[cfg(feature = "sqlite")]
    pub fn driver_factory(&self) -> Result<crate::backend::sqlite::SqliteDriverFactory> {
        match self.main.backend.as_deref() {
            None => Err(LvError::InvalidConfig {
                details: "no backend configured; set main.backend".to_string(),
            }),
            Some("sqlite") => {
                let path = self.sqlite.path.clone().ok_or_else(|| LvError::InvalidConfig {
                    details: "sqlite.path is required for the sqlite backend".to_string(),
                })?;
                Ok(crate::backend::sqlite::SqliteDriverFactory::new(
                    path,
                    self.sqlite.table.clone(),
                ))
            }
            Some(other) => Err(unknown_backend(other)),
        }
    }

    fn apply_env_overrides_from<F>(&mut self, mut lookup: F) -> Result<()>
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("LOGVIEW_TIMEOUT_SECS") {
            let value = raw.trim().parse::<f64>().map_err(|e| LvError::InvalidConfig {
                details: format!("LOGVIEW_TIMEOUT_SECS={raw:?} is not a number: {e}"),
            })?;
            self.main.timeout_secs = Some(value);
        }
        if let Some(raw) = lookup("LOGVIEW_BACKEND") {
            self.main.backend = Some(raw.trim().to_string());
        }
        if let Some(raw) = lookup("LOGVIEW_SQLITE_PATH") {
            self.sqlite.path = Some(PathBuf::from(raw));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if let Some(timeout) = self.main.timeout_secs {
            if !timeout.is_finite() || timeout <= 0.0 {
                return Err(LvError::InvalidConfig {
                    details: format!("main.timeout_secs must be positive, got {timeout}"),
                });
            }
            if Duration::try_from_secs_f64(timeout).is_err() {
                return Err(LvError::InvalidConfig {
                    details: format!("main.timeout_secs {timeout} is out of range"),
                });
            }
        }
        if let Some(backend) = self.main.backend.as_deref() {
            if !KNOWN_BACKENDS.contains(&backend) {
                return Err(unknown_backend(backend));
            }
        }
        if self.buffer.buffer_size == Some(0) {
            return Err(LvError::InvalidConfig {
                details: "buffer.buffer_size must be > 0".to_string(),
            });
        }
        if let Some(threshold) = self.buffer.low_buffer_threshold {
            if threshold > MAX_LOW_BUFFER_THRESHOLD {
                return Err(LvError::InvalidConfig {
                    details: format!(
                        "buffer.low_buffer_threshold must be <= {MAX_LOW_BUFFER_THRESHOLD}, got {threshold}"
                    ),
                });
            }
        }
        let table = &self.sqlite.table;
        if !is_plain_identifier(table) {
            return Err(LvError::InvalidConfig {
                details: format!("sqlite.table `{table}` is not a plain identifier"),
            });
        }
        Ok(())
    }
}

fn unknown_backend(name: &str) -> LvError {
    LvError::InvalidConfig {
        details: format!("invalid backend `{name}`; maybe a feature is missing?"),
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|value| !value.is_empty())
}
