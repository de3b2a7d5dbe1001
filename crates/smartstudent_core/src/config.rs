//! Host configuration file.
//!
//! # Responsibility
//! - Load `AppConfig` from a JSON file, falling back to defaults.
//! - Validate values before they reach logging or reconciliation.
//!
//! # Invariants
//! - A missing file is not an error; unknown keys are.
//! - A loaded config is always valid.

use crate::logging::{default_log_level, normalize_level};
use crate::reconcile::ReconcileOptions;
use crate::settings::Language;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Errors while loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, source } => {
                write!(f, "failed to parse config `{}`: {source}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse { source, .. } => Some(source),
            Self::Invalid(_) => None,
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub log_level: String,
    /// Absolute directory for rolling log files; stderr when unset.
    pub log_dir: Option<PathBuf>,
    /// SQLite store path; in-memory when unset.
    pub db_path: Option<PathBuf>,
    pub dedup_window_ms: i64,
    /// Overrides the stored language when set.
    pub language: Option<Language>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level().to_string(),
            log_dir: None,
            db_path: None,
            dedup_window_ms: ReconcileOptions::default().dedup_window_ms,
            language: None,
        }
    }
}

impl AppConfig {
    /// Loads `path`, or defaults when it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        normalize_level(&self.log_level).map_err(ConfigError::Invalid)?;
        if self.dedup_window_ms < 0 {
            return Err(ConfigError::Invalid(format!(
                "dedup_window_ms must be >= 0, got {}",
                self.dedup_window_ms
            )));
        }
        if let Some(dir) = &self.log_dir {
            if !dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    dir.display()
                )));
            }
        }
        Ok(())
    }

    pub fn reconcile_options(&self) -> ReconcileOptions {
        ReconcileOptions {
            dedup_window_ms: self.dedup_window_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AppConfig, ConfigError};
    use crate::settings::Language;
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let config = AppConfig::load(dir.path().join("absent.json")).expect("defaults");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.reconcile_options().dedup_window_ms, 60_000);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"log_level": "warn", "language": "en"}"#).expect("write config");

        let config = AppConfig::load(&path).expect("load");
        assert_eq!(config.log_level, "warn");
        assert_eq!(config.language, Some(Language::En));
        assert_eq!(config.dedup_window_ms, 60_000);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_rejected() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("config.json");

        fs::write(&path, r#"{"theme": "dark"}"#).expect("write config");
        assert!(matches!(
            AppConfig::load(&path),
            Err(ConfigError::Parse { .. })
        ));

        fs::write(&path, r#"{"dedup_window_ms": -1}"#).expect("write config");
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Invalid(_))));

        fs::write(&path, r#"{"log_level": "loud"}"#).expect("write config");
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Invalid(_))));
    }
}
