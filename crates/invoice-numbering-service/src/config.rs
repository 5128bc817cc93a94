//! Service configuration.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::retry::RetryPolicy;

/// Service configuration loaded from environment variables and an optional
/// JSON file.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path to `RocksDB` data directory (default: "/data/invoice-numbering").
    pub data_dir: String,

    /// Template used when an organization has none configured.
    ///
    /// `None` makes issuing for an organization without a format fail with
    /// `NotFound`.
    pub default_format: Option<String>,

    /// Attempts per operation before a conflict is reported (default: 32).
    pub max_issue_attempts: u32,

    /// First backoff between attempts, in milliseconds (default: 2).
    pub retry_initial_backoff_ms: u64,

    /// Backoff ceiling, in milliseconds (default: 100).
    pub retry_max_backoff_ms: u64,

    /// Largest page a history query may ask for (default: 500).
    pub history_max_limit: usize,
}

/// Optional overrides read from a JSON config file.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    #[serde(default)]
    data_dir: Option<String>,
    #[serde(default)]
    default_format: Option<String>,
    #[serde(default)]
    max_issue_attempts: Option<u32>,
    #[serde(default)]
    retry_initial_backoff_ms: Option<u64>,
    #[serde(default)]
    retry_max_backoff_ms: Option<u64>,
    #[serde(default)]
    history_max_limit: Option<usize>,
}

/// Error loading a config file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file couldn't be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The file isn't valid config JSON.
    #[error("invalid config file {path}: {source}")]
    Parse {
        /// File path.
        path: String,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            default_format: match std::env::var("DEFAULT_NUMBER_FORMAT") {
                Ok(s) if s.trim().is_empty() => None,
                Ok(s) => Some(s),
                Err(_) => defaults.default_format,
            },
            max_issue_attempts: env_parse("MAX_ISSUE_ATTEMPTS")
                .unwrap_or(defaults.max_issue_attempts),
            retry_initial_backoff_ms: env_parse("RETRY_INITIAL_BACKOFF_MS")
                .unwrap_or(defaults.retry_initial_backoff_ms),
            retry_max_backoff_ms: env_parse("RETRY_MAX_BACKOFF_MS")
                .unwrap_or(defaults.retry_max_backoff_ms),
            history_max_limit: env_parse("HISTORY_MAX_LIMIT")
                .unwrap_or(defaults.history_max_limit),
        }
    }

    /// Load configuration from the environment, then apply a JSON file on top.
    ///
    /// # Errors
    ///
    /// Returns an error if the file can't be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = Self::from_env();
        if let Some(path) = path {
            let overrides = load_config_file(path)?;
            tracing::info!(path = %path.display(), "Loaded config file");
            config.apply(overrides);
        }
        Ok(config)
    }

    /// Retry policy built from the attempt and backoff settings.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_issue_attempts.max(1),
            initial_backoff: Duration::from_millis(self.retry_initial_backoff_ms),
            max_backoff: Duration::from_millis(
                self.retry_max_backoff_ms.max(self.retry_initial_backoff_ms),
            ),
        }
    }

    fn apply(&mut self, file: FileConfig) {
        if let Some(v) = file.data_dir {
            self.data_dir = v;
        }
        if let Some(v) = file.default_format {
            self.default_format = (!v.trim().is_empty()).then_some(v);
        }
        if let Some(v) = file.max_issue_attempts {
            self.max_issue_attempts = v;
        }
        if let Some(v) = file.retry_initial_backoff_ms {
            self.retry_initial_backoff_ms = v;
        }
        if let Some(v) = file.retry_max_backoff_ms {
            self.retry_max_backoff_ms = v;
        }
        if let Some(v) = file.history_max_limit {
            self.history_max_limit = v;
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
}

fn load_config_file(path: &Path) -> Result<FileConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.display().to_string(),
        source,
    })
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            data_dir: "/data/invoice-numbering".into(),
            default_format: Some(invoice_numbering_core::DEFAULT_TEMPLATE.into()),
            max_issue_attempts: 32,
            retry_initial_backoff_ms: 2,
            retry_max_backoff_ms: 100,
            history_max_limit: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_overrides_only_what_it_names() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"default_format": "F-{{YYYY}}{{MM}}-{{SEQ:5}}", "max_issue_attempts": 4}}"#
        )
        .unwrap();

        let mut config = ServiceConfig::default();
        config.apply(load_config_file(file.path()).unwrap());

        assert_eq!(config.default_format.as_deref(), Some("F-{YYYY}{MM}-{SEQ:5}"));
        assert_eq!(config.max_issue_attempts, 4);
        assert_eq!(config.history_max_limit, 500);
    }

    #[test]
    fn empty_default_format_disables_fallback() {
        let mut config = ServiceConfig::default();
        config.apply(FileConfig {
            default_format: Some("  ".into()),
            ..FileConfig::default()
        });
        assert!(config.default_format.is_none());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"listen_addr": "0.0.0.0:1"}}"#).unwrap();
        assert!(matches!(
            load_config_file(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn retry_policy_is_never_empty() {
        let config = ServiceConfig {
            max_issue_attempts: 0,
            retry_initial_backoff_ms: 50,
            retry_max_backoff_ms: 10,
            ..ServiceConfig::default()
        };
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.max_backoff >= policy.initial_backoff);
    }
}
