//! Cache configuration.
//!
//! Loaded from YAML, then overridden from the environment:
//!
//! ```yaml
//! cache:
//!   materialize_placeholders: true
//!   max_messages: 1000
//! ```
//!
//! | Variable            | Field                      |
//! |---------------------|----------------------------|
//! | `CORD_PLACEHOLDERS` | `materialize_placeholders` |
//! | `CORD_MAX_MESSAGES` | `max_messages`             |

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

fn default_placeholders() -> bool {
    true
}

fn default_max_messages() -> usize {
    1000
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("config missing '{0}' section")]
    MissingSection(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    /// Unknown referenced ids become id-only placeholder entities instead of
    /// failing with a reference error.
    #[serde(default = "default_placeholders")]
    pub materialize_placeholders: bool,

    /// Messages kept in the cache; the oldest is evicted first.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            materialize_placeholders: default_placeholders(),
            max_messages: default_max_messages(),
        }
    }
}

impl CacheConfig {
    /// Load the `cache` section of a YAML file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_yaml(&contents)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, ConfigError> {
        let yaml: serde_yaml::Value = serde_yaml::from_str(contents)?;

        let section = yaml
            .get("cache")
            .ok_or(ConfigError::MissingSection("cache"))?;

        Ok(serde_yaml::from_value(section.clone())?)
    }

    /// Apply `CORD_*` environment overrides. Unparseable values are ignored.
    pub fn with_env(self) -> Self {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(raw) = lookup("CORD_PLACEHOLDERS") {
            match raw.parse() {
                Ok(value) => self.materialize_placeholders = value,
                Err(_) => warn!(value = %raw, "Ignoring invalid CORD_PLACEHOLDERS"),
            }
        }

        if let Some(raw) = lookup("CORD_MAX_MESSAGES") {
            match raw.parse() {
                Ok(value) => self.max_messages = value,
                Err(_) => warn!(value = %raw, "Ignoring invalid CORD_MAX_MESSAGES"),
            }
        }

        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = CacheConfig::default();
        assert!(config.materialize_placeholders);
        assert_eq!(config.max_messages, 1000);
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("cord.yaml");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"cache:\n  max_messages: 25\n").unwrap();

        let config = CacheConfig::load_from_file(&path).unwrap();

        assert_eq!(config.max_messages, 25);
        assert!(config.materialize_placeholders);
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let result = CacheConfig::load_from_file(temp_dir.path().join("absent.yaml"));

        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_missing_section() {
        let result = CacheConfig::from_yaml("other:\n  key: 1\n");
        assert!(matches!(result, Err(ConfigError::MissingSection("cache"))));
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        let result = CacheConfig::from_yaml("cache:\n  max_mesages: 5\n");
        assert!(matches!(result, Err(ConfigError::Yaml(_))));
    }

    #[test]
    fn test_overrides() {
        let config = CacheConfig::default().with_overrides(|key| match key {
            "CORD_PLACEHOLDERS" => Some("false".to_string()),
            "CORD_MAX_MESSAGES" => Some("lots".to_string()),
            _ => None,
        });

        assert!(!config.materialize_placeholders);
        assert_eq!(config.max_messages, 1000);
    }
}
