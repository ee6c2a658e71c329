use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde_derive::Deserialize;

use crate::error::ConfigError;
use crate::model::SourceId;

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Deserialize, Debug)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl AppConfig {
    pub fn log_level(&self) -> tracing::Level {
        tracing::Level::from_str(self.log_level.as_str()).unwrap_or(tracing::Level::INFO)
    }
}

pub(crate) fn load_app_config() -> Result<AppConfig, ConfigError> {
    envy::from_env::<AppConfig>().map_err(ConfigError::env_parse)
}

fn default_retry_attempts() -> u32 {
    3
}

fn default_retry_delay_sec() -> u64 {
    5
}

#[derive(Deserialize, Debug)]
pub struct CollectorConfig {
    // attempts per session or chunk before the source gives up
    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,
    #[serde(default = "default_retry_delay_sec")]
    pub retry_delay_sec: u64,
}

impl CollectorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_sec)
    }
}

pub fn load_collector_config() -> Result<CollectorConfig, ConfigError> {
    envy::prefixed("COLLECTOR_")
        .from_env::<CollectorConfig>()
        .map_err(ConfigError::env_parse)
}

/// `[general]` table of the configuration file.
#[derive(Deserialize, Debug, Default)]
pub struct General {
    pub database: Option<PathBuf>,
}

/// Parsed configuration file: `[general]` plus one table per source.
#[derive(Deserialize, Debug, Default)]
pub struct Settings {
    #[serde(default)]
    pub general: General,

    /// Everything else in the file, keyed by source name
    #[serde(flatten)]
    pub sources: BTreeMap<String, SourceConfig>,
}

impl Settings {
    /// The configuration table for `source`, accepting any of its aliases.
    ///
    /// Two tables naming the same source (`[gshp]` and `[heat-pump]`) are
    /// rejected instead of one silently winning.
    pub fn source(&self, source: SourceId) -> Result<&SourceConfig, ConfigError> {
        let matches: Vec<(&String, &SourceConfig)> = self
            .sources
            .iter()
            .filter(|(name, _)| SourceId::from_str(name).ok() == Some(source))
            .collect();

        match matches.as_slice() {
            [] => Err(ConfigError::MissingSource(source.to_string())),
            [(_, config)] => Ok(*config),
            _ => {
                let names: Vec<&str> = matches.iter().map(|(name, _)| name.as_str()).collect();
                Err(ConfigError::invalid(
                    source.as_str(),
                    format!("configured more than once as [{}]", names.join("], [")),
                ))
            }
        }
    }
}

pub fn load_settings(path: &Path) -> Result<Settings, ConfigError> {
    let display = path.display().to_string();
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::file(&display, e))?;
    toml::from_str(&contents).map_err(|e| ConfigError::file(&display, e))
}

/// Opaque per-source field mapping.
///
/// Adapters check their required fields with [`SourceConfig::require`] before
/// reading any of them, so a misconfigured source fails before any request is
/// sent.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(transparent)]
pub struct SourceConfig(BTreeMap<String, toml::Value>);

impl SourceConfig {
    #[cfg(test)]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert for tests.
    #[cfg(test)]
    pub fn with(mut self, field: &str, value: impl Into<toml::Value>) -> Self {
        self.0.insert(field.to_string(), value.into());
        self
    }

    pub fn contains(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// Fails with the first missing field, in the order given.
    pub fn require(&self, source: SourceId, fields: &[&str]) -> Result<(), ConfigError> {
        match fields.iter().find(|field| !self.contains(field)) {
            Some(field) => Err(ConfigError::missing_field(source.as_str(), *field)),
            None => Ok(()),
        }
    }

    /// A scalar field as a string; integers are accepted (site ids).
    pub fn string(&self, source: SourceId, field: &str) -> Result<String, ConfigError> {
        match self.0.get(field) {
            Some(toml::Value::String(s)) => Ok(s.clone()),
            Some(toml::Value::Integer(i)) => Ok(i.to_string()),
            Some(_) => Err(ConfigError::invalid(field, "expected a string")),
            None => Err(ConfigError::missing_field(source.as_str(), field)),
        }
    }

    pub fn optional_string(&self, field: &str) -> Option<String> {
        match self.0.get(field) {
            Some(toml::Value::String(s)) => Some(s.clone()),
            _ => None,
        }
    }

    /// A list field. A single string is treated as a one-element list.
    pub fn string_list(&self, source: SourceId, field: &str) -> Result<Vec<String>, ConfigError> {
        match self.0.get(field) {
            Some(toml::Value::Array(items)) => items
                .iter()
                .map(|item| match item {
                    toml::Value::String(s) => Ok(s.clone()),
                    _ => Err(ConfigError::invalid(field, "expected a list of strings")),
                })
                .collect(),
            Some(toml::Value::String(s)) => Ok(vec![s.clone()]),
            Some(_) => Err(ConfigError::invalid(field, "expected a list of strings")),
            None => Err(ConfigError::missing_field(source.as_str(), field)),
        }
    }
}
