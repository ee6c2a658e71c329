//! Configuration builders for tests.

use crate::config::{Settings, SourceConfig};

/// Settings holding the given source tables.
pub fn test_settings(sources: Vec<(&str, SourceConfig)>) -> Settings {
    Settings {
        general: Default::default(),
        sources: sources
            .into_iter()
            .map(|(name, config)| (name.to_string(), config))
            .collect(),
    }
}

pub fn test_pepco_config<S: Into<String>>(files: Vec<S>) -> SourceConfig {
    let files: Vec<String> = files.into_iter().map(Into::into).collect();
    SourceConfig::new().with("files", files)
}

pub fn test_solar_config(url: &str) -> SourceConfig {
    SourceConfig::new()
        .with("api_key", "fake-key")
        .with("site_id", "12345")
        .with("url", url)
}

pub fn test_weather_config(url: &str) -> SourceConfig {
    SourceConfig::new()
        .with("api_key", "fake-token")
        .with("stations", vec!["GHCND:fake1"])
        .with("url", url)
}

pub fn test_heat_pump_config(url: &str) -> SourceConfig {
    SourceConfig::new()
        .with("username", "test_user")
        .with("password", "test_password")
        .with("url", url)
}
