//! Dashboard configuration stored in ~/.alris/config.json.
//!
//! Every field has a serde default so a partial (or missing) file still
//! produces a usable config pointing at the local development server.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DashboardError;
use crate::i18n::Locale;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardConfig {
    /// Base URL of the analytics server; resources live under `/api/data/`.
    #[serde(default = "default_primary_base_url")]
    pub primary_base_url: String,
    /// Alternate static base tried once when the primary path fails.
    #[serde(default = "default_fallback_base_url")]
    pub fallback_base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_health_poll_interval_secs")]
    pub health_poll_interval_secs: u64,
    /// Rows shown in the top-anomalies table.
    #[serde(default = "default_top_anomalies")]
    pub top_anomalies: usize,
    #[serde(default)]
    pub default_locale: Locale,
}

fn default_primary_base_url() -> String {
    "http://127.0.0.1:5000".to_string()
}

fn default_fallback_base_url() -> String {
    "http://127.0.0.1:5000/output".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_health_poll_interval_secs() -> u64 {
    30
}

fn default_top_anomalies() -> usize {
    15
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            primary_base_url: default_primary_base_url(),
            fallback_base_url: default_fallback_base_url(),
            api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            health_poll_interval_secs: default_health_poll_interval_secs(),
            top_anomalies: default_top_anomalies(),
            default_locale: Locale::default(),
        }
    }
}

/// Get the state directory (~/.alris)
pub fn state_dir() -> Result<PathBuf, DashboardError> {
    let home = dirs::home_dir()
        .ok_or_else(|| DashboardError::Config("Could not find home directory".to_string()))?;
    Ok(home.join(".alris"))
}

/// Get the canonical config file path (~/.alris/config.json)
pub fn config_path() -> Result<PathBuf, DashboardError> {
    Ok(state_dir()?.join("config.json"))
}

/// Load configuration from ~/.alris/config.json, falling back to defaults
/// when the file does not exist.
pub fn load_config() -> Result<DashboardConfig, DashboardError> {
    load_config_from(&config_path()?)
}

pub fn load_config_from(path: &Path) -> Result<DashboardConfig, DashboardError> {
    if !path.exists() {
        log::info!("No config at {}, using defaults", path.display());
        return Ok(DashboardConfig::default());
    }

    let content = fs::read_to_string(path)
        .map_err(|e| DashboardError::Config(format!("Failed to read config: {}", e)))?;
    let config: DashboardConfig = serde_json::from_str(&content)
        .map_err(|e| DashboardError::Config(format!("Failed to parse config: {}", e)))?;

    if config.top_anomalies == 0 {
        return Err(DashboardError::Config(
            "topAnomalies must be at least 1".to_string(),
        ));
    }
    url::Url::parse(&config.primary_base_url).map_err(|e| {
        DashboardError::Config(format!("Invalid primaryBaseUrl {}: {}", config.primary_base_url, e))
    })?;
    url::Url::parse(&config.fallback_base_url).map_err(|e| {
        DashboardError::Config(format!("Invalid fallbackBaseUrl {}: {}", config.fallback_base_url, e))
    })?;

    Ok(config)
}
