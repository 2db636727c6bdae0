//! Run configuration loaded from YAML

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::errors::FlowError;
use crate::wait::WaitSettings;

const LOCAL_CONFIG: &str = "configs/config.yaml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("Invalid base URL '{0}': {1}")]
    InvalidUrl(String, url::ParseError),
    #[error("Invalid capabilities file {}: {reason}", .path.display())]
    Capabilities { path: PathBuf, reason: String },
}

impl From<ConfigError> for FlowError {
    fn from(err: ConfigError) -> Self {
        FlowError::Config(err.to_string())
    }
}

/// Remote end and capability files
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub server_url: String,
    pub default_capabilities_file: String,
    pub capabilities_dir: PathBuf,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:4723".to_string(),
            default_capabilities_file: "android_chrome.yaml".to_string(),
            capabilities_dir: PathBuf::from("configs/capabilities"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlConfig {
    pub base_url: String,
}

impl Default for UrlConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.makemytrip.com/".to_string(),
        }
    }
}

/// Wait timings. Seconds for budgets, milliseconds for pauses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeoutConfig {
    pub resolve_secs: u64,
    pub presence_secs: u64,
    pub presence_fallback_secs: u64,
    pub polling_cap_secs: u64,
    pub poll_interval_ms: u64,
    pub recovery_every: u32,
    pub recovery_pause_ms: u64,
    pub scroll_probe_secs: u64,
    pub settle_pause_ms: u64,
    pub tap_retries: u32,
    pub retry_pause_ms: u64,
    pub page_load_secs: u64,
    /// Reload the page and wait this long as a last resort; unset disables it
    pub refresh_fallback_secs: Option<u64>,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            resolve_secs: 20,
            presence_secs: 5,
            presence_fallback_secs: 10,
            polling_cap_secs: 15,
            poll_interval_ms: 500,
            recovery_every: 3,
            recovery_pause_ms: 1000,
            scroll_probe_secs: 2,
            settle_pause_ms: 500,
            tap_retries: 3,
            retry_pause_ms: 1000,
            page_load_secs: 30,
            refresh_fallback_secs: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub directory: PathBuf,
    /// `{timestamp}` is replaced with the capture time
    pub filename_format: String,
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("screenshots"),
            filename_format: "screenshot_{timestamp}.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_name: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("logs/app_logs"),
            file_name: "test_run.log".to_string(),
        }
    }
}

impl LoggingConfig {
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
struct Sections {
    #[serde(alias = "appium")]
    webdriver: WebDriverConfig,
    url: UrlConfig,
    timeouts: TimeoutConfig,
    screenshot: ScreenshotConfig,
    logging: LoggingConfig,
}

/// Loaded configuration: typed sections plus the raw document for lookups
#[derive(Debug, Clone)]
pub struct Config {
    sections: Sections,
    raw: Value,
    source: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sections: Sections::default(),
            raw: Value::Null,
            source: None,
        }
    }
}

impl Config {
    /// Load from default locations:
    /// 1. ./configs/config.yaml
    /// 2. ~/.hotelprobe/config.yaml
    /// 3. Built-in defaults
    pub fn load_default() -> Result<Self, ConfigError> {
        let local = PathBuf::from(LOCAL_CONFIG);
        if local.exists() {
            return Self::load_from(&local);
        }

        if let Some(home) = dirs::home_dir() {
            let home_config = home.join(".hotelprobe").join("config.yaml");
            if home_config.exists() {
                return Self::load_from(&home_config);
            }
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::from_yaml(&content)?;
        config.source = Some(path.to_path_buf());
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Parse a YAML document; missing sections and keys take defaults
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let raw: Value = serde_yaml::from_str(content)?;
        let sections: Sections = if raw.is_null() {
            Sections::default()
        } else {
            serde_yaml::from_value(raw.clone())?
        };
        Url::parse(&sections.url.base_url)
            .map_err(|e| ConfigError::InvalidUrl(sections.url.base_url.clone(), e))?;

        Ok(Self {
            sections,
            raw,
            source: None,
        })
    }

    /// File the configuration came from, if any
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Walk nested mappings by key; `None` when any step is missing
    pub fn get(&self, keys: &[&str]) -> Option<&Value> {
        keys.iter().try_fold(&self.raw, |value, key| match value {
            Value::Mapping(map) => map.get(*key),
            _ => None,
        })
    }

    /// String value at a key path
    pub fn get_str(&self, keys: &[&str]) -> Option<&str> {
        self.get(keys).and_then(Value::as_str)
    }

    pub fn webdriver(&self) -> &WebDriverConfig {
        &self.sections.webdriver
    }

    pub fn base_url(&self) -> &str {
        &self.sections.url.base_url
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.sections.timeouts
    }

    pub fn screenshot(&self) -> &ScreenshotConfig {
        &self.sections.screenshot
    }

    pub fn logging(&self) -> &LoggingConfig {
        &self.sections.logging
    }

    pub fn wait_settings(&self) -> WaitSettings {
        let t = &self.sections.timeouts;
        WaitSettings {
            resolve_budget: Duration::from_secs(t.resolve_secs),
            presence_probe: Duration::from_secs(t.presence_secs),
            presence_fallback: Duration::from_secs(t.presence_fallback_secs),
            polling_cap: Duration::from_secs(t.polling_cap_secs),
            poll_interval: Duration::from_millis(t.poll_interval_ms.max(1)),
            recovery_every: t.recovery_every,
            recovery_pause: Duration::from_millis(t.recovery_pause_ms),
            scroll_probe: Duration::from_secs(t.scroll_probe_secs),
            settle_pause: Duration::from_millis(t.settle_pause_ms),
            tap_retries: t.tap_retries.max(1),
            retry_pause: Duration::from_millis(t.retry_pause_ms),
            page_load: Duration::from_secs(t.page_load_secs),
            refresh_fallback: t.refresh_fallback_secs.map(Duration::from_secs),
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;
