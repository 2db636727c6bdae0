//! Failure artifacts

use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

use crate::config::ScreenshotConfig;
use crate::driver::Driver;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const FAILED_DIR: &str = "failed_tests";

/// Where failure screenshots go and how they are named
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenshotPolicy {
    directory: PathBuf,
    filename_format: String,
}

impl Default for ScreenshotPolicy {
    fn default() -> Self {
        Self::from_config(&ScreenshotConfig::default())
    }
}

impl ScreenshotPolicy {
    pub fn new(directory: impl Into<PathBuf>, filename_format: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            filename_format: filename_format.into(),
        }
    }

    pub fn from_config(config: &ScreenshotConfig) -> Self {
        Self::new(config.directory.clone(), config.filename_format.clone())
    }

    /// Directory failure screenshots are written to
    pub fn failed_dir(&self) -> PathBuf {
        self.directory.join(FAILED_DIR)
    }

    pub fn file_path_at(&self, at: DateTime<Local>) -> PathBuf {
        let timestamp = at.format(TIMESTAMP_FORMAT).to_string();
        let filename = self.filename_format.replace("{timestamp}", &timestamp);
        self.failed_dir().join(filename)
    }

    /// Save a screenshot of the current page. Never fails: errors are logged
    /// and `None` is returned.
    pub async fn capture<D: Driver>(&self, driver: &D) -> Option<PathBuf> {
        let path = self.file_path_at(Local::now());
        let png = match driver.screenshot().await {
            Ok(png) => png,
            Err(err) => {
                error!("Failed to take screenshot: {}", err);
                return None;
            }
        };

        match write_png(&path, &png) {
            Ok(()) => {
                info!("Screenshot saved to {}", path.display());
                Some(path)
            }
            Err(err) => {
                error!("Failed to save screenshot to {}: {}", path.display(), err);
                None
            }
        }
    }
}

fn write_png(path: &Path, png: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, png)
}

/// Run `f` against a driver, capturing a screenshot if it returns an error
pub async fn capture_on_failure<D, T>(
    driver: &D,
    policy: &ScreenshotPolicy,
    f: impl AsyncFnOnce(&D) -> anyhow::Result<T>,
) -> anyhow::Result<T>
where
    D: Driver,
{
    let result = f(driver).await;
    if let Err(err) = &result {
        error!("Flow failed: {:#}", err);
        policy.capture(driver).await;
    }
    result
}

#[cfg(test)]
#[path = "artifacts_test.rs"]
mod artifacts_test;
