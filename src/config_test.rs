// Unit tests for configuration loading

use super::*;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const SAMPLE: &str = r#"
appium:
  server_url: http://10.0.0.5:4723
  default_capabilities_file: pixel_chrome.yaml
url:
  base_url: https://www.makemytrip.com/hotels/
timeouts:
  resolve_secs: 12
  poll_interval_ms: 250
  tap_retries: 4
screenshot:
  directory: artifacts
"#;

#[test]
fn test_defaults_without_file() {
    let config = Config::default();
    assert_eq!(config.webdriver().server_url, "http://127.0.0.1:4723");
    assert_eq!(config.screenshot().filename_format, "screenshot_{timestamp}.png");
    assert_eq!(config.logging().file_path(), PathBuf::from("logs/app_logs/test_run.log"));
    assert_eq!(config.wait_settings(), WaitSettings::default());
    assert!(config.source().is_none());
}

#[test]
fn test_partial_sections_keep_defaults() {
    let config = Config::from_yaml(SAMPLE).unwrap();

    // `appium` is accepted as the section name for the remote end
    assert_eq!(config.webdriver().server_url, "http://10.0.0.5:4723");
    assert_eq!(config.webdriver().default_capabilities_file, "pixel_chrome.yaml");
    assert_eq!(config.webdriver().capabilities_dir, PathBuf::from("configs/capabilities"));
    assert_eq!(config.screenshot().directory, PathBuf::from("artifacts"));
    assert_eq!(config.screenshot().filename_format, "screenshot_{timestamp}.png");

    let settings = config.wait_settings();
    assert_eq!(settings.resolve_budget, Duration::from_secs(12));
    assert_eq!(settings.poll_interval, Duration::from_millis(250));
    assert_eq!(settings.tap_retries, 4);
    assert_eq!(settings.presence_probe, Duration::from_secs(5));
}

#[test]
fn test_nested_lookup() {
    let config = Config::from_yaml(SAMPLE).unwrap();

    assert_eq!(config.get_str(&["screenshot", "directory"]), Some("artifacts"));
    assert_eq!(config.get_str(&["url", "base_url"]), Some("https://www.makemytrip.com/hotels/"));
    assert!(config.get(&["screenshot", "missing"]).is_none());
    // Walking through a scalar stops the lookup
    assert!(config.get(&["screenshot", "directory", "deeper"]).is_none());
    assert!(config.get(&["timeouts"]).is_some());
}

#[test]
fn test_empty_document_uses_defaults() {
    let config = Config::from_yaml("").unwrap();
    assert_eq!(config.base_url(), "https://www.makemytrip.com/");
    assert!(config.get(&["url"]).is_none());
}

#[test]
fn test_invalid_base_url_rejected() {
    let err = Config::from_yaml("url:\n  base_url: not a url\n").unwrap_err();
    assert!(matches!(err, ConfigError::InvalidUrl(..)));

    let flow: FlowError = err.into();
    assert_eq!(flow.exit_code(), 5);
}

#[test]
fn test_malformed_yaml_rejected() {
    let err = Config::from_yaml("timeouts: [unclosed").unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn test_zero_retries_clamped() {
    let config = Config::from_yaml("timeouts:\n  tap_retries: 0\n  poll_interval_ms: 0\n").unwrap();
    let settings = config.wait_settings();
    assert_eq!(settings.tap_retries, 1);
    assert_eq!(settings.poll_interval, Duration::from_millis(1));
}

#[test]
fn test_page_load_and_refresh_timeouts_carried_into_settings() {
    let config =
        Config::from_yaml("timeouts:\n  page_load_secs: 45\n  refresh_fallback_secs: 10\n").unwrap();
    let settings = config.wait_settings();
    assert_eq!(settings.page_load, Duration::from_secs(45));
    assert_eq!(settings.refresh_fallback, Some(Duration::from_secs(10)));
    // Other budgets keep their defaults
    assert_eq!(settings.resolve_budget, Duration::from_secs(20));
}

#[test]
fn test_refresh_fallback_off_by_default() {
    let settings = Config::from_yaml("timeouts:\n  resolve_secs: 8\n").unwrap().wait_settings();
    assert_eq!(settings.page_load, Duration::from_secs(30));
    assert_eq!(settings.refresh_fallback, None);
}

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.yaml");
    fs::write(&path, SAMPLE).unwrap();

    let config = Config::load_from(&path).unwrap();
    assert_eq!(config.source(), Some(path.as_path()));
    assert_eq!(config.timeouts().resolve_secs, 12);
}

#[test]
fn test_load_missing_file() {
    let dir = TempDir::new().unwrap();
    let err = Config::load_from(&dir.path().join("absent.yaml")).unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("absent.yaml"));
}
