//! WebDriver/Appium sessions over fantoccini

use anyhow::{Context, Result};
use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::error::CmdError;
use fantoccini::{Client, ClientBuilder, Locator};
use serde_json::{Map, Value, json};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::artifacts::{ScreenshotPolicy, capture_on_failure};
use crate::config::{Config, ConfigError};
use crate::driver::{Driver, DriverError, DriverResult};
use crate::errors::FlowError;
use crate::locator::{StrategyToken, xpath_literal};

/// True when something covers the centre point of `arguments[0]`
const OBSCURED_SCRIPT: &str = r#"
    const el = arguments[0];
    const rect = el.getBoundingClientRect();
    const x = rect.left + rect.width / 2;
    const y = rect.top + rect.height / 2;
    const hit = document.elementFromPoint(x, y);
    return hit !== null && hit !== el && !el.contains(hit);
"#;

/// Capabilities sent when a session is created
#[derive(Debug, Clone, PartialEq)]
pub struct Capabilities(Map<String, Value>);

impl Capabilities {
    /// Read a YAML capabilities file from `dir`
    pub fn load(dir: &Path, file: &str) -> Result<Self, ConfigError> {
        let path = dir.join(file);
        let content = fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.clone(),
            source,
        })?;
        let value: Value = serde_yaml::from_str(&content)?;
        match value {
            Value::Object(map) => {
                debug!("Loaded {} capabilities from {}", map.len(), path.display());
                Ok(Self(map))
            }
            _ => Err(ConfigError::Capabilities {
                path,
                reason: "expected a mapping of capability names to values".to_string(),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Maps a fantoccini command failure onto the driver error taxonomy
fn classify(err: CmdError) -> DriverError {
    let message = err.to_string();
    match &err {
        CmdError::Lost(_) | CmdError::Failed(_) | CmdError::NoSuchWindow(_) => {
            DriverError::Transport(message)
        }
        CmdError::Standard(wd) | CmdError::NoSuchElement(wd) => classify_code(wd.error(), message),
        _ => DriverError::Other(message),
    }
}

/// Maps a W3C error code onto the driver error taxonomy
fn classify_code(code: &str, message: String) -> DriverError {
    match code {
        "invalid session id" => DriverError::Transport(message),
        "stale element reference" => DriverError::StaleElement(message),
        "element click intercepted" => DriverError::ClickIntercepted(message),
        "element not interactable" => DriverError::NotInteractable(message),
        "javascript error" => DriverError::Script(message),
        "unknown command" | "unknown method" | "unsupported operation" => {
            DriverError::Unsupported(message)
        }
        _ => DriverError::Other(message),
    }
}

fn reqwest_error(err: reqwest::Error) -> DriverError {
    if err.is_connect() || err.is_timeout() {
        DriverError::Transport(err.to_string())
    } else {
        DriverError::Other(err.to_string())
    }
}

fn quote_css(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// The tokens W3C remote ends accept natively are css, xpath and the two
/// link-text forms; the rest are rewritten.
enum NativeQuery {
    Css(String),
    XPath(String),
    LinkText(String),
}

impl NativeQuery {
    fn from_token(token: StrategyToken, value: &str) -> Self {
        match token {
            StrategyToken::XPath => NativeQuery::XPath(value.to_string()),
            StrategyToken::CssSelector => NativeQuery::Css(value.to_string()),
            StrategyToken::LinkText => NativeQuery::LinkText(value.to_string()),
            StrategyToken::Id => NativeQuery::Css(format!("[id=\"{}\"]", quote_css(value))),
            StrategyToken::Name => NativeQuery::Css(format!("[name=\"{}\"]", quote_css(value))),
            StrategyToken::ClassName => NativeQuery::Css(
                value
                    .split_whitespace()
                    .map(|class| format!("[class~=\"{}\"]", quote_css(class)))
                    .collect(),
            ),
            StrategyToken::TagName => NativeQuery::Css(value.to_string()),
            StrategyToken::AccessibilityId => {
                NativeQuery::Css(format!("[aria-label=\"{}\"]", quote_css(value)))
            }
            StrategyToken::PartialLinkText => {
                NativeQuery::XPath(format!("//a[contains(., {})]", xpath_literal(value)))
            }
        }
    }

    fn locator(&self) -> Locator<'_> {
        match self {
            NativeQuery::Css(css) => Locator::Css(css),
            NativeQuery::XPath(xpath) => Locator::XPath(xpath),
            NativeQuery::LinkText(text) => Locator::LinkText(text),
        }
    }
}

/// A live remote session
pub struct WebDriverSession {
    client: Client,
    server_url: String,
    session_id: Option<String>,
    http: reqwest::Client,
}

impl WebDriverSession {
    /// Create a session on the remote end
    pub async fn connect(server_url: &str, capabilities: Capabilities) -> Result<Self> {
        info!("Connecting to WebDriver at {}", server_url);
        let client = ClientBuilder::rustls()
            .capabilities(capabilities.into_map())
            .connect(server_url)
            .await
            .with_context(|| format!("Failed to connect to WebDriver at {}", server_url))?;

        let session_id = client.session_id().await.ok().flatten();
        debug!("Session created: {:?}", session_id);

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
            session_id,
            http: reqwest::Client::new(),
        })
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub async fn close(self) -> Result<()> {
        self.client.close().await?;
        info!("Session closed");
        Ok(())
    }

    fn session_endpoint(&self, path: &str) -> DriverResult<String> {
        let id = self
            .session_id
            .as_deref()
            .ok_or_else(|| DriverError::Unsupported("session id not available".to_string()))?;
        Ok(format!("{}/session/{}/{}", self.server_url, id, path))
    }

    /// GET a session endpoint and unwrap its `value`
    async fn session_get(&self, path: &str) -> DriverResult<Value> {
        let url = self.session_endpoint(path)?;
        let response = self.http.get(&url).send().await.map_err(reqwest_error)?;
        if !response.status().is_success() {
            return Err(DriverError::Unsupported(format!(
                "GET {} returned {}",
                path,
                response.status()
            )));
        }
        let body: Value = response.json().await.map_err(reqwest_error)?;
        Ok(body.get("value").cloned().unwrap_or(Value::Null))
    }

    fn element_args(args: &[&Element]) -> DriverResult<Vec<Value>> {
        args.iter()
            .map(|element| {
                serde_json::to_value(element).map_err(|e| DriverError::Script(e.to_string()))
            })
            .collect()
    }
}

#[async_trait]
impl Driver for WebDriverSession {
    type Element = Element;

    async fn find_element(&self, token: StrategyToken, value: &str) -> DriverResult<Option<Element>> {
        let query = NativeQuery::from_token(token, value);
        match self.client.find(query.locator()).await {
            Ok(element) => Ok(Some(element)),
            Err(err) if err.is_miss() => Ok(None),
            Err(err) => Err(classify(err)),
        }
    }

    async fn find_elements(&self, token: StrategyToken, value: &str) -> DriverResult<Vec<Element>> {
        let query = NativeQuery::from_token(token, value);
        match self.client.find_all(query.locator()).await {
            Ok(elements) => Ok(elements),
            Err(err) if err.is_miss() => Ok(Vec::new()),
            Err(err) => Err(classify(err)),
        }
    }

    async fn is_displayed(&self, element: &Element) -> DriverResult<bool> {
        element.is_displayed().await.map_err(classify)
    }

    async fn is_enabled(&self, element: &Element) -> DriverResult<bool> {
        element.is_enabled().await.map_err(classify)
    }

    async fn is_obscured(&self, element: &Element) -> DriverResult<bool> {
        let value = self.execute_script(OBSCURED_SCRIPT, &[element]).await?;
        Ok(value.as_bool().unwrap_or(false))
    }

    async fn text(&self, element: &Element) -> DriverResult<String> {
        element.text().await.map_err(classify)
    }

    async fn attribute(&self, element: &Element, name: &str) -> DriverResult<Option<String>> {
        element.attr(name).await.map_err(classify)
    }

    async fn tag_name(&self, element: &Element) -> DriverResult<String> {
        element.tag_name().await.map_err(classify)
    }

    async fn click(&self, element: &Element) -> DriverResult<()> {
        element.click().await.map_err(classify)
    }

    async fn clear(&self, element: &Element) -> DriverResult<()> {
        element.clear().await.map_err(classify)
    }

    async fn send_keys(&self, element: &Element, text: &str) -> DriverResult<()> {
        element.send_keys(text).await.map_err(classify)
    }

    async fn execute_script(&self, script: &str, args: &[&Element]) -> DriverResult<Value> {
        let args = Self::element_args(args)?;
        self.client.execute(script, args).await.map_err(classify)
    }

    async fn goto(&self, url: &str) -> DriverResult<()> {
        info!("Navigating to {}", url);
        self.client.goto(url).await.map_err(classify)
    }

    async fn current_url(&self) -> DriverResult<String> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(classify)
    }

    async fn title(&self) -> DriverResult<String> {
        self.client.title().await.map_err(classify)
    }

    /// Appium context listing; plain WebDriver servers answer 404
    async fn contexts(&self) -> DriverResult<Vec<String>> {
        let value = self.session_get("contexts").await?;
        serde_json::from_value(value).map_err(|e| DriverError::Other(e.to_string()))
    }

    async fn current_context(&self) -> DriverResult<String> {
        let value = self.session_get("context").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| DriverError::Other(format!("unexpected context value: {}", value)))
    }

    async fn switch_context(&self, name: &str) -> DriverResult<()> {
        let url = self.session_endpoint("context")?;
        let response = self
            .http
            .post(&url)
            .json(&json!({ "name": name }))
            .send()
            .await
            .map_err(reqwest_error)?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(DriverError::Other(format!(
                "switching to context {} returned {}",
                name,
                response.status()
            )))
        }
    }

    /// Inside a web context a swipe is a scroll by the vertical distance
    async fn swipe(&self, from: (i64, i64), to: (i64, i64), _duration: Duration) -> DriverResult<()> {
        let script = format!("window.scrollBy({}, {});", from.0 - to.0, from.1 - to.1);
        self.execute_script(&script, &[]).await.map(|_| ())
    }

    async fn refresh(&self) -> DriverResult<()> {
        self.client.refresh().await.map_err(classify)
    }

    async fn enter_frame(&self, frame: &Element) -> DriverResult<()> {
        frame.clone().enter_frame().await.map(|_| ()).map_err(classify)
    }

    async fn enter_default_content(&self) -> DriverResult<()> {
        self.client.enter_frame(None).await.map(|_| ()).map_err(classify)
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        self.client.screenshot().await.map_err(classify)
    }

    async fn page_source(&self) -> DriverResult<String> {
        self.client.source().await.map_err(classify)
    }
}

/// Creates sessions and scopes their lifetime
pub struct DriverManager {
    server_url: String,
    capabilities: Capabilities,
    screenshots: ScreenshotPolicy,
}

impl DriverManager {
    pub fn new(server_url: impl Into<String>, capabilities: Capabilities, screenshots: ScreenshotPolicy) -> Self {
        Self {
            server_url: server_url.into(),
            capabilities,
            screenshots,
        }
    }

    /// Manager for the configured server; `capabilities_file` overrides the
    /// configured default file
    pub fn from_config(config: &Config, capabilities_file: Option<&str>) -> Result<Self, ConfigError> {
        let webdriver = config.webdriver();
        let file = capabilities_file.unwrap_or(&webdriver.default_capabilities_file);
        let capabilities = Capabilities::load(&webdriver.capabilities_dir, file)?;
        Ok(Self::new(
            webdriver.server_url.clone(),
            capabilities,
            ScreenshotPolicy::from_config(config.screenshot()),
        ))
    }

    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Probe the server's `/status` endpoint
    pub async fn is_server_running(&self) -> bool {
        let status_url = format!("{}/status", self.server_url.trim_end_matches('/'));
        match reqwest::get(&status_url).await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn create_session(&self) -> Result<WebDriverSession> {
        if !self.is_server_running().await {
            return Err(FlowError::Session(format!(
                "Cannot reach WebDriver server at {}. Start it first, e.g. `appium --port 4723`",
                self.server_url
            ))
            .into());
        }
        WebDriverSession::connect(&self.server_url, self.capabilities.clone())
            .await
            .map_err(|e| anyhow::Error::from(FlowError::Session(format!("{:#}", e))))
    }

    /// Run `f` with a fresh session. The session is closed afterwards
    /// whether `f` succeeds or not; on failure a screenshot is saved first.
    pub async fn with_session<T>(
        &self,
        f: impl AsyncFnOnce(&WebDriverSession) -> Result<T>,
    ) -> Result<T> {
        let session = self.create_session().await?;
        let result = capture_on_failure(&session, &self.screenshots, f).await;
        if let Err(err) = session.close().await {
            warn!("Failed to close session: {:#}", err);
        }
        result
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;
