//! The remote driver boundary consumed by the wait engine and page objects

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::locator::StrategyToken;

/// Errors reported by a driver command
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DriverError {
    /// The element reference no longer points into the live DOM
    #[error("stale element reference: {0}")]
    StaleElement(String),

    #[error("element not interactable: {0}")]
    NotInteractable(String),

    /// Another element received the click
    #[error("element click intercepted: {0}")]
    ClickIntercepted(String),

    #[error("script error: {0}")]
    Script(String),

    #[error("unsupported command: {0}")]
    Unsupported(String),

    /// The session or its connection is gone
    #[error("driver transport failure: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

impl DriverError {
    /// Fatal errors abort the flow; everything else may be retried
    pub fn is_fatal(&self) -> bool {
        matches!(self, DriverError::Transport(_))
    }
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Commands the automation core needs from a remote session.
///
/// A session handles one command at a time; callers serialize access by
/// awaiting each call before issuing the next.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Opaque element reference owned by the session
    type Element: Clone + Send + Sync;

    /// Find the first match. A miss is `Ok(None)`, not an error.
    async fn find_element(
        &self,
        token: StrategyToken,
        value: &str,
    ) -> DriverResult<Option<Self::Element>>;

    /// Every match, in document order
    async fn find_elements(&self, token: StrategyToken, value: &str)
    -> DriverResult<Vec<Self::Element>>;

    async fn is_displayed(&self, element: &Self::Element) -> DriverResult<bool>;

    async fn is_enabled(&self, element: &Self::Element) -> DriverResult<bool>;

    /// True when another element sits on top of this element's centre
    async fn is_obscured(&self, element: &Self::Element) -> DriverResult<bool>;

    async fn text(&self, element: &Self::Element) -> DriverResult<String>;

    async fn attribute(&self, element: &Self::Element, name: &str)
    -> DriverResult<Option<String>>;

    async fn tag_name(&self, element: &Self::Element) -> DriverResult<String>;

    async fn click(&self, element: &Self::Element) -> DriverResult<()>;

    async fn clear(&self, element: &Self::Element) -> DriverResult<()>;

    async fn send_keys(&self, element: &Self::Element, text: &str) -> DriverResult<()>;

    /// Run a script; elements are exposed as `arguments[0..]`
    async fn execute_script(&self, script: &str, args: &[&Self::Element]) -> DriverResult<Value>;

    async fn goto(&self, url: &str) -> DriverResult<()>;

    async fn current_url(&self) -> DriverResult<String>;

    async fn title(&self) -> DriverResult<String>;

    async fn contexts(&self) -> DriverResult<Vec<String>>;

    async fn current_context(&self) -> DriverResult<String>;

    async fn switch_context(&self, name: &str) -> DriverResult<()>;

    /// Swipe gesture between two screen points
    async fn swipe(&self, from: (i64, i64), to: (i64, i64), duration: Duration)
    -> DriverResult<()>;

    async fn refresh(&self) -> DriverResult<()>;

    async fn enter_frame(&self, frame: &Self::Element) -> DriverResult<()>;

    async fn enter_default_content(&self) -> DriverResult<()>;

    /// PNG bytes of the current viewport
    async fn screenshot(&self) -> DriverResult<Vec<u8>>;

    async fn page_source(&self) -> DriverResult<String>;
}
