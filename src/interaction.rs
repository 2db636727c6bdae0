//! Higher-level element actions with per-action retry and fallback

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::chain::CandidateChain;
use crate::driver::{Driver, DriverError};
use crate::errors::FlowError;
use crate::wait::{ElementResolver, Located, WaitMode, WaitOutcome, WaitSettings};

const SCROLL_INTO_VIEW_SCRIPT: &str = "arguments[0].scrollIntoView({block: 'center'});";
const SCRIPT_CLICK: &str = "arguments[0].click();";

/// Swipe used while scrolling for an element: bottom to top of a phone-sized viewport
const SWIPE_FROM: (i64, i64) = (500, 1500);
const SWIPE_TO: (i64, i64) = (500, 500);
const SWIPE_DURATION: Duration = Duration::from_millis(800);

/// Whether a missing text input fails the flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryPolicy {
    Required,
    /// Absent input is logged and skipped
    Optional,
}

/// Executes taps, typing and reads on top of an [`ElementResolver`]
pub struct InteractionExecutor<'d, D: Driver> {
    resolver: ElementResolver<'d, D>,
}

impl<'d, D: Driver> InteractionExecutor<'d, D> {
    pub fn new(driver: &'d D, settings: WaitSettings) -> Self {
        Self {
            resolver: ElementResolver::new(driver, settings),
        }
    }

    pub fn resolver(&self) -> &ElementResolver<'d, D> {
        &self.resolver
    }

    pub fn driver(&self) -> &'d D {
        self.resolver.driver()
    }

    pub fn settings(&self) -> &WaitSettings {
        self.resolver.settings()
    }

    /// Resolve a chain, turning a timeout into `NotFound`
    pub async fn require(
        &self,
        chain: &CandidateChain,
        budget: Duration,
        mode: WaitMode,
    ) -> Result<Located<D::Element>, FlowError> {
        match self.resolver.locate_chain(chain, budget, mode).await {
            WaitOutcome::Found(located) => Ok(located),
            WaitOutcome::TimedOut(attempts) => {
                error!("Element not found: {}", chain);
                Err(FlowError::not_found(chain.target(), attempts))
            }
            WaitOutcome::Error(err) => Err(err.into()),
        }
    }

    /// Tap an element: resolve clickable, scroll into view, settle, click.
    ///
    /// The resolve + click cycle runs up to `tap_retries` times. If an element
    /// was resolved but never accepted a native click, a script click on it
    /// is the last resort. No extra resolve is issued for that click.
    pub async fn tap(&self, chain: &CandidateChain, budget: Duration) -> Result<(), FlowError> {
        let retries = self.settings().tap_retries.max(1);
        let mut clicked_candidate: Option<D::Element> = None;
        let mut reason = String::new();

        for attempt in 1..=retries {
            match self.resolver.locate_chain(chain, budget, WaitMode::Clickable).await {
                WaitOutcome::Found(located) => match self.scroll_and_click(&located.element).await {
                    Ok(()) => {
                        info!("Successfully tapped '{}' using {}", chain.target(), located.locator);
                        return Ok(());
                    }
                    Err(err) if err.is_fatal() => return Err(err.into()),
                    Err(err) => {
                        warn!(
                            "Tap attempt {} failed for '{}' using {}: {}",
                            attempt,
                            chain.target(),
                            located.locator,
                            err
                        );
                        reason = err.to_string();
                        clicked_candidate = Some(located.element);
                    }
                },
                WaitOutcome::TimedOut(attempts) => {
                    warn!(
                        "Tap attempt {} could not resolve '{}' ({} locator attempt(s))",
                        attempt,
                        chain.target(),
                        attempts.len()
                    );
                    reason = "element not found or not clickable".to_string();
                    // A handle from an earlier cycle may have left the DOM
                    clicked_candidate = None;
                }
                WaitOutcome::Error(err) => return Err(err.into()),
            }

            if attempt < retries {
                sleep(self.settings().retry_pause).await;
            }
        }

        if let Some(element) = clicked_candidate {
            match self.driver().execute_script(SCRIPT_CLICK, &[&element]).await {
                Ok(_) => {
                    info!("Script click succeeded for '{}'", chain.target());
                    return Ok(());
                }
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => reason = format!("script click failed: {}", err),
            }
        }

        error!("All tap attempts failed for '{}'", chain.target());
        Err(FlowError::InteractionFailed {
            action: "tap",
            target: chain.target().to_string(),
            attempts: retries,
            reason,
        })
    }

    /// Tap a target that may legitimately be absent (popups, banners).
    /// Returns whether anything was tapped.
    pub async fn tap_optional(
        &self,
        chain: &CandidateChain,
        budget: Duration,
    ) -> Result<bool, FlowError> {
        let located = match self.resolver.locate_chain(chain, budget, WaitMode::Clickable).await {
            WaitOutcome::Found(located) => located,
            WaitOutcome::TimedOut(_) => {
                info!("Optional target '{}' not present, continuing", chain.target());
                return Ok(false);
            }
            WaitOutcome::Error(err) => return Err(err.into()),
        };

        match self.driver().click(&located.element).await {
            Ok(()) => Ok(true),
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                debug!("Native click on '{}' failed ({}), using script click", chain.target(), err);
                self.script_click(chain, &located.element).await?;
                Ok(true)
            }
        }
    }

    /// Clear an input and type into it.
    ///
    /// Returns `Ok(false)` when an optional input could not be resolved.
    pub async fn type_text(
        &self,
        chain: &CandidateChain,
        text: &str,
        budget: Duration,
        policy: EntryPolicy,
    ) -> Result<bool, FlowError> {
        let located = match self.resolver.locate_chain(chain, budget, WaitMode::VisibleOnly).await {
            WaitOutcome::Found(located) => located,
            WaitOutcome::TimedOut(attempts) => {
                return match policy {
                    EntryPolicy::Optional => {
                        info!("Optional input '{}' not found, skipping text entry", chain.target());
                        Ok(false)
                    }
                    EntryPolicy::Required => {
                        error!("Element to send text not found: {}", chain);
                        Err(FlowError::not_found(chain.target(), attempts))
                    }
                };
            }
            WaitOutcome::Error(err) => return Err(err.into()),
        };

        let driver = self.driver();
        driver
            .clear(&located.element)
            .await
            .map_err(|err| self.action_error("clear", chain, err))?;
        driver
            .send_keys(&located.element, text)
            .await
            .map_err(|err| self.action_error("type", chain, err))?;

        info!("Sent text to '{}' using {}", chain.target(), located.locator);
        Ok(true)
    }

    /// Text content of the first visible candidate
    pub async fn read_text(&self, chain: &CandidateChain, budget: Duration) -> Result<String, FlowError> {
        let located = self.require(chain, budget, WaitMode::VisibleOnly).await?;
        self.driver()
            .text(&located.element)
            .await
            .map_err(|err| self.action_error("read text", chain, err))
    }

    /// Presence probe; never fails
    pub async fn is_present(&self, chain: &CandidateChain, budget: Duration) -> bool {
        match self.resolver.locate_chain(chain, budget, WaitMode::PresentOnly).await {
            WaitOutcome::Found(_) => true,
            WaitOutcome::TimedOut(_) => false,
            WaitOutcome::Error(err) => {
                warn!("Presence check for '{}' hit a driver error: {}", chain.target(), err);
                false
            }
        }
    }

    /// Alternate short probes with swipes until the target shows up.
    ///
    /// A miss is `Ok(None)`; only fatal driver errors are returned as errors.
    pub async fn scroll_until_found(
        &self,
        chain: &CandidateChain,
        max_scrolls: u32,
    ) -> Result<Option<Located<D::Element>>, FlowError> {
        let probe = self.settings().scroll_probe;

        for scroll in 0..max_scrolls {
            match self.resolver.locate_chain(chain, probe, WaitMode::VisibleOnly).await {
                WaitOutcome::Found(located) => {
                    info!("Found '{}' after {} scroll(s)", chain.target(), scroll);
                    return Ok(Some(located));
                }
                WaitOutcome::TimedOut(_) => {}
                WaitOutcome::Error(err) => return Err(err.into()),
            }

            match self.driver().swipe(SWIPE_FROM, SWIPE_TO, SWIPE_DURATION).await {
                Ok(()) => debug!("Swiped from {:?} to {:?}", SWIPE_FROM, SWIPE_TO),
                Err(err) if err.is_fatal() => return Err(err.into()),
                Err(err) => warn!("Swipe failed: {}", err),
            }
        }

        error!("'{}' not found after {} scroll(s)", chain.target(), max_scrolls);
        Ok(None)
    }

    /// Click through a script, for elements that ignore native clicks
    pub async fn js_click(&self, chain: &CandidateChain, budget: Duration) -> Result<(), FlowError> {
        let located = self.require(chain, budget, WaitMode::VisibleOnly).await?;
        self.script_click(chain, &located.element).await?;
        info!("Script clicked '{}' using {}", chain.target(), located.locator);
        Ok(())
    }

    /// Enter an iframe if one matches; false when absent
    pub async fn switch_to_frame(&self, chain: &CandidateChain, budget: Duration) -> Result<bool, FlowError> {
        let located = match self.resolver.locate_chain(chain, budget, WaitMode::PresentOnly).await {
            WaitOutcome::Found(located) => located,
            WaitOutcome::TimedOut(_) => {
                info!("No frame found for '{}'", chain.target());
                return Ok(false);
            }
            WaitOutcome::Error(err) => return Err(err.into()),
        };

        match self.driver().enter_frame(&located.element).await {
            Ok(()) => {
                info!("Switched to frame: {}", located.locator);
                Ok(true)
            }
            Err(err) if err.is_fatal() => Err(err.into()),
            Err(err) => {
                info!("Frame switch failed for {}: {}", located.locator, err);
                Ok(false)
            }
        }
    }

    /// Leave any iframe; best effort
    pub async fn switch_to_default_content(&self) {
        match self.driver().enter_default_content().await {
            Ok(()) => info!("Switched to default content"),
            Err(err) => warn!("Failed to switch to default content: {}", err),
        }
    }

    /// Switch to the first webview context when the session exposes one.
    ///
    /// Plain browser sessions have no contexts; failures are logged and ignored.
    pub async fn ensure_web_context(&self) -> Option<String> {
        let driver = self.driver();
        let contexts = match driver.contexts().await {
            Ok(contexts) => contexts,
            Err(err) => {
                warn!("Context listing not available: {}", err);
                return None;
            }
        };

        let web_context = contexts
            .into_iter()
            .find(|c| c.contains("WEBVIEW") || c.contains("CHROMIUM"))?;

        match driver.current_context().await {
            Ok(current) if current == web_context => Some(web_context),
            _ => match driver.switch_context(&web_context).await {
                Ok(()) => {
                    info!("Switched to web context: {}", web_context);
                    Some(web_context)
                }
                Err(err) => {
                    warn!("Context switching failed: {}", err);
                    None
                }
            },
        }
    }

    /// Wait for the document to finish loading; a timeout only logs
    pub async fn wait_for_page_load(&self, budget: Duration) -> Result<bool, FlowError> {
        let ready = self.resolver.wait_for_page_ready(budget).await?;
        if ready {
            info!("Page loaded successfully");
        } else {
            warn!("Page load timeout - continuing anyway");
        }
        Ok(ready)
    }

    async fn scroll_and_click(&self, element: &D::Element) -> Result<(), DriverError> {
        let driver = self.driver();
        driver.execute_script(SCROLL_INTO_VIEW_SCRIPT, &[element]).await?;
        sleep(self.settings().settle_pause).await;
        driver.click(element).await
    }

    async fn script_click(&self, chain: &CandidateChain, element: &D::Element) -> Result<(), FlowError> {
        self.driver()
            .execute_script(SCRIPT_CLICK, &[element])
            .await
            .map(|_| ())
            .map_err(|err| self.action_error("script click", chain, err))
    }

    fn action_error(&self, action: &'static str, chain: &CandidateChain, err: DriverError) -> FlowError {
        if err.is_fatal() {
            return err.into();
        }
        FlowError::InteractionFailed {
            action,
            target: chain.target().to_string(),
            attempts: 1,
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
#[path = "interaction_test.rs"]
mod interaction_test;
