//! Element resolution with a staged wait waterfall.
//!
//! A locate call runs up to three stages, each with its own deadline:
//!
//! 1. **Primary**: poll until the element satisfies the requested [`WaitMode`].
//! 2. **Presence**: a short wait for the element to be attached, accepted only
//!    if it is also displayed (recovers from late visibility flips).
//! 3. **Polling**: plain find-and-check polling with a recovery nudge (scroll)
//!    every few misses, for driver combinations that miss DOM events.
//!
//! When [`WaitSettings::refresh_fallback`] is set, a fourth stage reloads the
//! page and waits once more for the element to become visible.
//!
//! If every stage expires the outcome is [`WaitOutcome::TimedOut`]. A fatal
//! driver error ends the waterfall immediately with [`WaitOutcome::Error`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, error, info, warn};

use crate::chain::CandidateChain;
use crate::driver::{Driver, DriverError, DriverResult};
use crate::locator::Locator;

/// Scrolls the page half-way, nudging lazy content into rendering
const RECOVERY_SCROLL_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight / 2);";

/// Fallback stages get at most this fraction (1/n) of the caller's budget
const FALLBACK_BUDGET_DIVISOR: u32 = 4;

/// Pause after a reload before polling again
pub const REFRESH_SETTLE: Duration = Duration::from_secs(2);

/// Longest deadline a wait will compute; larger budgets are clamped to it
const MAX_DEADLINE: Duration = Duration::from_secs(86_400 * 365 * 30);

fn deadline_after(budget: Duration) -> Instant {
    let now = Instant::now();
    now.checked_add(budget.min(MAX_DEADLINE)).unwrap_or(now)
}

/// What a located element must satisfy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WaitMode {
    /// Attached and displayed
    #[serde(rename = "visible")]
    #[value(name = "visible")]
    VisibleOnly,
    /// Displayed, enabled and not covered by another element
    Clickable,
    /// Attached to the DOM, visibility not checked
    #[serde(rename = "present")]
    #[value(name = "present")]
    PresentOnly,
}

impl WaitMode {
    /// Mode accepted by the fallback stages
    fn relaxed(self) -> WaitMode {
        match self {
            WaitMode::PresentOnly => WaitMode::PresentOnly,
            WaitMode::VisibleOnly | WaitMode::Clickable => WaitMode::VisibleOnly,
        }
    }
}

impl fmt::Display for WaitMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitMode::VisibleOnly => "visible",
            WaitMode::Clickable => "clickable",
            WaitMode::PresentOnly => "present",
        };
        f.write_str(name)
    }
}

/// Timing knobs for resolution and interactions
#[derive(Debug, Clone, PartialEq)]
pub struct WaitSettings {
    /// Default budget for a locate call
    pub resolve_budget: Duration,
    /// Default budget for presence probes
    pub presence_probe: Duration,
    /// Upper bound for the presence fallback stage
    pub presence_fallback: Duration,
    /// Upper bound for the manual polling stage
    pub polling_cap: Duration,
    pub poll_interval: Duration,
    /// Run the recovery nudge after this many consecutive misses
    pub recovery_every: u32,
    pub recovery_pause: Duration,
    /// Per-probe budget while scrolling for an element
    pub scroll_probe: Duration,
    /// Pause after scrolling a target into view, before clicking it
    pub settle_pause: Duration,
    pub tap_retries: u32,
    pub retry_pause: Duration,
    /// Budget for a full page load
    pub page_load: Duration,
    /// Visibility wait after a page reload, run once every other stage
    /// has expired. `None` disables the reload.
    pub refresh_fallback: Option<Duration>,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            resolve_budget: Duration::from_secs(20),
            presence_probe: Duration::from_secs(5),
            presence_fallback: Duration::from_secs(10),
            polling_cap: Duration::from_secs(15),
            poll_interval: Duration::from_millis(500),
            recovery_every: 3,
            recovery_pause: Duration::from_secs(1),
            scroll_probe: Duration::from_secs(2),
            settle_pause: Duration::from_millis(500),
            tap_retries: 3,
            retry_pause: Duration::from_secs(1),
            page_load: Duration::from_secs(30),
            refresh_fallback: None,
        }
    }
}

/// Per-stage deadlines derived from one caller budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageBudgets {
    pub primary: Duration,
    pub presence: Duration,
    pub polling: Duration,
    pub refresh: Option<Duration>,
}

impl StageBudgets {
    pub fn derive(budget: Duration, settings: &WaitSettings) -> Self {
        let share = budget / FALLBACK_BUDGET_DIVISOR;
        Self {
            primary: budget,
            presence: share.min(settings.presence_fallback),
            polling: share.min(settings.polling_cap),
            refresh: settings.refresh_fallback,
        }
    }

    /// Longest a locate call can block, saturating at `Duration::MAX`
    pub fn total(&self) -> Duration {
        let reload = self
            .refresh
            .map_or(Duration::ZERO, |refresh| REFRESH_SETTLE.saturating_add(refresh));
        self.primary
            .saturating_add(self.presence)
            .saturating_add(self.polling)
            .saturating_add(reload)
    }
}

/// Waterfall stage, used in log events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Primary,
    Presence,
    Polling,
    Refresh,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Primary => "primary",
            Stage::Presence => "presence",
            Stage::Polling => "polling",
            Stage::Refresh => "refresh",
        };
        f.write_str(name)
    }
}

/// An element together with the locator that produced it
#[derive(Debug, Clone)]
pub struct Located<E> {
    pub element: E,
    pub locator: Locator,
}

/// One exhausted locate call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempt {
    pub locator: Locator,
    pub elapsed: Duration,
}

/// Result of a resolution attempt
#[derive(Debug, Clone)]
pub enum WaitOutcome<E> {
    Found(Located<E>),
    /// Every stage (or every candidate) expired
    TimedOut(Vec<Attempt>),
    /// A fatal driver error stopped resolution
    Error(DriverError),
}

impl<E> WaitOutcome<E> {
    pub fn is_found(&self) -> bool {
        matches!(self, WaitOutcome::Found(_))
    }

    pub fn found(self) -> Option<Located<E>> {
        match self {
            WaitOutcome::Found(located) => Some(located),
            _ => None,
        }
    }

    /// Attempts recorded by a timed-out resolution
    pub fn attempts(&self) -> &[Attempt] {
        match self {
            WaitOutcome::TimedOut(attempts) => attempts,
            _ => &[],
        }
    }
}

enum StageResult<E> {
    Found(E),
    Expired,
    Fatal(DriverError),
}

/// Locates elements through a [`Driver`] under a time budget
pub struct ElementResolver<'d, D: Driver> {
    driver: &'d D,
    settings: WaitSettings,
}

impl<'d, D: Driver> ElementResolver<'d, D> {
    pub fn new(driver: &'d D, settings: WaitSettings) -> Self {
        Self { driver, settings }
    }

    pub fn driver(&self) -> &'d D {
        self.driver
    }

    pub fn settings(&self) -> &WaitSettings {
        &self.settings
    }

    /// Locate one element, running the three-stage waterfall
    pub async fn locate(
        &self,
        locator: &Locator,
        budget: Duration,
        mode: WaitMode,
    ) -> WaitOutcome<D::Element> {
        let started = Instant::now();
        let stages = StageBudgets::derive(budget, &self.settings);
        debug!(%locator, %mode, budget_ms = budget.as_millis() as u64, "Locating element");

        let mut stage_plan = vec![
            (Stage::Primary, stages.primary),
            (Stage::Presence, stages.presence),
            (Stage::Polling, stages.polling),
        ];
        if let Some(refresh) = stages.refresh {
            stage_plan.push((Stage::Refresh, refresh));
        }

        for (stage, stage_budget) in stage_plan {
            let result = match stage {
                Stage::Primary => self.poll_until(locator, mode, stage_budget).await,
                Stage::Presence => self.presence_fallback(locator, mode, stage_budget).await,
                Stage::Polling => self.manual_polling(locator, mode, stage_budget).await,
                Stage::Refresh => self.refresh_fallback(locator, mode, stage_budget).await,
            };

            match result {
                StageResult::Found(element) => {
                    info!(
                        %locator,
                        %stage,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Element found"
                    );
                    return WaitOutcome::Found(Located {
                        element,
                        locator: locator.clone(),
                    });
                }
                StageResult::Fatal(err) => {
                    error!(%locator, %stage, "Driver failure while locating element: {}", err);
                    return WaitOutcome::Error(err);
                }
                StageResult::Expired => {
                    warn!(%locator, %stage, "Wait stage timed out");
                }
            }
        }

        let elapsed = started.elapsed();
        error!(
            %locator,
            elapsed_ms = elapsed.as_millis() as u64,
            "Element not found after all wait stages"
        );
        WaitOutcome::TimedOut(vec![Attempt {
            locator: locator.clone(),
            elapsed,
        }])
    }

    /// Resolve the first candidate of a chain that yields an element
    pub async fn locate_chain(
        &self,
        chain: &CandidateChain,
        budget: Duration,
        mode: WaitMode,
    ) -> WaitOutcome<D::Element> {
        chain
            .resolve_first(async |locator| self.locate(locator, budget, mode).await)
            .await
    }

    /// Wait until no displayed element matches the locator
    pub async fn wait_for_disappear(&self, locator: &Locator, budget: Duration) -> DriverResult<bool> {
        let deadline = deadline_after(budget);
        loop {
            match self.check(locator, WaitMode::VisibleOnly).await {
                Ok(None) => return Ok(true),
                Ok(Some(_)) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => debug!(%locator, "Ignoring driver error while waiting: {}", err),
            }
            if !self.pause_before(deadline).await {
                debug!(%locator, "Element still visible at deadline");
                return Ok(false);
            }
        }
    }

    /// Wait for `document.readyState` to become `complete`
    pub async fn wait_for_page_ready(&self, budget: Duration) -> DriverResult<bool> {
        let deadline = deadline_after(budget);
        loop {
            match self
                .driver
                .execute_script("return document.readyState;", &[])
                .await
            {
                Ok(state) if state.as_str() == Some("complete") => return Ok(true),
                Ok(_) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => debug!("Ready state check failed: {}", err),
            }
            if !self.pause_before(deadline).await {
                return Ok(false);
            }
        }
    }

    /// Sleep one poll interval, clamped to the deadline.
    /// Returns false once the deadline has passed.
    async fn pause_before(&self, deadline: Instant) -> bool {
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(self.settings.poll_interval.min(deadline - now)).await;
        true
    }

    async fn poll_until(
        &self,
        locator: &Locator,
        mode: WaitMode,
        budget: Duration,
    ) -> StageResult<D::Element> {
        let deadline = deadline_after(budget);
        loop {
            match self.check(locator, mode).await {
                Ok(Some(element)) => return StageResult::Found(element),
                Ok(None) => {}
                Err(err) if err.is_fatal() => return StageResult::Fatal(err),
                Err(err) => debug!(%locator, "Transient driver error: {}", err),
            }
            if !self.pause_before(deadline).await {
                return StageResult::Expired;
            }
        }
    }

    async fn presence_fallback(
        &self,
        locator: &Locator,
        mode: WaitMode,
        budget: Duration,
    ) -> StageResult<D::Element> {
        let element = match self.poll_until(locator, WaitMode::PresentOnly, budget).await {
            StageResult::Found(element) => element,
            other => return other,
        };
        if mode == WaitMode::PresentOnly {
            return StageResult::Found(element);
        }

        match self.driver.is_displayed(&element).await {
            Ok(true) => StageResult::Found(element),
            Ok(false) => {
                debug!(%locator, "Element present but not displayed");
                StageResult::Expired
            }
            Err(err) if err.is_fatal() => StageResult::Fatal(err),
            Err(err) => {
                debug!(%locator, "Visibility check failed: {}", err);
                StageResult::Expired
            }
        }
    }

    async fn manual_polling(
        &self,
        locator: &Locator,
        mode: WaitMode,
        budget: Duration,
    ) -> StageResult<D::Element> {
        let deadline = deadline_after(budget);
        let mode = mode.relaxed();
        let mut misses: u32 = 0;

        loop {
            match self.check(locator, mode).await {
                Ok(Some(element)) => return StageResult::Found(element),
                Ok(None) => misses += 1,
                Err(err) if err.is_fatal() => return StageResult::Fatal(err),
                Err(err) => {
                    debug!(%locator, "Polling error: {}", err);
                    misses += 1;
                }
            }

            if self.settings.recovery_every > 0 && misses % self.settings.recovery_every == 0 {
                if let Err(err) = self.recover(deadline).await {
                    return StageResult::Fatal(err);
                }
            }

            if !self.pause_before(deadline).await {
                return StageResult::Expired;
            }
        }
    }

    /// Reload the page, let it settle, then wait for the element once more
    async fn refresh_fallback(
        &self,
        locator: &Locator,
        mode: WaitMode,
        budget: Duration,
    ) -> StageResult<D::Element> {
        info!(%locator, "Attempting page refresh and retry");
        match self.driver.refresh().await {
            Ok(()) => {}
            Err(err) if err.is_fatal() => return StageResult::Fatal(err),
            Err(err) => {
                warn!(%locator, "Page refresh failed: {}", err);
                return StageResult::Expired;
            }
        }
        sleep(REFRESH_SETTLE).await;
        self.poll_until(locator, mode.relaxed(), budget).await
    }

    /// Nudge the page and give it a moment to render
    async fn recover(&self, deadline: Instant) -> DriverResult<()> {
        debug!("Running recovery scroll");
        match self.driver.execute_script(RECOVERY_SCROLL_SCRIPT, &[]).await {
            Ok(_) => {}
            Err(err) if err.is_fatal() => return Err(err),
            Err(err) => debug!("Recovery scroll failed: {}", err),
        }
        let remaining = deadline.saturating_duration_since(Instant::now());
        sleep(self.settings.recovery_pause.min(remaining)).await;
        Ok(())
    }

    /// One find + state check. `Ok(None)` means not (yet) satisfied.
    async fn check(&self, locator: &Locator, mode: WaitMode) -> DriverResult<Option<D::Element>> {
        let Some(element) = self
            .driver
            .find_element(locator.token(), &locator.value)
            .await?
        else {
            return Ok(None);
        };

        let satisfied = match mode {
            WaitMode::PresentOnly => true,
            WaitMode::VisibleOnly => self.driver.is_displayed(&element).await?,
            WaitMode::Clickable => {
                self.driver.is_displayed(&element).await?
                    && self.driver.is_enabled(&element).await?
                    && !self.driver.is_obscured(&element).await?
            }
        };

        Ok(satisfied.then_some(element))
    }
}

#[cfg(test)]
#[path = "wait_test.rs"]
mod wait_test;
