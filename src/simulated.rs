//! Scripted in-memory driver.
//!
//! Elements appear, become visible and stop being covered at fixed offsets
//! from the driver's creation, measured on the tokio clock. With a paused
//! clock (`#[tokio::test(start_paused = true)]`) every timing is exact, which
//! lets wait behaviour be exercised without a browser.

use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use crate::driver::{Driver, DriverError, DriverResult};
use crate::locator::{Locator, StrategyToken};

/// Handle to a simulated element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimHandle(usize);

/// Description of one simulated element
#[derive(Debug, Clone)]
pub struct SimElement {
    token: StrategyToken,
    value: String,
    tag: String,
    text: String,
    attributes: HashMap<String, String>,
    appears_at: Duration,
    removed_at: Option<Duration>,
    visible_at: Option<Duration>,
    covered_until: Duration,
    enabled: bool,
    after_swipes: u32,
    after_refresh: bool,
    failing_clicks: u32,
}

impl SimElement {
    pub fn new(locator: &Locator) -> Self {
        Self {
            token: locator.token(),
            value: locator.value.clone(),
            tag: "div".to_string(),
            text: String::new(),
            attributes: HashMap::new(),
            appears_at: Duration::ZERO,
            removed_at: None,
            visible_at: Some(Duration::ZERO),
            covered_until: Duration::ZERO,
            enabled: true,
            after_swipes: 0,
            after_refresh: false,
            failing_clicks: 0,
        }
    }

    pub fn xpath(value: &str) -> Self {
        Self::new(&Locator::xpath(value))
    }

    pub fn css(value: &str) -> Self {
        Self::new(&Locator::css(value))
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tag = tag.to_string();
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }

    pub fn attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    /// Attach to the DOM after a delay; visible from the same moment
    pub fn appears_after(mut self, delay: Duration) -> Self {
        self.appears_at = delay;
        if let Some(visible) = self.visible_at {
            self.visible_at = Some(visible.max(delay));
        }
        self
    }

    /// Detach from the DOM at the given offset
    pub fn removed_after(mut self, delay: Duration) -> Self {
        self.removed_at = Some(delay);
        self
    }

    pub fn visible_after(mut self, delay: Duration) -> Self {
        self.visible_at = Some(delay.max(self.appears_at));
        self
    }

    /// Present in the DOM but never displayed
    pub fn hidden(mut self) -> Self {
        self.visible_at = None;
        self
    }

    /// Covered by an overlay until the given offset
    pub fn covered_until(mut self, until: Duration) -> Self {
        self.covered_until = until;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Only attached once the page has been swiped this many times
    pub fn after_swipes(mut self, swipes: u32) -> Self {
        self.after_swipes = swipes;
        self
    }

    /// Only rendered once the page has been reloaded
    pub fn after_refresh(mut self) -> Self {
        self.after_refresh = true;
        self
    }

    /// Native clicks fail (intercepted) this many times before succeeding
    pub fn failing_clicks(mut self, count: u32) -> Self {
        self.failing_clicks = count;
        self
    }

    fn matches(&self, token: StrategyToken, value: &str, now: Duration, page: &PageState) -> bool {
        self.token == token
            && self.value == value
            && now >= self.appears_at
            && self.removed_at.is_none_or(|removed| now < removed)
            && page.swipes >= self.after_swipes
            && (!self.after_refresh || page.refreshes > 0)
    }
}

/// Commands observed by the simulated driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimEvent {
    Find(StrategyToken, String),
    Click(String),
    ScriptClick(String),
    Clear(String),
    Keys(String, String),
    Script(String),
    Swipe,
    Navigate(String),
    Refresh,
    EnterFrame(String),
    DefaultContent,
    SwitchContext(String),
}

/// Page-level counters elements can depend on
#[derive(Debug, Clone, Copy, Default)]
struct PageState {
    swipes: u32,
    refreshes: u32,
}

#[derive(Default)]
struct SimState {
    elements: Vec<SimElement>,
    events: Vec<SimEvent>,
    page: PageState,
    contexts: Vec<String>,
    current_context: String,
    find_error: Option<DriverError>,
    ready_at: Duration,
    url: String,
    title: String,
}

/// In-memory [`Driver`] backed by a scripted page
pub struct SimulatedDriver {
    started: Instant,
    state: Mutex<SimState>,
}

impl Default for SimulatedDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedDriver {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            state: Mutex::new(SimState {
                contexts: vec!["NATIVE_APP".to_string()],
                current_context: "NATIVE_APP".to_string(),
                url: "about:blank".to_string(),
                title: "Simulated page".to_string(),
                ..SimState::default()
            }),
        }
    }

    pub fn with_element(self, element: SimElement) -> Self {
        self.lock().elements.push(element);
        self
    }

    pub fn with_contexts(self, contexts: &[&str], current: &str) -> Self {
        {
            let mut state = self.lock();
            state.contexts = contexts.iter().map(|c| c.to_string()).collect();
            state.current_context = current.to_string();
        }
        self
    }

    /// `document.readyState` reports `loading` until this offset
    pub fn ready_after(self, delay: Duration) -> Self {
        self.lock().ready_at = delay;
        self
    }

    /// URL and title the page reports
    pub fn with_page(self, url: &str, title: &str) -> Self {
        {
            let mut state = self.lock();
            state.url = url.to_string();
            state.title = title.to_string();
        }
        self
    }

    /// Every subsequent find fails with this error
    pub fn fail_finds_with(&self, err: DriverError) {
        self.lock().find_error = Some(err);
    }

    pub fn events(&self) -> Vec<SimEvent> {
        self.lock().events.clone()
    }

    /// Number of find commands issued for a locator
    pub fn find_count(&self, locator: &Locator) -> usize {
        let token = locator.token();
        self.lock()
            .events
            .iter()
            .filter(|e| matches!(e, SimEvent::Find(t, v) if *t == token && *v == locator.value))
            .count()
    }

    pub fn count(&self, pred: impl Fn(&SimEvent) -> bool) -> usize {
        self.lock().events.iter().filter(|e| pred(e)).count()
    }

    pub fn current_context_name(&self) -> String {
        self.lock().current_context.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn now(&self) -> Duration {
        self.started.elapsed()
    }

    fn with_element_state<T>(
        &self,
        handle: &SimHandle,
        f: impl FnOnce(&mut SimElement, Duration) -> DriverResult<T>,
    ) -> DriverResult<T> {
        let now = self.now();
        let mut state = self.lock();
        let element = state
            .elements
            .get_mut(handle.0)
            .ok_or_else(|| DriverError::StaleElement(format!("element {}", handle.0)))?;
        f(element, now)
    }

    fn describe(&self, handle: &SimHandle) -> String {
        self.lock()
            .elements
            .get(handle.0)
            .map(|e| e.value.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Driver for SimulatedDriver {
    type Element = SimHandle;

    async fn find_element(
        &self,
        token: StrategyToken,
        value: &str,
    ) -> DriverResult<Option<SimHandle>> {
        let now = self.now();
        let mut state = self.lock();
        state.events.push(SimEvent::Find(token, value.to_string()));
        if let Some(err) = &state.find_error {
            return Err(err.clone());
        }
        let page = state.page;
        Ok(state
            .elements
            .iter()
            .position(|e| e.matches(token, value, now, &page))
            .map(SimHandle))
    }

    async fn find_elements(&self, token: StrategyToken, value: &str) -> DriverResult<Vec<SimHandle>> {
        let now = self.now();
        let mut state = self.lock();
        state.events.push(SimEvent::Find(token, value.to_string()));
        if let Some(err) = &state.find_error {
            return Err(err.clone());
        }
        let page = state.page;
        Ok(state
            .elements
            .iter()
            .enumerate()
            .filter(|(_, e)| e.matches(token, value, now, &page))
            .map(|(index, _)| SimHandle(index))
            .collect())
    }

    async fn is_displayed(&self, element: &SimHandle) -> DriverResult<bool> {
        self.with_element_state(element, |e, now| {
            Ok(e.visible_at.is_some_and(|visible| now >= visible))
        })
    }

    async fn is_enabled(&self, element: &SimHandle) -> DriverResult<bool> {
        self.with_element_state(element, |e, _| Ok(e.enabled))
    }

    async fn is_obscured(&self, element: &SimHandle) -> DriverResult<bool> {
        self.with_element_state(element, |e, now| Ok(now < e.covered_until))
    }

    async fn text(&self, element: &SimHandle) -> DriverResult<String> {
        self.with_element_state(element, |e, _| Ok(e.text.clone()))
    }

    async fn attribute(&self, element: &SimHandle, name: &str) -> DriverResult<Option<String>> {
        self.with_element_state(element, |e, _| Ok(e.attributes.get(name).cloned()))
    }

    async fn tag_name(&self, element: &SimHandle) -> DriverResult<String> {
        self.with_element_state(element, |e, _| Ok(e.tag.clone()))
    }

    async fn click(&self, element: &SimHandle) -> DriverResult<()> {
        self.with_element_state(element, |e, now| {
            if now < e.covered_until {
                return Err(DriverError::ClickIntercepted(e.value.clone()));
            }
            if e.failing_clicks > 0 {
                e.failing_clicks -= 1;
                return Err(DriverError::ClickIntercepted(e.value.clone()));
            }
            Ok(())
        })?;
        let name = self.describe(element);
        self.lock().events.push(SimEvent::Click(name));
        Ok(())
    }

    async fn clear(&self, element: &SimHandle) -> DriverResult<()> {
        let name = self.describe(element);
        self.lock().events.push(SimEvent::Clear(name));
        Ok(())
    }

    async fn send_keys(&self, element: &SimHandle, text: &str) -> DriverResult<()> {
        let name = self.describe(element);
        self.lock().events.push(SimEvent::Keys(name, text.to_string()));
        Ok(())
    }

    async fn execute_script(&self, script: &str, args: &[&SimHandle]) -> DriverResult<Value> {
        if script.contains("arguments[0].click()") {
            let target = args
                .first()
                .ok_or_else(|| DriverError::Script("missing click target".to_string()))?;
            let name = self.describe(target);
            self.lock().events.push(SimEvent::ScriptClick(name));
            return Ok(Value::Null);
        }

        let now = self.now();
        let mut state = self.lock();
        state.events.push(SimEvent::Script(script.to_string()));
        if script.contains("document.readyState") {
            let ready = if now >= state.ready_at { "complete" } else { "loading" };
            return Ok(json!(ready));
        }
        Ok(Value::Null)
    }

    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.lock().events.push(SimEvent::Navigate(url.to_string()));
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.lock().url.clone())
    }

    async fn title(&self) -> DriverResult<String> {
        Ok(self.lock().title.clone())
    }

    async fn contexts(&self) -> DriverResult<Vec<String>> {
        Ok(self.lock().contexts.clone())
    }

    async fn current_context(&self) -> DriverResult<String> {
        Ok(self.lock().current_context.clone())
    }

    async fn switch_context(&self, name: &str) -> DriverResult<()> {
        let mut state = self.lock();
        if !state.contexts.iter().any(|c| c == name) {
            return Err(DriverError::Other(format!("no such context: {}", name)));
        }
        state.current_context = name.to_string();
        state.events.push(SimEvent::SwitchContext(name.to_string()));
        Ok(())
    }

    async fn swipe(&self, _from: (i64, i64), _to: (i64, i64), _duration: Duration) -> DriverResult<()> {
        let mut state = self.lock();
        state.page.swipes += 1;
        state.events.push(SimEvent::Swipe);
        Ok(())
    }

    async fn refresh(&self) -> DriverResult<()> {
        let mut state = self.lock();
        state.page.refreshes += 1;
        state.events.push(SimEvent::Refresh);
        Ok(())
    }

    async fn enter_frame(&self, frame: &SimHandle) -> DriverResult<()> {
        let name = self.describe(frame);
        self.lock().events.push(SimEvent::EnterFrame(name));
        Ok(())
    }

    async fn enter_default_content(&self) -> DriverResult<()> {
        self.lock().events.push(SimEvent::DefaultContent);
        Ok(())
    }

    async fn screenshot(&self) -> DriverResult<Vec<u8>> {
        // PNG signature only; enough for artifact handling
        Ok(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A])
    }

    async fn page_source(&self) -> DriverResult<String> {
        let state = self.lock();
        let body: Vec<String> = state
            .elements
            .iter()
            .map(|e| format!("<{tag}>{text}</{tag}>", tag = e.tag, text = e.text))
            .collect();
        Ok(format!("<html><body>{}</body></html>", body.join("")))
    }
}
