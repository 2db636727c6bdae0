//! Page objects for the hotel search flow.
//!
//! Every target is described by a [`CandidateChain`] built fresh per call,
//! listing the locators the site has used across releases, newest first.

use serde::Serialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::chain::CandidateChain;
use crate::driver::Driver;
use crate::errors::FlowError;
use crate::interaction::{EntryPolicy, InteractionExecutor};
use crate::locator::{Locator, xpath_literal};

/// Home screen: navigation tabs and the hotel search widget
pub struct HomePage<'a, 'd, D: Driver> {
    exec: &'a InteractionExecutor<'d, D>,
    budget: Duration,
}

impl<'a, 'd, D: Driver> HomePage<'a, 'd, D> {
    pub fn new(exec: &'a InteractionExecutor<'d, D>) -> Self {
        Self {
            exec,
            budget: exec.settings().resolve_budget,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn login_popup_close() -> CandidateChain {
        CandidateChain::new("login popup close")
            .xpath("//span[@data-cy='loginBottomsheetCrossClick']")
            .css("span.commonModal__close")
    }

    pub fn hotels_tab() -> CandidateChain {
        CandidateChain::new("hotels tab")
            .xpath("//a[@data-cy='menu_item_clicked_1']")
            .xpath("//li[@data-cy='menu_Hotels']/a")
            .with(Locator::link_text("Hotels"))
    }

    pub fn search_field() -> CandidateChain {
        CandidateChain::new("search field")
            .xpath("(//button[text()='Near me']/parent::div/preceding-sibling::div/span)[2]")
            .id("city")
            .css("label[for='city']")
    }

    pub fn search_input() -> CandidateChain {
        CandidateChain::new("search input")
            .xpath("//input[@id='autoSuggestWidget']")
            .css("input[placeholder='Where do you want to stay?']")
    }

    pub fn first_suggestion() -> CandidateChain {
        CandidateChain::new("first suggestion")
            .xpath("//ul[@id='ui-id-1']/li[1]")
            .css("ul[role='listbox'] li:first-child")
    }

    pub fn tomorrow_date() -> CandidateChain {
        CandidateChain::new("tomorrow's date")
            .xpath("//td[contains(@class, 'DayPicker-Day') and not(contains(@class, 'disabled'))][2]")
            .xpath("//div[contains(@class, 'DayPicker-Day') and @aria-disabled='false'][2]")
    }

    pub fn search_button() -> CandidateChain {
        CandidateChain::new("search button")
            .xpath("//button[@id='hsw_search_button']")
            .xpath("//button[text()='SEARCH']")
            .xpath("//button[contains(text(), 'SEARCH')]")
    }

    /// Dismiss the login bottom sheet if it is showing
    pub async fn close_login_popup(&self) -> Result<bool, FlowError> {
        let closed = self
            .exec
            .tap_optional(&Self::login_popup_close(), self.exec.settings().presence_probe)
            .await?;
        if closed {
            info!("Closed login popup");
        }
        Ok(closed)
    }

    pub async fn tap_hotels_tab(&self) -> Result<(), FlowError> {
        info!("Attempting to tap Hotels tab");
        self.exec.tap(&Self::hotels_tab(), self.budget).await
    }

    pub async fn click_search_field(&self) -> Result<(), FlowError> {
        info!("Attempting to click search field");
        self.exec.tap(&Self::search_field(), self.budget).await
    }

    pub async fn enter_search_text(&self, text: &str) -> Result<(), FlowError> {
        info!("Attempting to enter search text: {}", text);
        self.exec
            .type_text(&Self::search_input(), text, self.budget, EntryPolicy::Required)
            .await
            .map(|_| ())
    }

    pub async fn select_first_suggestion(&self) -> Result<(), FlowError> {
        info!("Attempting to select first suggestion");
        self.exec.tap(&Self::first_suggestion(), self.budget).await
    }

    pub async fn select_tomorrow_date(&self) -> Result<(), FlowError> {
        info!("Attempting to select tomorrow's date");
        self.exec.tap(&Self::tomorrow_date(), self.budget).await
    }

    pub async fn tap_search_button(&self) -> Result<(), FlowError> {
        info!("Attempting to tap search button");
        self.exec.tap(&Self::search_button(), self.budget).await
    }
}

/// Results listing shown after a search
pub struct SearchResultsPage<'a, 'd, D: Driver> {
    exec: &'a InteractionExecutor<'d, D>,
    budget: Duration,
}

impl<'a, 'd, D: Driver> SearchResultsPage<'a, 'd, D> {
    pub fn new(exec: &'a InteractionExecutor<'d, D>) -> Self {
        Self {
            exec,
            budget: exec.settings().resolve_budget,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = budget;
        self
    }

    pub fn app_banner_dismiss() -> CandidateChain {
        CandidateChain::new("continue in browser")
            .xpath("//a[text()='Continue in Browser']")
            .with(Locator::link_text("Continue in Browser"))
    }

    pub fn result_mentioning(text: &str) -> CandidateChain {
        let literal = xpath_literal(text);
        CandidateChain::new(format!("result for {}", text))
            .xpath(format!("//p[contains(text(),{})]", literal))
            .xpath(format!("//span[contains(text(),{})]", literal))
    }

    /// Dismiss the "open in app" banner if present
    pub async fn close_popup(&self) -> Result<bool, FlowError> {
        self.exec
            .tap_optional(&Self::app_banner_dismiss(), self.exec.settings().presence_probe)
            .await
    }

    /// Text of the first result mentioning `text`, `None` when there is none
    pub async fn results_for(&self, text: &str) -> Result<Option<String>, FlowError> {
        info!("Attempting to get search results for: {}", text);
        match self.exec.read_text(&Self::result_mentioning(text), self.budget).await {
            Ok(found) => {
                info!("Search results found for: {}", text);
                Ok(Some(found))
            }
            Err(FlowError::NotFound { .. }) => {
                warn!("No search results found for: {}", text);
                Ok(None)
            }
            Err(err) => Err(err),
        }
    }
}

/// What a hotel search run achieved
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchReport {
    pub city: String,
    /// The city was typed and a suggestion picked
    pub city_entered: bool,
    pub date_selected: bool,
    pub result_text: Option<String>,
    pub url: String,
    pub title: String,
}

/// Keep going after a failed optional step; fatal errors still abort
fn best_effort(step: &str, result: Result<(), FlowError>) -> Result<bool, FlowError> {
    match result {
        Ok(()) => Ok(true),
        Err(err @ (FlowError::Driver(_) | FlowError::Session(_))) => Err(err),
        Err(err) => {
            warn!("{} skipped: {}", step, err);
            Ok(false)
        }
    }
}

/// Search hotels for a city on an already opened home page.
///
/// Entering the city and picking a date degrade gracefully, since the site
/// sometimes opens with a nearby search prefilled. Opening the hotels tab
/// and starting the search are required.
pub async fn hotel_search<D: Driver>(
    exec: &InteractionExecutor<'_, D>,
    city: &str,
) -> Result<SearchReport, FlowError> {
    info!("=== Starting hotel search for {} ===", city);
    exec.ensure_web_context().await;
    exec.wait_for_page_load(exec.settings().page_load).await?;

    let home = HomePage::new(exec);
    home.close_login_popup().await?;
    home.tap_hotels_tab().await?;

    let city_entered = best_effort("City search", async {
        home.click_search_field().await?;
        home.enter_search_text(city).await?;
        home.select_first_suggestion().await
    }
    .await)?;

    let date_selected = best_effort("Date selection", home.select_tomorrow_date().await)?;

    home.tap_search_button().await?;

    let results = SearchResultsPage::new(exec);
    results.close_popup().await?;
    let result_text = results.results_for(city).await?;

    let driver = exec.driver();
    let url = driver.current_url().await?;
    let title = driver.title().await?;
    info!("Search finished on {} ({})", url, title);

    Ok(SearchReport {
        city: city.to_string(),
        city_entered,
        date_selected,
        result_text,
        url,
        title,
    })
}

#[cfg(test)]
#[path = "pages_test.rs"]
mod pages_test;
