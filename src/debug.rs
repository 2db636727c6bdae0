//! Page diagnostics for working out locators when resolution fails

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::driver::{Driver, DriverResult};
use crate::locator::{Locator, StrategyToken};

const COMMON_ATTRIBUTES: [&str; 8] = ["id", "class", "name", "type", "value", "placeholder", "data-cy", "href"];

/// Queries for elements a user could plausibly click
const CLICKABLE_QUERIES: [(StrategyToken, &str); 4] = [
    (StrategyToken::TagName, "button"),
    (StrategyToken::TagName, "a"),
    (StrategyToken::CssSelector, "input[type=\"submit\"]"),
    (StrategyToken::CssSelector, "input[type=\"button\"]"),
];

/// Text and class values are cut to this many characters in listings
const MAX_FIELD_LEN: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElementDescription {
    pub locator: Locator,
    pub tag: String,
    pub text: String,
    pub visible: bool,
    pub enabled: bool,
    /// Only attributes with a non-empty value
    pub attributes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickableElement {
    pub tag: String,
    pub text: String,
    pub class: Option<String>,
    pub id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContextInfo {
    pub available: Vec<String>,
    pub current: Option<String>,
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_FIELD_LEN).collect()
}

/// Describe the first element matching `locator`; `None` when absent
pub async fn describe_element<D: Driver>(
    driver: &D,
    locator: &Locator,
) -> DriverResult<Option<ElementDescription>> {
    let Some(element) = driver.find_element(locator.token(), &locator.value).await? else {
        warn!("Element not found: {}", locator);
        return Ok(None);
    };

    let mut attributes = BTreeMap::new();
    for name in COMMON_ATTRIBUTES {
        if let Some(value) = driver.attribute(&element, name).await?
            && !value.is_empty()
        {
            attributes.insert(name.to_string(), value);
        }
    }

    let description = ElementDescription {
        locator: locator.clone(),
        tag: driver.tag_name(&element).await?,
        text: driver.text(&element).await?,
        visible: driver.is_displayed(&element).await?,
        enabled: driver.is_enabled(&element).await?,
        attributes,
    };
    info!(
        "Element found with {}: tag={} visible={} enabled={}",
        locator, description.tag, description.visible, description.enabled
    );
    Ok(Some(description))
}

/// Visible, enabled buttons, links and submit inputs, at most `limit`.
///
/// Elements that go stale while being inspected are skipped.
pub async fn clickable_elements<D: Driver>(driver: &D, limit: usize) -> DriverResult<Vec<ClickableElement>> {
    let mut found = Vec::new();

    'queries: for (token, query) in CLICKABLE_QUERIES {
        for element in driver.find_elements(token, query).await? {
            if found.len() >= limit {
                break 'queries;
            }
            match describe_clickable(driver, &element).await {
                Ok(Some(clickable)) => found.push(clickable),
                Ok(None) => {}
                Err(err) if err.is_fatal() => return Err(err),
                Err(_) => continue,
            }
        }
    }

    info!("Found {} clickable elements", found.len());
    Ok(found)
}

async fn describe_clickable<D: Driver>(
    driver: &D,
    element: &D::Element,
) -> DriverResult<Option<ClickableElement>> {
    if !(driver.is_displayed(element).await? && driver.is_enabled(element).await?) {
        return Ok(None);
    }

    let mut text = driver.text(element).await?;
    if text.is_empty() {
        text = driver.attribute(element, "value").await?.unwrap_or_default();
    }
    Ok(Some(ClickableElement {
        tag: driver.tag_name(element).await?,
        text: truncate(&text),
        class: driver
            .attribute(element, "class")
            .await?
            .map(|class| truncate(&class)),
        id: driver.attribute(element, "id").await?,
    }))
}

/// Available and current contexts. Sessions without context support
/// report an empty list.
pub async fn context_info<D: Driver>(driver: &D) -> ContextInfo {
    let available = match driver.contexts().await {
        Ok(contexts) => contexts,
        Err(err) => {
            warn!("Context listing not available: {}", err);
            Vec::new()
        }
    };
    let current = driver.current_context().await.ok();
    ContextInfo { available, current }
}

/// Save the current page source for offline inspection; returns its size in bytes
pub async fn save_page_source<D: Driver>(driver: &D, path: &Path) -> Result<usize> {
    let source = driver.page_source().await?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    fs::write(path, &source)
        .with_context(|| format!("Failed to write page source to {}", path.display()))?;
    info!("Page source saved to: {}", path.display());
    Ok(source.len())
}

#[cfg(test)]
#[path = "debug_test.rs"]
mod debug_test;
