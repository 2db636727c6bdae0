//! Locator strategies and their translation to driver strategy tokens

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;

/// Abstract strategy used to identify an element on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    Id,
    #[serde(rename = "xpath")]
    XPath,
    CssSelector,
    ClassName,
    TagName,
    Name,
    LinkText,
    PartialLinkText,
    AccessibilityId,
}

impl LocatorStrategy {
    pub const ALL: [LocatorStrategy; 9] = [
        LocatorStrategy::Id,
        LocatorStrategy::XPath,
        LocatorStrategy::CssSelector,
        LocatorStrategy::ClassName,
        LocatorStrategy::TagName,
        LocatorStrategy::Name,
        LocatorStrategy::LinkText,
        LocatorStrategy::PartialLinkText,
        LocatorStrategy::AccessibilityId,
    ];

    /// Canonical lowercase tag
    pub fn tag(&self) -> &'static str {
        match self {
            LocatorStrategy::Id => "id",
            LocatorStrategy::XPath => "xpath",
            LocatorStrategy::CssSelector => "css_selector",
            LocatorStrategy::ClassName => "class_name",
            LocatorStrategy::TagName => "tag_name",
            LocatorStrategy::Name => "name",
            LocatorStrategy::LinkText => "link_text",
            LocatorStrategy::PartialLinkText => "partial_link_text",
            LocatorStrategy::AccessibilityId => "accessibility_id",
        }
    }

    /// Parse a strategy tag (case-insensitive).
    ///
    /// Unknown tags degrade to XPath instead of failing, so a misspelled tag
    /// still reaches the driver and shows up as a resolution miss.
    pub fn from_tag(tag: &str) -> Self {
        match Self::parse_known(tag) {
            Some(strategy) => strategy,
            None => {
                warn!(tag, "Unsupported locator strategy, falling back to xpath");
                LocatorStrategy::XPath
            }
        }
    }

    fn parse_known(tag: &str) -> Option<Self> {
        let normalized = tag.trim().to_lowercase().replace([' ', '-'], "_");
        let strategy = match normalized.as_str() {
            "id" => LocatorStrategy::Id,
            "xpath" => LocatorStrategy::XPath,
            "css_selector" | "css" => LocatorStrategy::CssSelector,
            "class_name" | "class" => LocatorStrategy::ClassName,
            "tag_name" | "tag" => LocatorStrategy::TagName,
            "name" => LocatorStrategy::Name,
            "link_text" => LocatorStrategy::LinkText,
            "partial_link_text" => LocatorStrategy::PartialLinkText,
            "accessibility_id" => LocatorStrategy::AccessibilityId,
            _ => return None,
        };
        Some(strategy)
    }

    /// Wire-level token for this strategy
    pub fn token(&self) -> StrategyToken {
        match self {
            LocatorStrategy::Id => StrategyToken::Id,
            LocatorStrategy::XPath => StrategyToken::XPath,
            LocatorStrategy::CssSelector => StrategyToken::CssSelector,
            LocatorStrategy::ClassName => StrategyToken::ClassName,
            LocatorStrategy::TagName => StrategyToken::TagName,
            LocatorStrategy::Name => StrategyToken::Name,
            LocatorStrategy::LinkText => StrategyToken::LinkText,
            LocatorStrategy::PartialLinkText => StrategyToken::PartialLinkText,
            LocatorStrategy::AccessibilityId => StrategyToken::AccessibilityId,
        }
    }
}

impl fmt::Display for LocatorStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl std::str::FromStr for LocatorStrategy {
    type Err = std::convert::Infallible;

    /// Never fails, unknown tags map to XPath
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(LocatorStrategy::from_tag(s))
    }
}

/// Strategy token as understood by the remote end (the W3C / Appium `using` value)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyToken {
    Id,
    XPath,
    CssSelector,
    ClassName,
    TagName,
    Name,
    LinkText,
    PartialLinkText,
    AccessibilityId,
}

impl StrategyToken {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyToken::Id => "id",
            StrategyToken::XPath => "xpath",
            StrategyToken::CssSelector => "css selector",
            StrategyToken::ClassName => "class name",
            StrategyToken::TagName => "tag name",
            StrategyToken::Name => "name",
            StrategyToken::LinkText => "link text",
            StrategyToken::PartialLinkText => "partial link text",
            StrategyToken::AccessibilityId => "accessibility id",
        }
    }
}

impl fmt::Display for StrategyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Translate a strategy tag to the driver's token, defaulting to xpath
pub fn translate(tag: &str) -> StrategyToken {
    LocatorStrategy::from_tag(tag).token()
}

/// Quote text for use as an XPath string literal
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{}'", value)
    } else if !value.contains('"') {
        format!("\"{}\"", value)
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{}'", p)).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

/// A (strategy, value) pair identifying an element
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    pub strategy: LocatorStrategy,
    pub value: String,
}

impl Locator {
    pub fn new(strategy: LocatorStrategy, value: impl Into<String>) -> Self {
        Self {
            strategy,
            value: value.into(),
        }
    }

    /// Build from a free-form strategy tag, e.g. from the command line
    pub fn from_tag(tag: &str, value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::from_tag(tag), value)
    }

    pub fn id(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Id, value)
    }

    pub fn xpath(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::XPath, value)
    }

    pub fn css(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::CssSelector, value)
    }

    pub fn class_name(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::ClassName, value)
    }

    pub fn name(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::Name, value)
    }

    pub fn link_text(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::LinkText, value)
    }

    pub fn accessibility_id(value: impl Into<String>) -> Self {
        Self::new(LocatorStrategy::AccessibilityId, value)
    }

    pub fn token(&self) -> StrategyToken {
        self.strategy.token()
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}='{}'", self.strategy, self.value)
    }
}

#[cfg(test)]
#[path = "locator_test.rs"]
mod locator_test;
