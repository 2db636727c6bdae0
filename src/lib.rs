//! # hotelprobe
#![allow(clippy::uninlined_format_args)]
//!
//! Element resolution and wait engine for WebDriver/Appium UI automation,
//! with page objects for a hotel search flow.
//!
//! Pages change their markup between releases and render late on slow
//! devices. hotelprobe copes with both: every logical target is a chain of
//! alternative locators, and every lookup runs a staged wait (primary wait,
//! presence fallback, manual polling with a recovery scroll) under one
//! caller-supplied budget.
//!
//! ## CLI Usage
//!
//! ```bash
//! # Run the hotel search flow against the configured Appium server
//! hotelprobe search --city Bangalore
//!
//! # Use another capabilities file from configs/capabilities/
//! hotelprobe search --city Goa --capabilities pixel_chrome.yaml
//!
//! # Try a single locator and report how long it took to resolve
//! hotelprobe locate --strategy xpath --locator "//button[@id='hsw_search_button']" \
//!     --mode clickable --timeout 10 --url https://www.makemytrip.com/
//!
//! # Describe an element (tag, text, visibility, common attributes)
//! hotelprobe inspect --strategy id --locator autoSuggestWidget
//!
//! # Also save the page source
//! hotelprobe inspect --strategy id --locator city --source page_source_debug.html
//! ```
//!
//! Logs go to stderr and to `logs/app_logs/test_run.log`; set `RUST_LOG`
//! to change the level (`RUST_LOG=hotelprobe=debug`). Errors are printed
//! as JSON on stdout and mapped to exit codes:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 1 | Other error |
//! | 2 | Element not found |
//! | 3 | Interaction failed after retries |
//! | 4 | WebDriver session failure |
//! | 5 | Configuration error |
//!
//! ## Configuration
//!
//! `./configs/config.yaml`, then `~/.hotelprobe/config.yaml`:
//!
//! ```yaml
//! webdriver:
//!   server_url: http://127.0.0.1:4723
//!   default_capabilities_file: android_chrome.yaml
//! url:
//!   base_url: https://www.makemytrip.com/
//! timeouts:
//!   resolve_secs: 20
//!   poll_interval_ms: 500
//!   page_load_secs: 30
//!   # Reload the page and wait once more before giving up (off when unset)
//!   refresh_fallback_secs: 10
//! screenshot:
//!   directory: screenshots
//!   filename_format: screenshot_{timestamp}.png
//! ```
//!
//! ## Library Usage
//!
//! ```no_run
//! use hotelprobe::{CandidateChain, Config, DriverManager, InteractionExecutor};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::load_default()?;
//! let manager = DriverManager::from_config(&config, None)?;
//!
//! manager
//!     .with_session(async |session| {
//!         let exec = InteractionExecutor::new(session, config.wait_settings());
//!         let search = CandidateChain::new("search button")
//!             .xpath("//button[@id='hsw_search_button']")
//!             .xpath("//button[text()='SEARCH']");
//!         exec.tap(&search, config.wait_settings().resolve_budget).await?;
//!         Ok(())
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

/// Failure screenshots
pub mod artifacts;

/// Ordered fallback locators for one target
pub mod chain;

/// YAML configuration
pub mod config;

/// Page diagnostics
pub mod debug;

/// The remote driver boundary
pub mod driver;

/// Error taxonomy and exit codes
pub mod errors;

/// Taps, typing and reads with retries
pub mod interaction;

/// Locator strategies and their wire tokens
pub mod locator;

/// Hotel search page objects
pub mod pages;

/// fantoccini-backed sessions
pub mod session;

/// Scripted in-memory driver for tests
#[cfg(any(test, feature = "test-util"))]
pub mod simulated;

/// Staged element resolution
pub mod wait;

pub use chain::CandidateChain;
pub use config::{Config, ConfigError};
pub use driver::{Driver, DriverError, DriverResult};
pub use errors::{FlowError, exit_code_for};
pub use interaction::{EntryPolicy, InteractionExecutor};
pub use locator::{Locator, LocatorStrategy, StrategyToken, translate};
pub use pages::{HomePage, SearchReport, SearchResultsPage, hotel_search};
pub use session::{Capabilities, DriverManager, WebDriverSession};
pub use wait::{ElementResolver, Located, WaitMode, WaitOutcome, WaitSettings};
