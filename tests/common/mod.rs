// Common test utilities and fixtures

use hotelprobe::WaitSettings;
use hotelprobe::simulated::{SimElement, SimulatedDriver};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Locators the hotel site currently serves
pub mod site {
    pub const HOTELS_TAB: &str = "//a[@data-cy='menu_item_clicked_1']";
    pub const LOGIN_CLOSE: &str = "//span[@data-cy='loginBottomsheetCrossClick']";
    pub const SEARCH_FIELD: &str = "(//button[text()='Near me']/parent::div/preceding-sibling::div/span)[2]";
    pub const SEARCH_INPUT: &str = "//input[@id='autoSuggestWidget']";
    pub const SUGGESTION: &str = "//ul[@id='ui-id-1']/li[1]";
    pub const TOMORROW: &str =
        "//td[contains(@class, 'DayPicker-Day') and not(contains(@class, 'disabled'))][2]";
    pub const SEARCH_BUTTON: &str = "//button[@id='hsw_search_button']";
    pub const CONTINUE_IN_BROWSER: &str = "//a[text()='Continue in Browser']";
}

/// Short budgets so failing paths stay cheap on the paused clock
#[allow(dead_code)]
pub fn fast_settings() -> WaitSettings {
    WaitSettings {
        resolve_budget: Duration::from_secs(2),
        presence_probe: Duration::from_secs(1),
        ..WaitSettings::default()
    }
}

/// The hotel site on a slow device: popups, late suggestions and a
/// search button hidden behind a loading overlay
#[allow(dead_code)]
pub fn slow_hotel_site(city: &str) -> SimulatedDriver {
    let ms = Duration::from_millis;
    SimulatedDriver::new()
        .with_contexts(&["NATIVE_APP", "WEBVIEW_chrome"], "NATIVE_APP")
        .ready_after(ms(1500))
        .with_page(
            "https://www.makemytrip.com/hotels/hotel-listing/?city=CTBLR",
            "MakeMyTrip Hotels",
        )
        .with_element(SimElement::xpath(site::LOGIN_CLOSE).appears_after(ms(800)))
        .with_element(SimElement::xpath(site::HOTELS_TAB).appears_after(ms(300)))
        .with_element(SimElement::xpath(site::SEARCH_FIELD).tag("span"))
        .with_element(SimElement::xpath(site::SEARCH_INPUT).tag("input"))
        .with_element(SimElement::xpath(site::SUGGESTION).appears_after(ms(2500)))
        .with_element(SimElement::xpath(site::TOMORROW).tag("td"))
        .with_element(
            SimElement::xpath(site::SEARCH_BUTTON)
                .tag("button")
                .covered_until(ms(6000)),
        )
        .with_element(SimElement::xpath(site::CONTINUE_IN_BROWSER).appears_after(ms(9000)))
        .with_element(
            SimElement::xpath(&format!("//p[contains(text(),'{}')]", city))
                .text(&format!("Hotels in {}", city))
                .appears_after(ms(10_000)),
        )
}

/// Config directory with a config file and a capabilities file
#[allow(dead_code)]
pub fn config_dir(server_url: &str) -> TempDir {
    let dir = TempDir::new().expect("Failed to create temp dir");
    write_config(dir.path(), server_url, "https://www.makemytrip.com/");
    dir
}

#[allow(dead_code)]
pub fn write_config(dir: &Path, server_url: &str, base_url: &str) {
    let caps_dir = dir.join("capabilities");
    fs::create_dir_all(&caps_dir).expect("Failed to create capabilities dir");
    fs::write(
        caps_dir.join("android_chrome.yaml"),
        "platformName: Android\nbrowserName: Chrome\nappium:automationName: UiAutomator2\n",
    )
    .expect("Failed to write capabilities");
    fs::write(
        dir.join("config.yaml"),
        format!(
            "webdriver:\n  server_url: {}\n  capabilities_dir: {}\nurl:\n  base_url: {}\nlogging:\n  directory: {}\n",
            server_url,
            caps_dir.display(),
            base_url,
            dir.join("logs").display()
        ),
    )
    .expect("Failed to write config");
}
