// Unit tests for the wait engine, run on a paused tokio clock

use super::*;
use crate::simulated::{SimElement, SimEvent, SimulatedDriver};
use pretty_assertions::assert_eq;

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

#[test]
fn test_stage_budgets_from_default_budget() {
    let settings = WaitSettings::default();
    let stages = StageBudgets::derive(settings.resolve_budget, &settings);
    assert_eq!(stages.primary, Duration::from_secs(20));
    assert_eq!(stages.presence, Duration::from_secs(5));
    assert_eq!(stages.polling, Duration::from_secs(5));
    assert_eq!(stages.total(), Duration::from_secs(30));
}

#[test]
fn test_stage_budgets_are_capped() {
    let settings = WaitSettings::default();
    let stages = StageBudgets::derive(Duration::from_secs(100), &settings);
    assert_eq!(stages.presence, settings.presence_fallback);
    assert_eq!(stages.polling, settings.polling_cap);

    let short = StageBudgets::derive(ms(1000), &settings);
    assert_eq!(short.presence, ms(250));
    assert_eq!(short.polling, ms(250));
}

#[test]
fn test_stage_budgets_saturate_for_huge_budget() {
    let settings = WaitSettings::default();
    let stages = StageBudgets::derive(Duration::MAX, &settings);
    assert_eq!(stages.presence, settings.presence_fallback);
    assert_eq!(stages.total(), Duration::MAX);
}

#[test]
fn test_stage_budgets_include_refresh_stage() {
    let settings = WaitSettings {
        refresh_fallback: Some(Duration::from_secs(3)),
        ..WaitSettings::default()
    };
    let stages = StageBudgets::derive(ms(1000), &settings);
    assert_eq!(stages.refresh, Some(Duration::from_secs(3)));
    assert_eq!(stages.total(), ms(1000 + 250 + 250) + REFRESH_SETTLE + Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn test_huge_budget_does_not_overflow_deadline() {
    let driver = SimulatedDriver::new().with_element(SimElement::css("#city").appears_after(ms(1500)));
    let resolver = ElementResolver::new(&driver, WaitSettings::default());

    let outcome = resolver
        .locate(&Locator::css("#city"), Duration::from_secs(u64::MAX), WaitMode::VisibleOnly)
        .await;
    assert!(outcome.is_found());

    let gone = resolver
        .wait_for_disappear(&Locator::css("#absent"), Duration::MAX)
        .await
        .unwrap();
    assert!(gone);
    assert!(resolver.wait_for_page_ready(Duration::MAX).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_visible_element_found_immediately() {
    let driver = SimulatedDriver::new().with_element(SimElement::xpath("//h1").text("Hotels"));
    let resolver = ElementResolver::new(&driver, WaitSettings::default());

    let started = Instant::now();
    let outcome = resolver
        .locate(&Locator::xpath("//h1"), ms(1000), WaitMode::VisibleOnly)
        .await;

    let located = outcome.found().expect("element should be found");
    assert_eq!(located.locator, Locator::xpath("//h1"));
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn test_visible_only_never_returns_hidden_element() {
    let driver = SimulatedDriver::new().with_element(SimElement::css("#banner").hidden());
    let resolver = ElementResolver::new(&driver, WaitSettings::default());
    let locator = Locator::css("#banner");

    let outcome = resolver.locate(&locator, ms(1000), WaitMode::VisibleOnly).await;

    assert!(!outcome.is_found());
    assert_eq!(outcome.attempts().len(), 1);
    assert_eq!(outcome.attempts()[0].locator, locator);
    // Present-only accepts the same element
    let present = resolver.locate(&locator, ms(1000), WaitMode::PresentOnly).await;
    assert!(present.is_found());
}

#[tokio::test(start_paused = true)]
async fn test_clickable_at_end_of_primary_budget() {
    // Rendered immediately, overlay removed at 950ms of a 1000ms budget
    let driver = SimulatedDriver::new()
        .with_element(SimElement::xpath("//button[@id='hsw_search_button']").covered_until(ms(950)));
    let resolver = ElementResolver::new(&driver, WaitSettings::default());

    let started = Instant::now();
    let outcome = resolver
        .locate(
            &Locator::xpath("//button[@id='hsw_search_button']"),
            ms(1000),
            WaitMode::Clickable,
        )
        .await;

    assert!(outcome.is_found());
    assert!(started.elapsed() <= ms(1000));
}

#[tokio::test(start_paused = true)]
async fn test_clickable_falls_back_to_displayed_element() {
    let driver = SimulatedDriver::new().with_element(SimElement::css("button.search").disabled());
    let resolver = ElementResolver::new(&driver, WaitSettings::default());

    let started = Instant::now();
    let outcome = resolver
        .locate(&Locator::css("button.search"), ms(1000), WaitMode::Clickable)
        .await;

    // Primary expires, presence stage accepts the displayed element
    assert!(outcome.is_found());
    assert_eq!(started.elapsed(), ms(1000));
}

#[tokio::test(start_paused = true)]
async fn test_presence_stage_catches_late_element() {
    let driver = SimulatedDriver::new().with_element(SimElement::xpath("//p").appears_after(ms(1300)));
    let settings = WaitSettings {
        poll_interval: ms(100),
        ..WaitSettings::default()
    };
    let resolver = ElementResolver::new(&driver, settings);

    let started = Instant::now();
    let outcome = resolver.locate(&Locator::xpath("//p"), ms(1200), WaitMode::VisibleOnly).await;

    // primary covers 0..1200ms, presence 1200..1500ms
    assert!(outcome.is_found());
    assert_eq!(started.elapsed(), ms(1300));
}

#[tokio::test(start_paused = true)]
async fn test_manual_polling_finds_element_after_presence_stage() {
    // Attached at 1300ms but only displayed at 1550ms
    let driver = SimulatedDriver::new().with_element(
        SimElement::xpath("//p")
            .appears_after(ms(1300))
            .visible_after(ms(1550)),
    );
    let settings = WaitSettings {
        poll_interval: ms(100),
        recovery_every: 10,
        ..WaitSettings::default()
    };
    let resolver = ElementResolver::new(&driver, settings);

    let started = Instant::now();
    let outcome = resolver.locate(&Locator::xpath("//p"), ms(1200), WaitMode::VisibleOnly).await;

    // Presence stage sees it hidden at 1300ms and hands over to polling,
    // whose final check lands on its 1600ms deadline
    assert!(outcome.is_found());
    assert_eq!(started.elapsed(), ms(1600));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_waterfall_times_out_with_recovery() {
    let driver = SimulatedDriver::new();
    let resolver = ElementResolver::new(&driver, WaitSettings::default());
    let locator = Locator::xpath("//a[@id='missing']");
    let budget = Duration::from_secs(4);

    let started = Instant::now();
    let outcome = resolver.locate(&locator, budget, WaitMode::VisibleOnly).await;

    assert!(!outcome.is_found());
    let stages = StageBudgets::derive(budget, resolver.settings());
    assert_eq!(started.elapsed(), stages.total());
    // Polling stage: three misses in one second, one recovery scroll
    let recoveries = driver.count(|e| matches!(e, SimEvent::Script(s) if s.contains("scrollTo")));
    assert_eq!(recoveries, 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_stage_finds_element_after_reload() {
    let driver = SimulatedDriver::new().with_element(SimElement::xpath("//ul[@id='ui-id-1']/li[1]").after_refresh());
    let settings = WaitSettings {
        refresh_fallback: Some(Duration::from_secs(3)),
        ..WaitSettings::default()
    };
    let resolver = ElementResolver::new(&driver, settings);

    let started = Instant::now();
    let outcome = resolver
        .locate(&Locator::xpath("//ul[@id='ui-id-1']/li[1]"), ms(1000), WaitMode::Clickable)
        .await;

    // Stages end at 1500ms, then the reload settles for two seconds
    assert!(outcome.is_found());
    assert_eq!(started.elapsed(), ms(1500) + REFRESH_SETTLE);
    assert_eq!(driver.count(|e| matches!(e, SimEvent::Refresh)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_refresh_stage_bounded_and_off_by_default() {
    let locator = Locator::xpath("//a[@id='missing']");

    let driver = SimulatedDriver::new();
    let resolver = ElementResolver::new(&driver, WaitSettings::default());
    assert!(!resolver.locate(&locator, ms(1000), WaitMode::VisibleOnly).await.is_found());
    assert_eq!(driver.count(|e| matches!(e, SimEvent::Refresh)), 0);

    let driver = SimulatedDriver::new();
    let settings = WaitSettings {
        refresh_fallback: Some(Duration::from_secs(3)),
        ..WaitSettings::default()
    };
    let resolver = ElementResolver::new(&driver, settings);
    let started = Instant::now();
    let outcome = resolver.locate(&locator, ms(1000), WaitMode::VisibleOnly).await;

    assert!(matches!(outcome, WaitOutcome::TimedOut(_)));
    assert_eq!(started.elapsed(), StageBudgets::derive(ms(1000), resolver.settings()).total());
    assert_eq!(driver.count(|e| matches!(e, SimEvent::Refresh)), 1);
}

#[tokio::test(start_paused = true)]
async fn test_fatal_driver_error_stops_immediately() {
    let driver = SimulatedDriver::new();
    driver.fail_finds_with(DriverError::Transport("connection refused".into()));
    let resolver = ElementResolver::new(&driver, WaitSettings::default());

    let started = Instant::now();
    let outcome = resolver
        .locate(&Locator::id("autoSuggestWidget"), Duration::from_secs(20), WaitMode::VisibleOnly)
        .await;

    assert!(matches!(outcome, WaitOutcome::Error(DriverError::Transport(_))));
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert_eq!(driver.find_count(&Locator::id("autoSuggestWidget")), 1);
}

#[tokio::test(start_paused = true)]
async fn test_transient_driver_error_keeps_waiting() {
    let driver = SimulatedDriver::new();
    driver.fail_finds_with(DriverError::StaleElement("detached".into()));
    let resolver = ElementResolver::new(&driver, WaitSettings::default());

    let outcome = resolver
        .locate(&Locator::id("x"), ms(1000), WaitMode::VisibleOnly)
        .await;

    assert!(matches!(outcome, WaitOutcome::TimedOut(_)));
    assert!(driver.find_count(&Locator::id("x")) > 3);
}

#[tokio::test(start_paused = true)]
async fn test_chain_scenario_second_candidate_found() {
    let driver = SimulatedDriver::new()
        .with_element(SimElement::xpath("//a[@id='present']").appears_after(ms(200)));
    let resolver = ElementResolver::new(&driver, WaitSettings::default());
    let chain = CandidateChain::new("link")
        .xpath("//a[@id='missing']")
        .xpath("//a[@id='present']");

    let started = Instant::now();
    let outcome = resolver
        .locate_chain(&chain, ms(1000), WaitMode::VisibleOnly)
        .await;

    let located = outcome.found().expect("second candidate should resolve");
    assert_eq!(located.locator, Locator::xpath("//a[@id='present']"));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_disappear() {
    let driver = SimulatedDriver::new()
        .with_element(SimElement::css(".loader").removed_after(ms(1200)))
        .with_element(SimElement::css(".sticky"));
    let resolver = ElementResolver::new(&driver, WaitSettings::default());

    assert!(resolver.wait_for_disappear(&Locator::css(".loader"), ms(2000)).await.unwrap());
    assert!(!resolver.wait_for_disappear(&Locator::css(".sticky"), ms(1000)).await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_page_ready() {
    let driver = SimulatedDriver::new().ready_after(ms(700));
    let resolver = ElementResolver::new(&driver, WaitSettings::default());

    assert!(!resolver.wait_for_page_ready(ms(300)).await.unwrap());
    assert!(resolver.wait_for_page_ready(ms(1000)).await.unwrap());
}
