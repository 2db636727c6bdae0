// End-to-end hotel search against a scripted slow device
use hotelprobe::simulated::{SimEvent, SimulatedDriver};
use hotelprobe::{FlowError, InteractionExecutor, WaitSettings, hotel_search};
use pretty_assertions::assert_eq;
use tokio::time::Instant;

mod common;
use common::{fast_settings, site, slow_hotel_site};

fn clicks(driver: &SimulatedDriver) -> Vec<String> {
    driver
        .events()
        .into_iter()
        .filter_map(|e| match e {
            SimEvent::Click(name) => Some(name),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_search_on_slow_device() {
    let driver = slow_hotel_site("Bangalore");
    let exec = InteractionExecutor::new(&driver, WaitSettings::default());

    let report = hotel_search(&exec, "Bangalore").await.unwrap();

    assert!(report.city_entered);
    assert!(report.date_selected);
    assert_eq!(report.result_text.as_deref(), Some("Hotels in Bangalore"));
    assert!(report.url.to_lowercase().contains("hotels"));
    assert_eq!(driver.current_context_name(), "WEBVIEW_chrome");
    assert_eq!(
        clicks(&driver),
        vec![
            site::LOGIN_CLOSE,
            site::HOTELS_TAB,
            site::SEARCH_FIELD,
            site::SUGGESTION,
            site::TOMORROW,
            site::SEARCH_BUTTON,
            site::CONTINUE_IN_BROWSER,
        ]
    );
    // The overlay was waited out, never clicked through
    assert_eq!(driver.count(|e| matches!(e, SimEvent::ScriptClick(_))), 0);
}

#[tokio::test(start_paused = true)]
async fn test_search_completes_within_worst_case_budget() {
    let driver = slow_hotel_site("Goa");
    let exec = InteractionExecutor::new(&driver, WaitSettings::default());

    let started = Instant::now();
    hotel_search(&exec, "Goa").await.unwrap();

    // Every target resolves on its first candidate well inside its budget
    assert!(started.elapsed().as_secs() < 15, "took {:?}", started.elapsed());
}

#[tokio::test(start_paused = true)]
async fn test_session_loss_aborts_search() {
    let driver = slow_hotel_site("Bangalore");
    driver.fail_finds_with(hotelprobe::DriverError::Transport("invalid session id".into()));
    let exec = InteractionExecutor::new(&driver, fast_settings());

    let err = hotel_search(&exec, "Bangalore").await.unwrap_err();

    assert!(matches!(err, FlowError::Driver(_)));
    assert_eq!(err.exit_code(), 4);
    assert!(clicks(&driver).is_empty());
}
