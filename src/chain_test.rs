// Unit tests for candidate chains

use super::*;
use crate::driver::DriverError;
use crate::wait::{Attempt, Located};
use pretty_assertions::assert_eq;
use std::time::Duration;

fn timed_out(locator: &Locator) -> WaitOutcome<u32> {
    WaitOutcome::TimedOut(vec![Attempt {
        locator: locator.clone(),
        elapsed: Duration::from_millis(10),
    }])
}

fn chain_of(n: usize) -> CandidateChain {
    (1..=n).fold(CandidateChain::new("target"), |chain, i| {
        chain.xpath(format!("//div[@id='c{}']", i))
    })
}

#[tokio::test]
async fn test_kth_candidate_consults_exactly_k() {
    for k in 1..=5 {
        let chain = chain_of(5);
        let winner = Locator::xpath(format!("//div[@id='c{}']", k));
        let mut consulted = Vec::new();

        let outcome = chain
            .resolve_first(async |locator: &Locator| {
                consulted.push(locator.clone());
                if *locator == winner {
                    WaitOutcome::Found(Located {
                        element: 7,
                        locator: locator.clone(),
                    })
                } else {
                    timed_out(locator)
                }
            })
            .await;

        assert_eq!(consulted, chain.candidates()[..k].to_vec());
        let located = outcome.found().expect("k-th candidate should win");
        assert_eq!(located.locator, winner);
        assert_eq!(located.element, 7);
    }
}

#[tokio::test]
async fn test_empty_chain_never_calls_resolver() {
    let chain = CandidateChain::new("nothing");
    let mut calls = 0;

    let outcome: WaitOutcome<u32> = chain
        .resolve_first(async |_: &Locator| {
            calls += 1;
            WaitOutcome::TimedOut(Vec::new())
        })
        .await;

    assert_eq!(calls, 0);
    assert!(matches!(outcome, WaitOutcome::TimedOut(ref a) if a.is_empty()));
}

#[tokio::test]
async fn test_exhausted_chain_aggregates_attempts() {
    let chain = chain_of(3);

    let outcome = chain.resolve_first(async |locator: &Locator| timed_out(locator)).await;

    let tried: Vec<Locator> = outcome.attempts().iter().map(|a| a.locator.clone()).collect();
    assert_eq!(tried, chain.candidates().to_vec());
}

#[tokio::test]
async fn test_fatal_error_stops_chain() {
    let chain = chain_of(4);
    let mut calls = 0;

    let outcome: WaitOutcome<u32> = chain
        .resolve_first(async |_: &Locator| {
            calls += 1;
            WaitOutcome::Error(DriverError::Transport("session deleted".into()))
        })
        .await;

    assert_eq!(calls, 1);
    assert!(matches!(outcome, WaitOutcome::Error(_)));
}

#[test]
fn test_builder_preserves_order() {
    let chain = CandidateChain::new("hotels tab")
        .xpath("//a[@data-cy='menu_item_clicked_1']")
        .css("li.menu_Hotels a")
        .id("hotels")
        .by(LocatorStrategy::LinkText, "Hotels");

    assert_eq!(chain.target(), "hotels tab");
    assert_eq!(chain.len(), 4);
    assert!(!chain.is_empty());
    assert_eq!(chain.candidates()[0].strategy, LocatorStrategy::XPath);
    assert_eq!(chain.candidates()[1].strategy, LocatorStrategy::CssSelector);
    assert_eq!(chain.candidates()[2].strategy, LocatorStrategy::Id);
    assert_eq!(chain.candidates()[3], Locator::link_text("Hotels"));
}

#[test]
fn test_display_lists_candidates() {
    let chain = CandidateChain::single("search", Locator::id("hsw_search_button"));
    assert_eq!(chain.to_string(), "search [id='hsw_search_button']");
}
