/// Scroll loop against an in-memory directory: termination, speed, retries, stop latency.
mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use common::{email_of, fast_tuning, init_logger, name_of, pinned_speed, FakeDirectory, FakeRow};
use contact_scout::core::config::ScrollTuning;
use contact_scout::core::types::{RunState, StopReason};
use contact_scout::harvest::status::MemoryStatusSink;
use contact_scout::harvest::{RunControl, RunFeed, RunSession, ScrollController};
use contact_scout::scraping::interceptor::ingest_response;

fn controller(
    page: &Arc<FakeDirectory>,
    tuning: &ScrollTuning,
) -> (ScrollController<FakeDirectory>, Arc<MemoryStatusSink>, RunControl) {
    let status = Arc::new(MemoryStatusSink::new());
    let control = RunControl::new();
    let ctrl = ScrollController::new(Arc::clone(page), tuning.clone(), status.clone(), control.clone());
    (ctrl, status, control)
}

#[tokio::test]
async fn test_exhaustion_collects_everything_then_stops_scrolling() {
    init_logger();
    // 100 rows of 50px, 10 visible; 500px per scroll = exactly one screen.
    let page = Arc::new(FakeDirectory::new(100, 50, 10));
    let tuning = pinned_speed(500);
    let (ctrl, status, control) = controller(&page, &tuning);

    let session = ctrl.run(RunSession::new(&tuning)).await;

    assert_eq!(session.state, RunState::Stopped(StopReason::Exhausted));
    assert!(!control.is_running());
    assert_eq!(session.total(), 100);

    let results = session.results();
    for (i, record) in results.iter().enumerate() {
        assert_eq!(record.email(), email_of(i));
        assert_eq!(record.name(), name_of(i));
    }

    // 10 productive passes, then 5 empty ones; the fifth ends the run before scrolling.
    assert_eq!(page.list_calls(), 15);
    assert_eq!(session.scroll.total_scrolls, 14);
    assert_eq!(session.scroll.successful_scrolls, 9);
    // 9 moves on the first strategy, 5 bottomed-out attempts trying all four.
    assert_eq!(page.scroll_calls(), 9 + 5 * 4);

    let messages = status.messages();
    assert_eq!(messages.first().map(String::as_str), Some("Starting contact extraction..."));
    assert!(messages.iter().any(|m| m == "No new contacts found. Attempt 5/5"));
    assert!(messages
        .iter()
        .any(|m| m == "No new contacts found after 5 attempts. Stopping..."));
    assert_eq!(
        messages.last().map(String::as_str),
        Some("✅ Finished (no more contacts to load). 100 contacts collected")
    );
}

#[tokio::test]
async fn test_max_scroll_attempts_ceiling() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(30, 50, 30).stuck());
    let tuning = ScrollTuning {
        max_scroll_attempts: 3,
        exhaustion_threshold: 10,
        ..fast_tuning()
    };
    let (ctrl, status, _control) = controller(&page, &tuning);

    let session = ctrl.run(RunSession::new(&tuning)).await;

    assert_eq!(session.state, RunState::Stopped(StopReason::MaxAttempts));
    assert_eq!(session.total(), 30);
    assert_eq!(session.scroll.attempts_since_progress, 3);
    assert_eq!(session.scroll.successful_scrolls, 0);
    assert_eq!(page.list_calls(), 3);

    let messages = status.messages();
    assert!(messages.iter().any(|m| m == "Failed to scroll. Attempt 3/3"));
    assert!(messages.iter().any(|m| m == "Max scroll attempts reached. Stopping..."));
}

#[tokio::test]
async fn test_persistent_failure_ends_in_error_after_retries() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(20, 50, 10));
    page.fail_next_lists(4);
    let tuning = fast_tuning();
    let (ctrl, status, control) = controller(&page, &tuning);

    let session = ctrl.run(RunSession::new(&tuning)).await;

    assert!(matches!(session.state, RunState::Stopped(StopReason::Error(_))));
    assert!(!control.is_running());
    assert_eq!(session.total(), 0);
    // First attempt plus three retries.
    assert_eq!(page.list_calls(), 4);
    assert_eq!(page.scroll_calls(), 0);

    let retries = status
        .messages()
        .iter()
        .filter(|m| *m == "Error occurred. Retrying...")
        .count();
    assert_eq!(retries, 3);
    assert!(status.messages().last().is_some_and(|m| m.starts_with("❌ Error:")));
}

#[tokio::test]
async fn test_missing_container_ends_in_error() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(20, 50, 10).without_container());
    let tuning = fast_tuning();
    let (ctrl, _status, _control) = controller(&page, &tuning);

    let session = ctrl.run(RunSession::new(&tuning)).await;

    match session.state {
        RunState::Stopped(StopReason::Error(msg)) => assert!(msg.contains(".fake-container")),
        other => panic!("unexpected state {:?}", other),
    }
    assert_eq!(page.list_calls(), 0);
}

#[tokio::test]
async fn test_single_failure_is_retried() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(40, 50, 10));
    page.fail_next_lists(1);
    let tuning = pinned_speed(500);
    let (ctrl, status, _control) = controller(&page, &tuning);

    let session = ctrl.run(RunSession::new(&tuning)).await;

    assert_eq!(session.state, RunState::Stopped(StopReason::Exhausted));
    assert_eq!(session.total(), 40);
    let retries = status
        .messages()
        .iter()
        .filter(|m| *m == "Error occurred. Retrying...")
        .count();
    assert_eq!(retries, 1);
}

#[tokio::test]
async fn test_target_yield_freezes_speed_for_the_rest_of_the_run() {
    init_logger();
    // 20 visible rows per pass is above the 14-per-scroll target.
    let page = Arc::new(FakeDirectory::new(200, 50, 20));
    let tuning = fast_tuning();
    let (ctrl, status, _control) = controller(&page, &tuning);

    let session = ctrl.run(RunSession::new(&tuning)).await;

    assert_eq!(session.state, RunState::Stopped(StopReason::Exhausted));
    assert!(session.scroll.optimal_speed_found);
    // Empty passes and failed scrolls at the bottom leave the frozen speed alone.
    assert_eq!(session.scroll.current_speed, 5_000);
    assert!(status
        .messages()
        .iter()
        .any(|m| m == "Optimal scroll speed found: 5000px"));
    assert!(!status.messages().iter().any(|m| m.starts_with("Decreasing")));
}

#[tokio::test]
async fn test_inverted_speed_range_still_reaches_a_terminal_state() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(30, 50, 10));
    let tuning: ScrollTuning = serde_json::from_str::<ScrollTuning>(r#"{ "min_speed": 25000 }"#)
        .unwrap()
        .without_delays();
    assert!(tuning.validate().is_err());
    let (ctrl, _status, _control) = controller(&page, &tuning);

    let session = tokio::spawn(ctrl.run(RunSession::new(&tuning)))
        .await
        .expect("run task must not panic");

    assert_eq!(session.state, RunState::Stopped(StopReason::Exhausted));
    assert_eq!(session.scroll.current_speed, 25_000);
    // First screen, then the bottom screen after one clamped jump.
    assert_eq!(session.total(), 20);
}

#[tokio::test]
async fn test_partial_yield_accelerates() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(1_000, 50, 10));
    let tuning = ScrollTuning {
        exhaustion_threshold: 1,
        ..fast_tuning()
    };
    let (ctrl, _status, _control) = controller(&page, &tuning);

    let session = ctrl.run(RunSession::new(&tuning)).await;

    assert!(!session.scroll.optimal_speed_found);
    assert!(session.scroll.current_speed > tuning.initial_speed);
}

#[tokio::test]
async fn test_stop_during_scroll_finishes_iteration_then_halts() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(100, 50, 10));
    let tuning = pinned_speed(500);
    let (ctrl, status, control) = controller(&page, &tuning);

    let stopper = control.clone();
    page.on_scroll(move |n| {
        if n == 1 {
            stopper.stop();
        }
    });

    let session = ctrl.run(RunSession::new(&tuning)).await;

    assert_eq!(session.state, RunState::Stopped(StopReason::User));
    // The pass in flight completes; nothing is extracted afterwards.
    assert_eq!(page.list_calls(), 1);
    assert_eq!(session.total(), 10);
    assert_eq!(session.scroll.successful_scrolls, 1);
    assert!(status.messages().last().is_some_and(|m| m.contains("stopped by user")));
}

#[tokio::test]
async fn test_stop_interrupts_long_iteration_delay() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(100, 50, 10));
    let tuning = ScrollTuning {
        iteration_delay_ms: 60_000,
        ..pinned_speed(500)
    };
    let (ctrl, _status, control) = controller(&page, &tuning);

    let task = tokio::spawn(ctrl.run(RunSession::new(&tuning)));
    while page.list_calls() == 0 {
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert!(control.stop());

    let session = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("run should stop promptly")
        .expect("run task panicked");

    assert_eq!(session.state, RunState::Stopped(StopReason::User));
    assert_eq!(page.list_calls(), 1);
}

#[tokio::test]
async fn test_network_and_dom_contacts_share_one_ordered_store() {
    init_logger();
    let page = Arc::new(FakeDirectory::new(30, 50, 10));
    let tuning = pinned_speed(500);
    let (ctrl, _status, control) = controller(&page, &tuning);
    let session = RunSession::new(&tuning);

    let feed = RunFeed {
        store: Arc::clone(&session.store),
        control: control.clone(),
    };
    page.on_scroll(move |n| {
        if n == 1 {
            let body = json!({
                "people": [
                    { "displayName": "Net Only - - (NX1)", "email": "net@corp.io" },
                    { "name": "Someone Else", "email": email_of(0) }
                ]
            });
            assert_eq!(ingest_response(&feed, &body), 1);
        }
    });

    let session = ctrl.run(session).await;

    let results = session.results();
    assert_eq!(results.len(), 31);
    assert_eq!(results[9].email(), email_of(9));
    assert_eq!(results[10].email(), "net@corp.io");
    assert_eq!(results[10].name(), "Net Only");
    assert_eq!(results[11].email(), email_of(10));
    // First sighting wins.
    assert_eq!(results[0].name(), name_of(0));
}

#[tokio::test]
async fn test_rows_without_email_are_skipped() {
    init_logger();
    let rows = vec![
        FakeRow { email: Some("a@corp.io".into()), raw_name: "Ann".into() },
        FakeRow { email: None, raw_name: "Group".into() },
        FakeRow { email: Some("   ".into()), raw_name: "Blank".into() },
        FakeRow { email: Some("a@corp.io".into()), raw_name: "Ann Again".into() },
        FakeRow { email: Some("b@corp.io".into()), raw_name: "".into() },
    ];
    let page = Arc::new(FakeDirectory::with_rows(rows, 50, 5));
    let tuning = fast_tuning();
    let (ctrl, _status, _control) = controller(&page, &tuning);

    let session = ctrl.run(RunSession::new(&tuning)).await;

    let results = session.results();
    assert_eq!(results.len(), 2);
    assert_eq!((results[0].name(), results[0].email()), ("Ann", "a@corp.io"));
    assert_eq!((results[1].name(), results[1].email()), ("", "b@corp.io"));
}
