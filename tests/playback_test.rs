// Playback scenarios driven through the public API against the in-process browser

mod common;
use common::{SIGNUP, WELCOME, click, navigation, shop};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use webreplay::delta::Delta;
use webreplay::simulated::{HostCall, SimulatedBrowser};
use webreplay::store::{ActionStore, MemoryStore};
use webreplay::types::{Action, ActionKind, ChangeValue, TabId};
use webreplay::{Locator, PlaybackConfig, PlaybackStatus, Player};

fn type_into_b(text: &str, caret: usize) -> Action {
    Action::new(
        ActionKind::Input {
            tag_name: "input".into(),
            element_id: Some("B".into()),
            class_name: None,
            delta: Delta::Insertion(text.into()),
            cursor_position: caret,
        },
        Some(Locator::by_id("B")),
        40.0,
        SIGNUP,
    )
}

fn tick_newsletter() -> Action {
    Action::new(
        ActionKind::Change {
            tag_name: "input".into(),
            element_type: Some("checkbox".into()),
            value: ChangeValue::Checked(true),
        },
        Some(Locator::by_id("news")),
        55.0,
        SIGNUP,
    )
}

#[tokio::test(start_paused = true)]
async fn test_click_type_navigate_completes() {
    let browser = shop();
    let mut player = Player::new(browser.clone(), PlaybackConfig::default());

    let actions = [click("A", SIGNUP), type_into_b("hi", 2), navigation(WELCOME, SIGNUP)];
    let report = player.play(&actions).await;

    assert_eq!(report.status, PlaybackStatus::Complete);
    assert_eq!(report.message, None);
    assert!(report.steps.iter().all(|s| s.ok && s.attempts == 1));

    let tab = TabId::from("tab-1");
    assert_eq!(
        browser.calls(),
        vec![
            HostCall::Create { url: SIGNUP.into() },
            HostCall::Update {
                tab: tab.clone(),
                url: WELCOME.into()
            },
        ]
    );
    let doc = browser.document(&tab).unwrap();
    assert_eq!(doc.lock().unwrap().url(), WELCOME);

    let kinds: Vec<_> = browser.traces().iter().map(|t| t.kind).collect();
    assert_eq!(kinds, vec!["click", "input", "navigation"]);
}

#[tokio::test(start_paused = true)]
async fn test_typed_value_and_checkbox_land_in_page() {
    let browser = shop();
    let mut player = Player::new(browser.clone(), PlaybackConfig::default());

    let actions = [type_into_b("hi", 2), type_into_b(" there", 8), tick_newsletter()];
    let report = player.play(&actions).await;
    assert!(report.is_complete());

    let doc = browser.document(&TabId::from("tab-1")).unwrap();
    let doc = doc.lock().unwrap();
    let field = doc.by_id("B").unwrap();
    assert_eq!(doc.value(field), "hi there");
    assert_eq!(doc.selection(field), 8);
    assert!(doc.checked(doc.by_id("news").unwrap()));
}

#[tokio::test(start_paused = true)]
async fn test_missing_element_is_retried_then_skipped() {
    let browser = shop();
    let mut player = Player::new(browser.clone(), PlaybackConfig::default());

    let actions = [click("ghost", SIGNUP), click("A", SIGNUP)];
    let report = player.play(&actions).await;

    // Skipped steps do not fail the run
    assert_eq!(report.status, PlaybackStatus::Complete);
    assert_eq!(report.message.as_deref(), Some("1 of 2 steps failed"));
    let failed: Vec<_> = report.failed_steps().collect();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].index, 0);
    assert_eq!(failed[0].attempts, 3);
    assert!(failed[0].error.as_deref().unwrap().contains("#ghost"));

    let outcomes: Vec<_> = browser.traces().iter().map(|t| t.ok).collect();
    assert_eq!(outcomes, vec![false, false, false, true]);
}

#[tokio::test(start_paused = true)]
async fn test_steps_never_overlap() {
    let browser = Arc::new(
        SimulatedBrowser::new()
            .with_page(SIGNUP, common::signup_page)
            .with_agent_latency(Duration::from_millis(800)),
    );
    let mut player = Player::new(browser.clone(), PlaybackConfig::default());

    let actions = [click("A", SIGNUP), type_into_b("x", 1), tick_newsletter()];
    let report = player.play(&actions).await;
    assert!(report.is_complete());

    let traces = browser.traces();
    assert_eq!(traces.len(), 3);
    for pair in traces.windows(2) {
        assert!(pair[0].finished <= pair[1].started, "step overlap: {:?}", pair);
        // Settle delay separates consecutive dispatches
        assert!(pair[1].started - pair[0].finished >= Duration::from_millis(500));
    }
}

#[tokio::test(start_paused = true)]
async fn test_unprovisionable_tab_fails_run() {
    let browser = shop();
    browser.reject_creates(true);
    let mut player = Player::new(browser.clone(), PlaybackConfig::default());

    let report = player.play(&[click("A", SIGNUP)]).await;
    assert_eq!(report.status, PlaybackStatus::Error);
    assert_eq!(report.exit_code, Some(4));
    assert!(report.steps.is_empty());
    assert!(browser.traces().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_unreadable_store_fails_run() {
    let store = MemoryStore::with_actions(vec![click("A", SIGNUP)]);
    store.set_unavailable(true);
    let mut player = Player::new(shop(), PlaybackConfig::default());

    let report = player.play_from_store(&store).await;
    assert_eq!(report.status, PlaybackStatus::Error);
    assert_eq!(report.exit_code, Some(6));
    store.set_unavailable(false);
    assert_eq!(store.actions().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_empty_store_completes_immediately() {
    let browser = shop();
    let mut player = Player::new(browser.clone(), PlaybackConfig::default());

    let report = player.play_from_store(&MemoryStore::new()).await;
    assert!(report.is_complete());
    assert_eq!(report.message.as_deref(), Some("No actions to play"));
    assert!(browser.calls().is_empty());
}
