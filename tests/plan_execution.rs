use browser_autopilot::actions::{Action, ActionKind, ActionPayload};
use browser_autopilot::testing::{MockBrowser, MockLauncher, MockVision};
use browser_autopilot::{Config, PlanRunner, SessionManager, VisionFallback};
use std::sync::Arc;
use tokio_test::assert_ok;

fn config() -> Config {
    let mut config = Config::default();
    config.screenshots.output_dir = None;
    config
}

fn manager(launcher: Arc<MockLauncher>, diagnosis: &str) -> SessionManager {
    SessionManager::new(
        launcher,
        Arc::new(MockVision::answering([diagnosis])),
        config(),
    )
}

#[tokio::test(start_paused = true)]
async fn navigate_then_screenshot() {
    let launcher = Arc::new(MockLauncher::new(|| {
        MockBrowser::new().with_title("Example Domain")
    }));
    let manager = manager(launcher.clone(), "unused");

    let report = manager
        .execute(
            &[
                Action::navigate("https://example.test"),
                Action::screenshot("Landing page"),
            ],
            true,
        )
        .await;

    assert!(report.success, "{:?}", report.error);
    assert_eq!(report.results.len(), 2);
    assert_eq!(report.screenshots.len(), 1);
    assert_eq!(
        report.results[0].payload,
        ActionPayload::Navigated {
            url: "https://example.test".to_string()
        }
    );
    assert_eq!(report.screenshots[0].url, "https://example.test");
    assert_eq!(report.screenshots[0].title, "Example Domain");
    assert!(launcher.launched()[0].is_closed());
}

#[tokio::test(start_paused = true)]
async fn missing_click_target_fails_with_diagnosis_and_screenshot() {
    let launcher = Arc::new(MockLauncher::new(MockBrowser::new));
    let manager = manager(launcher.clone(), "A consent dialog covers the page");

    let report = manager
        .execute(&[Action::click(Some("#missing"), "click the button")], true)
        .await;

    assert!(!report.success);
    assert!(report.results.is_empty());
    let error = report.error.unwrap();
    assert!(error.starts_with("Click failed:"), "{}", error);
    assert!(error.contains("AI Analysis: A consent dialog covers the page"));
    assert!(!report.screenshots.is_empty());
    assert!(launcher.launched()[0].is_closed());
}

#[tokio::test(start_paused = true)]
async fn failing_third_action_stops_the_plan() {
    let browser = MockBrowser::new().with_element("#next");
    let fallback = VisionFallback::new(Arc::new(MockVision::answering(["n/a"])));
    let config = config();

    let actions = vec![
        Action::navigate("https://example.test/"),
        Action::click(Some("#next"), "Go to next page"),
        Action::type_text("#search", "never typed").with_timeout(1000),
        Action::navigate("https://example.test/after"),
        Action::screenshot("After"),
    ];
    let report = PlanRunner::new(&browser, &fallback, &config)
        .run(&actions)
        .await;

    assert!(!report.success);
    assert_eq!(report.results.len(), 2);
    assert!(!report.error.unwrap_or_default().is_empty());
    // only the failure screenshot, and no navigation past action 3
    assert_eq!(report.screenshots.len(), 1);
    assert_eq!(report.screenshots[0].description, "Failure: Type \"never typed\"");
    assert_eq!(browser.navigations().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn each_screenshot_appears_once_in_capture_order() {
    let browser = MockBrowser::new();
    let fallback = VisionFallback::new(Arc::new(MockVision::answering(["n/a"])));
    let config = config();

    let report = PlanRunner::new(&browser, &fallback, &config)
        .run(&[
            Action::screenshot("one"),
            Action::wait(50),
            Action::screenshot("two"),
            Action::screenshot("three"),
        ])
        .await;

    let order: Vec<_> = report
        .screenshots
        .iter()
        .map(|s| s.description.as_str())
        .collect();
    assert_eq!(order, vec!["one", "two", "three"]);
}

#[tokio::test(start_paused = true)]
async fn untrusted_plan_json_is_validated_at_dispatch() {
    let raw = r##"[
        {"type": "navigate", "target": "https://example.test/", "description": "Open"},
        {"type": "drag", "target": "#a", "description": "Drag it"}
    ]"##;
    let actions: Vec<Action> = serde_json::from_str(raw).unwrap();
    assert_eq!(actions[1].kind, ActionKind::Unknown("drag".to_string()));

    let browser = MockBrowser::new();
    let fallback = VisionFallback::new(Arc::new(MockVision::answering(["n/a"])));
    let config = config();
    let report = PlanRunner::new(&browser, &fallback, &config)
        .run(&actions)
        .await;

    assert_eq!(report.results.len(), 1);
    assert_eq!(
        report.error.as_deref(),
        Some("Invalid action: Unknown action type: drag")
    );
}

#[tokio::test]
async fn closing_twice_leaves_nothing_behind() {
    let launcher = Arc::new(MockLauncher::new(MockBrowser::new));
    let manager = manager(launcher.clone(), "unused");

    assert_ok!(manager.initialize(true).await);
    manager.close().await;
    manager.close().await;

    assert!(!manager.is_active().await);
    assert_eq!(launcher.launched()[0].close_calls(), 1);
    // a fresh session can be opened once the old one is gone
    assert_ok!(manager.initialize(true).await);
    assert!(manager.initialize(true).await.is_err());
    manager.close().await;
}
