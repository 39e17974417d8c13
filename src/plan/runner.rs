use crate::actions::{Action, ActionExecutor, ActionResult};
use crate::core::{BrowserTrait, Config};
use crate::utils::ScreenshotArtifact;
use crate::vision::VisionFallback;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{error, info, warn};

/// Outcome of one plan run. Built once and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanExecutionReport {
    pub success: bool,
    pub results: Vec<ActionResult>,
    pub screenshots: Vec<ScreenshotArtifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PlanExecutionReport {
    /// A run that failed before any action was dispatched.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            results: Vec::new(),
            screenshots: Vec::new(),
            error: Some(error.into()),
        }
    }
}

/// Runs a plan's actions in order against a borrowed page.
///
/// Stops at the first failing action and keeps what was collected so far.
/// The page is left open; tearing it down is the caller's job.
pub struct PlanRunner<'a> {
    browser: &'a dyn BrowserTrait,
    fallback: &'a VisionFallback,
    config: &'a Config,
}

impl<'a> PlanRunner<'a> {
    pub fn new(browser: &'a dyn BrowserTrait, fallback: &'a VisionFallback, config: &'a Config) -> Self {
        Self {
            browser,
            fallback,
            config,
        }
    }

    pub async fn run(&self, actions: &[Action]) -> PlanExecutionReport {
        self.run_with_progress(actions, None).await
    }

    /// Like `run`, additionally sending each completed result to `progress`.
    pub async fn run_with_progress(
        &self,
        actions: &[Action],
        progress: Option<&UnboundedSender<ActionResult>>,
    ) -> PlanExecutionReport {
        let mut executor = ActionExecutor::new(self.browser, self.fallback, self.config);
        let mut results = Vec::with_capacity(actions.len());
        let mut failure = None;
        let delay = Duration::from_millis(self.config.execution.inter_action_delay_ms);

        for (i, action) in actions.iter().enumerate() {
            info!(
                "Executing action {}/{}: {} (Type: {})",
                i + 1,
                actions.len(),
                action.description,
                action.kind
            );

            match executor.execute(action).await {
                Ok(result) => {
                    if let Some(progress) = progress {
                        if progress.send(result.clone()).is_err() {
                            warn!("Progress listener went away");
                        }
                    }
                    results.push(result);
                    info!("Action {} completed", i + 1);
                }
                Err(e) => {
                    error!("Error executing plan at action {}: {}", i + 1, e);
                    failure = Some(e.to_string());
                    break;
                }
            }

            if i + 1 < actions.len() {
                tokio::time::sleep(delay).await;
            }
        }

        if failure.is_none() {
            info!("All actions in plan completed");
        }

        PlanExecutionReport {
            success: failure.is_none(),
            results,
            screenshots: executor.into_screenshots(),
            error: failure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionKind;
    use crate::testing::{MockBrowser, MockVision};
    use std::sync::Arc;

    fn setup() -> (VisionFallback, Config) {
        let mut config = Config::default();
        config.screenshots.output_dir = None;
        (
            VisionFallback::new(Arc::new(MockVision::answering(["A blank page"]))),
            config,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn stops_at_first_failure_and_keeps_prefix() {
        let browser = MockBrowser::new().with_element("#ok");
        let (fallback, config) = setup();
        let actions = vec![
            Action::navigate("https://example.test/"),
            Action::click(Some("#ok"), "Click ok"),
            Action::new(ActionKind::Unknown("hover".into()), "Hover"),
            Action::navigate("https://never.test/"),
            Action::screenshot("never"),
        ];

        let report = PlanRunner::new(&browser, &fallback, &config).run(&actions).await;

        assert!(!report.success);
        assert_eq!(report.results.len(), 2);
        assert!(!report.error.unwrap_or_default().is_empty());
        assert_eq!(browser.navigations().len(), 1);
        assert!(browser.screenshots_taken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn progress_sees_every_completed_step() {
        let browser = MockBrowser::new();
        let (fallback, config) = setup();
        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
        let actions = vec![Action::navigate("https://example.test/"), Action::wait(10)];

        let report = PlanRunner::new(&browser, &fallback, &config)
            .run_with_progress(&actions, Some(&tx))
            .await;
        drop(tx);

        let mut streamed = Vec::new();
        while let Some(result) = rx.recv().await {
            streamed.push(result);
        }
        assert!(report.success);
        assert_eq!(streamed, report.results);
    }

    #[tokio::test(start_paused = true)]
    async fn pauses_between_actions() {
        let browser = MockBrowser::new();
        let (fallback, config) = setup();
        let started = tokio::time::Instant::now();

        let report = PlanRunner::new(&browser, &fallback, &config)
            .run(&[Action::wait(0), Action::wait(0), Action::wait(0)])
            .await;

        assert!(report.success);
        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(600) && elapsed < Duration::from_millis(700));
    }

    #[test]
    fn report_serializes_camel_case_without_empty_error() {
        let report = PlanExecutionReport {
            success: true,
            results: vec![],
            screenshots: vec![],
            error: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"success": true, "results": [], "screenshots": []})
        );
    }
}
