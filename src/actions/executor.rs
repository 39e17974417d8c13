use crate::actions::click::ClickRunner;
use crate::actions::intent::ClickIntent;
use crate::actions::model::{Action, ActionKind, ActionPayload, ActionResult};
use crate::browser::navigation::NavigationManager;
use crate::core::{BrowserTrait, Config};
use crate::dom::{extract_matching, page_summary};
use crate::errors::{BrowserError, Result};
use crate::types::ExtractedData;
use crate::utils::{ScreenshotArtifact, ScreenshotManager};
use crate::vision::fallback::capitalize;
use crate::vision::{failure_context, VisionFallback, UNAVAILABLE_DIAGNOSIS};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Dispatches actions against one live page.
///
/// The only state carried between dispatches is the page itself and the
/// append-only list of screenshots taken so far.
pub struct ActionExecutor<'a> {
    browser: &'a dyn BrowserTrait,
    fallback: &'a VisionFallback,
    config: &'a Config,
    screenshots: Vec<ScreenshotArtifact>,
}

impl<'a> ActionExecutor<'a> {
    pub fn new(browser: &'a dyn BrowserTrait, fallback: &'a VisionFallback, config: &'a Config) -> Self {
        Self {
            browser,
            fallback,
            config,
            screenshots: Vec::new(),
        }
    }

    pub fn screenshots(&self) -> &[ScreenshotArtifact] {
        &self.screenshots
    }

    pub fn into_screenshots(self) -> Vec<ScreenshotArtifact> {
        self.screenshots
    }

    pub async fn execute(&mut self, action: &Action) -> Result<ActionResult> {
        debug!("Executing {} action: {}", action.kind, action.description);

        let payload = match &action.kind {
            ActionKind::Navigate => self.navigate(action).await?,
            ActionKind::Click => self.click(action).await?,
            ActionKind::Type => self.type_text(action).await?,
            ActionKind::Wait => self.wait(action).await,
            ActionKind::Scroll => self.scroll(action).await?,
            ActionKind::Screenshot => self.screenshot(action).await?,
            ActionKind::Extract => self.extract(action).await?,
            ActionKind::Unknown(kind) => {
                return Err(BrowserError::InvalidAction(format!(
                    "Unknown action type: {}",
                    kind
                )))
            }
        };

        Ok(ActionResult::new(action, payload))
    }

    fn timeout_for(&self, action: &Action) -> u64 {
        action
            .timeout_ms
            .unwrap_or(self.config.execution.default_action_timeout_ms)
    }

    async fn navigate(&self, action: &Action) -> Result<ActionPayload> {
        let url = action.locator().ok_or_else(|| {
            BrowserError::InvalidAction("Navigate action requires a target URL".to_string())
        })?;

        let navigation = &self.config.navigation;
        let result = NavigationManager::navigate_with_retry(
            self.browser,
            url,
            navigation.max_attempts,
            navigation,
        )
        .await?;

        Ok(ActionPayload::Navigated { url: result.url })
    }

    async fn click(&mut self, action: &Action) -> Result<ActionPayload> {
        let intent = action
            .intent
            .clone()
            .or_else(|| ClickIntent::classify(&action.description, action.locator()))
            .ok_or_else(|| {
                BrowserError::InvalidAction(
                    "Click action requires a target selector or a search result description"
                        .to_string(),
                )
            })?;
        if intent.needs_locator() && action.locator().is_none() {
            return Err(BrowserError::InvalidAction(
                "Direct click requires a target selector".to_string(),
            ));
        }
        debug!("Click intent for \"{}\": {:?}", action.description, intent);

        let runner = ClickRunner::new(self.browser, self.fallback, &self.config.execution);
        match runner.run(action, &intent, self.timeout_for(action)).await {
            Ok(payload) => Ok(payload),
            Err(e) if e.is_session_failure() || e.is_validation() => Err(e),
            Err(e) => Err(self.diagnose_failure(action, e).await),
        }
    }

    async fn type_text(&mut self, action: &Action) -> Result<ActionPayload> {
        let (Some(locator), Some(value)) = (action.locator(), action.value.as_deref()) else {
            return Err(BrowserError::InvalidAction(
                "Type action requires target selector and value".to_string(),
            ));
        };

        info!("Typing \"{}\" into \"{}\"", value, locator);
        let typed = async {
            self.browser
                .wait_for_selector(locator, self.timeout_for(action))
                .await?;
            self.browser.fill(locator, value).await
        }
        .await;

        match typed {
            Ok(()) => Ok(ActionPayload::Typed {
                typed: value.to_string(),
                into: locator.to_string(),
            }),
            Err(e) if e.is_session_failure() => Err(e),
            Err(e) => Err(self.diagnose_failure(action, e).await),
        }
    }

    async fn wait(&self, action: &Action) -> ActionPayload {
        let waited = action
            .timeout_ms
            .unwrap_or(self.config.execution.default_wait_ms);
        debug!("Waiting for {}ms", waited);
        tokio::time::sleep(Duration::from_millis(waited)).await;
        ActionPayload::Waited { waited }
    }

    /// Scroll the target into view, or the viewport down when it is missing.
    async fn scroll(&self, action: &Action) -> Result<ActionPayload> {
        let target = action.locator().unwrap_or("body");

        let into_view = match self.browser.scroll_into_view(target).await {
            Ok(found) => found,
            Err(e) if e.is_session_failure() => return Err(e),
            Err(e) => {
                warn!("Could not scroll {} into view: {}", target, e);
                false
            }
        };

        if !into_view {
            match self
                .browser
                .scroll_by(self.config.execution.scroll_offset_px)
                .await
            {
                Err(e) if e.is_session_failure() => return Err(e),
                Err(e) => warn!("Viewport scroll failed: {}", e),
                Ok(()) => {}
            }
        }

        Ok(ActionPayload::Scrolled {
            scrolled: target.to_string(),
            into_view,
        })
    }

    async fn screenshot(&mut self, action: &Action) -> Result<ActionPayload> {
        info!(
            "Taking screenshot. Description: {}",
            action.description
        );
        let artifact = ScreenshotManager::capture(
            self.browser,
            &action.description,
            self.config.screenshots.output_dir.as_deref(),
        )
        .await?;

        let payload = ActionPayload::Screenshot {
            path: artifact.storage_path.clone(),
            timestamp_ms: artifact.timestamp_ms,
            url: artifact.url.clone(),
            title: artifact.title.clone(),
        };
        self.screenshots.push(artifact);
        Ok(payload)
    }

    async fn extract(&self, action: &Action) -> Result<ActionPayload> {
        debug!(
            "Extracting data. Target: \"{}\"",
            action.locator().unwrap_or("page info")
        );
        let html = self.browser.content().await?;

        let extracted = match action.locator() {
            Some(selector) => ExtractedData::Elements(extract_matching(&html, selector)?),
            None => {
                let url = self.browser.url().await?;
                let title = self.browser.title().await?;
                ExtractedData::Page(page_summary(
                    &html,
                    &url,
                    &title,
                    self.config.execution.extract_text_limit,
                ))
            }
        };

        Ok(ActionPayload::Extracted { extracted })
    }

    /// Capture the page as it looks after `error` and fold a vision
    /// diagnosis into the returned step failure.
    async fn diagnose_failure(&mut self, action: &Action, error: BrowserError) -> BrowserError {
        warn!(
            "{} action failed for \"{}\": {}",
            action.kind, action.description, error
        );

        let capture = ScreenshotManager::capture(
            self.browser,
            &format!("Failure: {}", action.description),
            self.config.screenshots.output_dir.as_deref(),
        )
        .await;

        let diagnosis = match capture {
            Ok(artifact) => {
                let diagnosis = self
                    .fallback
                    .diagnose(&artifact.viewport_image, &failure_context(action, &error))
                    .await;
                self.screenshots.push(artifact);
                diagnosis
            }
            Err(e) => {
                warn!("Failure screenshot unavailable: {}", e);
                UNAVAILABLE_DIAGNOSIS.to_string()
            }
        };

        BrowserError::StepFailed {
            kind: capitalize(action.kind.as_str()),
            message: error.to_string(),
            diagnosis,
        }
    }
}
