use crate::actions::{Action, ActionResult};
use crate::browser::chrome::ChromeLauncher;
use crate::browser::navigation::{NavigationManager, NavigationResult};
use crate::core::{BrowserLauncher, BrowserTrait, Config, Planner, VisionTrait};
use crate::dom::page_summary;
use crate::errors::{BrowserError, Result};
use crate::plan::runner::{PlanExecutionReport, PlanRunner};
use crate::types::PageSummary;
use crate::utils::ScreenshotManager;
use crate::vision::{GeminiVision, VisionFallback};
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedSender;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Body text kept by `current_page_info`.
const PAGE_INFO_TEXT_CHARS: usize = 2000;

/// Owns the single live browser session.
///
/// Plans are serialized through a run lock, so at most one plan drives the
/// page at a time. Every run ends with `close`, whatever its outcome.
pub struct SessionManager {
    launcher: Arc<dyn BrowserLauncher>,
    fallback: VisionFallback,
    config: Config,
    active: Mutex<Option<Arc<dyn BrowserTrait>>>,
    run_lock: Mutex<()>,
}

impl SessionManager {
    pub fn new(
        launcher: Arc<dyn BrowserLauncher>,
        vision: Arc<dyn VisionTrait>,
        config: Config,
    ) -> Self {
        Self {
            launcher,
            fallback: VisionFallback::new(vision),
            config,
            active: Mutex::new(None),
            run_lock: Mutex::new(()),
        }
    }

    /// Chromium plus Gemini vision, both taken from `config`.
    pub fn with_chrome(config: Config) -> Result<Self> {
        let vision = GeminiVision::from_config(&config.vision)?;
        if !vision.is_configured() {
            warn!("No Gemini API key configured; failure diagnoses will be unavailable");
        }
        Ok(Self::new(
            Arc::new(ChromeLauncher),
            Arc::new(vision),
            config,
        ))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub async fn is_active(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Launch a browser and make it the active session.
    ///
    /// Fails with `SessionBusy` if a session is already open.
    pub async fn initialize(&self, headless: bool) -> Result<Arc<dyn BrowserTrait>> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(BrowserError::SessionBusy);
        }

        let mut browser_config = self.config.browser.clone();
        browser_config.headless = headless;
        info!("Initializing browser (headless: {})", headless);

        let browser = self.launcher.launch(&browser_config).await?;
        *active = Some(Arc::clone(&browser));
        Ok(browser)
    }

    /// Close the active session, if any. Safe to call repeatedly.
    ///
    /// Returns whether a session was open. Errors while closing are logged,
    /// never returned.
    pub async fn close(&self) -> bool {
        let Some(browser) = self.active.lock().await.take() else {
            debug!("No active browser session to close");
            return false;
        };

        match browser.close().await {
            Ok(()) => info!("Browser session closed"),
            Err(e) => warn!("Error while closing browser session: {}", e),
        }
        true
    }

    async fn active_browser(&self) -> Result<Arc<dyn BrowserTrait>> {
        self.active
            .lock()
            .await
            .clone()
            .ok_or_else(|| BrowserError::SessionUnavailable("Page not available".to_string()))
    }

    /// Navigate the active session with the configured escalating retries.
    pub async fn navigate(&self, url: &str) -> Result<NavigationResult> {
        let browser = self.active_browser().await?;
        NavigationManager::navigate_with_retry(
            browser.as_ref(),
            url,
            self.config.navigation.max_attempts,
            &self.config.navigation,
        )
        .await
    }

    /// URL, title and the first 2000 characters of body text of the active page.
    pub async fn current_page_info(&self) -> Result<PageSummary> {
        let browser = self.active_browser().await?;
        let html = browser.content().await?;
        let url = browser.url().await?;
        let title = browser.title().await?;
        Ok(page_summary(&html, &url, &title, PAGE_INFO_TEXT_CHARS))
    }

    /// Vision description of the active page. Degrades to a fixed message if
    /// the screenshot or the vision service fails.
    pub async fn analyze_current_page(&self, context: &str) -> Result<String> {
        let browser = self.active_browser().await?;
        Ok(self
            .fallback
            .analyze_current_page(browser.as_ref(), context)
            .await)
    }

    /// Ask `planner` for the next actions towards `goal`, given the active
    /// page's text and, when it can be taken, a full-page screenshot.
    pub async fn suggest_next_actions(
        &self,
        planner: &dyn Planner,
        goal: &str,
    ) -> Result<Vec<Action>> {
        let info = self.current_page_info().await?;
        let browser = self.active_browser().await?;
        let screenshot = match ScreenshotManager::take_base64(browser.as_ref(), true).await {
            Ok(image) => Some(image),
            Err(e) if e.is_session_failure() => return Err(e),
            Err(e) => {
                warn!("Suggesting without a screenshot: {}", e);
                None
            }
        };
        planner
            .suggest_next(&info.text, goal, screenshot.as_deref())
            .await
    }

    /// Run `actions` in a fresh session, waiting for any in-flight plan to
    /// finish first.
    pub async fn execute(&self, actions: &[Action], headless: bool) -> PlanExecutionReport {
        self.execute_with_progress(actions, headless, None).await
    }

    /// Like `execute`, but refuses to queue behind a running plan.
    pub async fn try_execute(
        &self,
        actions: &[Action],
        headless: bool,
    ) -> Result<PlanExecutionReport> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| BrowserError::SessionBusy)?;
        Ok(self.run_locked(actions, headless, None).await)
    }

    pub async fn execute_with_progress(
        &self,
        actions: &[Action],
        headless: bool,
        progress: Option<&UnboundedSender<ActionResult>>,
    ) -> PlanExecutionReport {
        let _guard = self.run_lock.lock().await;
        self.run_locked(actions, headless, progress).await
    }

    async fn run_locked(
        &self,
        actions: &[Action],
        headless: bool,
        progress: Option<&UnboundedSender<ActionResult>>,
    ) -> PlanExecutionReport {
        let browser = match self.initialize(headless).await {
            Ok(browser) => browser,
            Err(e) => {
                error!("Failed to initialize browser: {}", e);
                // a busy manager holds someone else's session
                if !matches!(e, BrowserError::SessionBusy) {
                    self.close().await;
                }
                return PlanExecutionReport::failed(format!(
                    "Failed to initialize browser: {}",
                    e
                ));
            }
        };

        let mut teardown = Teardown::new(self);
        let report = PlanRunner::new(browser.as_ref(), &self.fallback, &self.config)
            .run_with_progress(actions, progress)
            .await;
        teardown.disarm();

        self.close().await;
        report
    }
}

/// Closes the session in the background if a run is dropped before it
/// reaches its own `close`, e.g. when the driving task is aborted.
struct Teardown<'a> {
    manager: &'a SessionManager,
    armed: bool,
}

impl<'a> Teardown<'a> {
    fn new(manager: &'a SessionManager) -> Self {
        Self {
            manager,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for Teardown<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let Ok(mut active) = self.manager.active.try_lock() else {
            return;
        };
        let Some(browser) = active.take() else {
            return;
        };
        warn!("Plan run abandoned; closing browser session");
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                if let Err(e) = browser.close().await {
                    warn!("Error while closing abandoned session: {}", e);
                }
            });
        }
    }
}
