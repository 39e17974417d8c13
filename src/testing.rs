//! In-memory doubles for the browser, vision and launcher seams.
//!
//! These are compiled into the library so integration tests and downstream
//! crates can drive the executor without a Chromium install.

use crate::actions::{Action, AutomationPlan};
use crate::core::config::BrowserConfig;
use crate::core::{BrowserLauncher, BrowserTrait, Planner, VisionTrait, WaitUntil};
use crate::errors::{BrowserError, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

#[derive(Default)]
struct PageState {
    url: String,
    title: String,
    content: String,
    /// selector -> delay in ms before it attaches
    elements: HashMap<String, u64>,
    links: HashSet<String>,
    failing_clicks: HashSet<String>,
    click_navigations: HashMap<String, (String, String)>,
    failing_navigations: u32,
    crash_on_navigation: bool,
    navigations: Vec<(String, WaitUntil, u64)>,
    screenshots: Vec<bool>,
    calls: Vec<String>,
    closed: bool,
    close_calls: usize,
    failing_close: bool,
}

/// Scriptable page. Elements are registered up front, optionally with an
/// attach delay, and every interaction is logged to `calls()`.
pub struct MockBrowser {
    state: Mutex<PageState>,
}

impl Default for MockBrowser {
    fn default() -> Self {
        Self::new()
    }
}

impl MockBrowser {
    pub const FULL_PAGE_PNG: &'static [u8] = b"\x89PNG\r\n\x1a\nfull-page";
    pub const VIEWPORT_PNG: &'static [u8] = b"\x89PNG\r\n\x1a\nviewport";

    pub fn new() -> Self {
        Self {
            state: Mutex::new(PageState {
                url: "about:blank".to_string(),
                ..Default::default()
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, PageState> {
        // a panicking test thread must not cascade into unrelated assertions
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn live(&self) -> Result<MutexGuard<'_, PageState>> {
        let state = self.state();
        if state.closed {
            return Err(BrowserError::SessionUnavailable(
                "browser has been closed".to_string(),
            ));
        }
        Ok(state)
    }

    fn record(&self, call: String) -> Result<()> {
        self.live()?.calls.push(call);
        Ok(())
    }

    pub fn with_url(self, url: &str) -> Self {
        self.state().url = url.to_string();
        self
    }

    pub fn with_title(self, title: &str) -> Self {
        self.state().title = title.to_string();
        self
    }

    pub fn with_content(self, html: &str) -> Self {
        self.state().content = html.to_string();
        self
    }

    pub fn with_element(self, selector: &str) -> Self {
        self.with_element_after(selector, 0)
    }

    pub fn with_element_after(self, selector: &str, delay_ms: u64) -> Self {
        self.state().elements.insert(selector.to_string(), delay_ms);
        self
    }

    /// Register an `<a>` element.
    pub fn with_link(self, selector: &str) -> Self {
        self.state().links.insert(selector.to_string());
        self.with_element(selector)
    }

    /// Clicking `selector` moves the page to `url` with `title`.
    pub fn with_click_navigation(self, selector: &str, url: &str, title: &str) -> Self {
        self.state()
            .click_navigations
            .insert(selector.to_string(), (url.to_string(), title.to_string()));
        self
    }

    pub fn failing_click(self, selector: &str) -> Self {
        self.state().failing_clicks.insert(selector.to_string());
        self
    }

    /// The next `count` navigations time out.
    pub fn failing_navigations(self, count: u32) -> Self {
        self.state().failing_navigations = count;
        self
    }

    /// The browser process dies during the next navigation.
    pub fn crashing_navigation(self) -> Self {
        self.state().crash_on_navigation = true;
        self
    }

    pub fn failing_close(self) -> Self {
        self.state().failing_close = true;
        self
    }

    /// Simulate the browser process going away.
    pub fn crash(&self) {
        self.state().closed = true;
    }

    pub fn navigations(&self) -> Vec<(String, WaitUntil, u64)> {
        self.state().navigations.clone()
    }

    /// `true` for each full-page capture, `false` for each viewport capture.
    pub fn screenshots_taken(&self) -> Vec<bool> {
        self.state().screenshots.clone()
    }

    pub fn calls(&self) -> Vec<String> {
        self.state().calls.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn close_calls(&self) -> usize {
        self.state().close_calls
    }

    fn attach_delay(&self, selector: &str) -> Result<Option<u64>> {
        Ok(self.live()?.elements.get(selector).copied())
    }
}

#[async_trait]
impl BrowserTrait for MockBrowser {
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout_ms: u64) -> Result<()> {
        let mut state = self.live()?;
        state
            .navigations
            .push((url.to_string(), wait_until, timeout_ms));
        state.calls.push(format!("goto {}", url));
        if state.crash_on_navigation {
            state.closed = true;
            return Err(BrowserError::SessionUnavailable(
                "Unable to make method calls because underlying connection is closed".to_string(),
            ));
        }
        if state.failing_navigations > 0 {
            state.failing_navigations -= 1;
            return Err(BrowserError::NavigationFailed(format!(
                "Timeout {}ms exceeded on attempt {}",
                timeout_ms,
                state.navigations.len()
            )));
        }
        state.url = url.to_string();
        Ok(())
    }

    async fn wait_for_load_state(&self, state: WaitUntil, _timeout_ms: u64) -> Result<()> {
        self.record(format!("wait_for_load_state {}", state))
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        match self.attach_delay(selector)? {
            Some(delay) if delay <= timeout_ms => {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(())
            }
            _ => {
                tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
                Err(BrowserError::ElementNotFound(format!(
                    "{} not attached within {}ms",
                    selector, timeout_ms
                )))
            }
        }
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        Ok(self.attach_delay(selector)?.is_some())
    }

    async fn is_link(&self, selector: &str) -> Result<bool> {
        Ok(self.live()?.links.contains(selector))
    }

    async fn remove_target(&self, selector: &str) -> Result<()> {
        self.record(format!("remove_target {}", selector))
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let mut state = self.live()?;
        if !state.elements.contains_key(selector) || state.failing_clicks.contains(selector) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        state.calls.push(format!("click {}", selector));
        if let Some((url, title)) = state.click_navigations.get(selector).cloned() {
            state.url = url;
            state.title = title;
        }
        Ok(())
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        let mut state = self.live()?;
        if !state.elements.contains_key(selector) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        state.calls.push(format!("fill {}={}", selector, value));
        Ok(())
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        let mut state = self.live()?;
        if !state.elements.contains_key(selector) {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }
        state.calls.push(format!("focus {}", selector));
        Ok(())
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        self.record(format!("press {}", key))
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<bool> {
        let mut state = self.live()?;
        let found = state.elements.contains_key(selector);
        state.calls.push(format!("scroll_into_view {}", selector));
        Ok(found)
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        self.record(format!("scroll_by {}", dy))
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        self.live()?.screenshots.push(full_page);
        Ok(if full_page {
            Self::FULL_PAGE_PNG.to_vec()
        } else {
            Self::VIEWPORT_PNG.to_vec()
        })
    }

    async fn content(&self) -> Result<String> {
        Ok(self.live()?.content.clone())
    }

    async fn url(&self) -> Result<String> {
        Ok(self.live()?.url.clone())
    }

    async fn title(&self) -> Result<String> {
        Ok(self.live()?.title.clone())
    }

    async fn close(&self) -> Result<()> {
        let mut state = self.state();
        state.close_calls += 1;
        state.closed = true;
        if state.failing_close {
            return Err(BrowserError::ChromeError("process already gone".to_string()));
        }
        Ok(())
    }
}

/// Vision service that replays canned answers.
///
/// Answers are consumed in order; the last one repeats once the queue is
/// down to a single entry.
pub struct MockVision {
    answers: Mutex<VecDeque<String>>,
    fail: bool,
    prompts: Mutex<Vec<String>>,
}

impl MockVision {
    pub fn answering<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            answers: Mutex::new(VecDeque::new()),
            fail: true,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }
}

#[async_trait]
impl VisionTrait for MockVision {
    async fn analyze(&self, _image_base64: &str, prompt: &str) -> Result<String> {
        self.prompts
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(prompt.to_string());

        if self.fail {
            return Err(BrowserError::VisionFailed("vision service offline".to_string()));
        }

        let mut answers = self
            .answers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        let answer = if answers.len() > 1 {
            answers.pop_front()
        } else {
            answers.front().cloned()
        };
        answer.ok_or_else(|| BrowserError::VisionFailed("no scripted answer".to_string()))
    }
}

/// Planner that hands back a fixed plan and fixed suggestions.
pub struct MockPlanner {
    plan: AutomationPlan,
    suggestions: Vec<Action>,
    /// (page text, goal, had screenshot) per `suggest_next` call
    suggestion_requests: Mutex<Vec<(String, String, bool)>>,
}

impl MockPlanner {
    pub fn new(plan: AutomationPlan) -> Self {
        Self {
            plan,
            suggestions: Vec::new(),
            suggestion_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn suggesting(suggestions: Vec<Action>) -> Self {
        Self {
            suggestions,
            ..Self::new(AutomationPlan {
                description: String::new(),
                expected_outcome: String::new(),
                actions: Vec::new(),
            })
        }
    }

    pub fn suggestion_requests(&self) -> Vec<(String, String, bool)> {
        self.suggestion_requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl Planner for MockPlanner {
    async fn plan(&self, _prompt: &str) -> Result<AutomationPlan> {
        Ok(self.plan.clone())
    }

    async fn suggest_next(
        &self,
        page_text: &str,
        goal: &str,
        screenshot_base64: Option<&str>,
    ) -> Result<Vec<Action>> {
        self.suggestion_requests
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push((
                page_text.to_string(),
                goal.to_string(),
                screenshot_base64.is_some(),
            ));
        Ok(self.suggestions.clone())
    }
}

type BrowserFactory = Box<dyn Fn() -> MockBrowser + Send + Sync>;

/// Launcher that hands out fresh `MockBrowser`s and remembers them.
pub struct MockLauncher {
    factory: Option<BrowserFactory>,
    launched: Mutex<Vec<Arc<MockBrowser>>>,
    headless_flags: Mutex<Vec<bool>>,
    attempts: AtomicUsize,
}

impl MockLauncher {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> MockBrowser + Send + Sync + 'static,
    {
        Self {
            factory: Some(Box::new(factory)),
            launched: Mutex::new(Vec::new()),
            headless_flags: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    /// Every launch fails as if Chromium were missing.
    pub fn failing() -> Self {
        Self {
            factory: None,
            launched: Mutex::new(Vec::new()),
            headless_flags: Mutex::new(Vec::new()),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn launched(&self) -> Vec<Arc<MockBrowser>> {
        self.launched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn headless_flags(&self) -> Vec<bool> {
        self.headless_flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn launch_attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrowserLauncher for MockLauncher {
    async fn launch(&self, config: &BrowserConfig) -> Result<Arc<dyn BrowserTrait>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        self.headless_flags
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(config.headless);

        let factory = self.factory.as_ref().ok_or_else(|| {
            BrowserError::LaunchFailed("Failed to launch chromium: executable not found".to_string())
        })?;
        let browser = Arc::new(factory());
        self.launched
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(Arc::clone(&browser));
        Ok(browser as Arc<dyn BrowserTrait>)
    }
}
