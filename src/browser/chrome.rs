use crate::core::config::BrowserConfig;
use crate::core::{BrowserLauncher, BrowserTrait, WaitUntil};
use crate::errors::{BrowserError, Result};
use crate::utils::javascript::{self, JavaScriptRunner};
use async_trait::async_trait;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions, Tab};
use serde_json::Value;
use std::ffi::OsStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

const POLL_INTERVAL_MS: u64 = 50;
const NETWORK_QUIET_MS: u64 = 500;

/// Chromium driven through the DevTools protocol.
///
/// `headless_chrome` is synchronous, so every driver call runs on the blocking
/// pool. This keeps the runtime free while selector probes race each other.
pub struct ChromeBrowser {
    browser: Mutex<Option<Browser>>,
    tab: Arc<Tab>,
    closed: AtomicBool,
    script_timeout_ms: u64,
}

impl ChromeBrowser {
    pub fn new(browser: Browser, tab: Arc<Tab>, script_timeout_ms: u64) -> Self {
        Self {
            browser: Mutex::new(Some(browser)),
            tab,
            closed: AtomicBool::new(false),
            script_timeout_ms,
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BrowserError::SessionUnavailable(
                "browser has been closed".to_string(),
            ));
        }
        Ok(())
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(Arc<Tab>) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.ensure_open()?;
        let tab = Arc::clone(&self.tab);
        tokio::task::spawn_blocking(move || f(tab))
            .await
            .map_err(|e| BrowserError::SessionUnavailable(e.to_string()))?
    }

    async fn evaluate(&self, script: &str) -> Result<Value> {
        self.ensure_open()?;
        JavaScriptRunner::execute_with_timeout(&self.tab, script, self.script_timeout_ms).await
    }

    async fn evaluate_bool(&self, script: &str) -> Result<bool> {
        Ok(self.evaluate(script).await?.as_bool().unwrap_or(false))
    }

    async fn wait_for_network_idle(&self, timeout_ms: u64) -> Result<bool> {
        let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
        let mut last_count: Option<u64> = None;
        let mut quiet_since = tokio::time::Instant::now();

        while tokio::time::Instant::now() < deadline {
            let complete = match self
                .evaluate(javascript::load_state_condition(WaitUntil::NetworkIdle))
                .await
            {
                Ok(value) => value.as_bool().unwrap_or(false),
                Err(e) if e.is_session_failure() => return Err(e),
                Err(_) => false,
            };
            let count = match self.evaluate(javascript::RESOURCE_COUNT).await {
                Ok(value) => value.as_u64(),
                Err(e) if e.is_session_failure() => return Err(e),
                Err(_) => None,
            };

            if !complete || count != last_count {
                last_count = count;
                quiet_since = tokio::time::Instant::now();
            } else if quiet_since.elapsed() >= Duration::from_millis(NETWORK_QUIET_MS) {
                return Ok(true);
            }

            tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await;
        }

        Ok(false)
    }
}

#[async_trait]
impl BrowserTrait for ChromeBrowser {
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout_ms: u64) -> Result<()> {
        match self.evaluate(javascript::MARK_OUTGOING_DOCUMENT).await {
            Err(e) if e.is_session_failure() => return Err(e),
            Err(e) => debug!("Could not mark outgoing document: {}", e),
            Ok(_) => {}
        }

        // The tab's own navigation wait is capped by its default timeout, so
        // the requested state is polled here under this attempt's budget.
        let target = url.to_string();
        let navigation = async {
            self.blocking(move |tab| {
                tab.navigate_to(&target)
                    .map_err(|e| BrowserError::from_driver(e, BrowserError::NavigationFailed))?;
                Ok(())
            })
            .await?;
            self.wait_for_load_state(wait_until, timeout_ms).await
        };

        tokio::time::timeout(Duration::from_millis(timeout_ms), navigation)
            .await
            .map_err(|_| {
                BrowserError::NavigationFailed(format!(
                    "Timeout {}ms exceeded navigating to {} (waiting for {})",
                    timeout_ms, url, wait_until
                ))
            })?
    }

    async fn wait_for_load_state(&self, state: WaitUntil, timeout_ms: u64) -> Result<()> {
        self.ensure_open()?;
        let reached = match state {
            WaitUntil::DomContentLoaded | WaitUntil::Load => {
                JavaScriptRunner::wait_for_condition(
                    &self.tab,
                    javascript::load_state_condition(state),
                    timeout_ms,
                    POLL_INTERVAL_MS,
                )
                .await?
            }
            WaitUntil::NetworkIdle => self.wait_for_network_idle(timeout_ms).await?,
        };

        if reached {
            Ok(())
        } else {
            Err(BrowserError::TimeoutError(format!(
                "page did not reach {} within {}ms",
                state, timeout_ms
            )))
        }
    }

    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            tab.wait_for_element_with_custom_timeout(&selector, Duration::from_millis(timeout_ms))
                .map(|_| ())
                .map_err(|e| element_error(e, &selector))
        })
        .await
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        self.evaluate_bool(&javascript::exists_script(selector)).await
    }

    async fn is_link(&self, selector: &str) -> Result<bool> {
        self.evaluate_bool(&javascript::is_link_script(selector)).await
    }

    async fn remove_target(&self, selector: &str) -> Result<()> {
        self.evaluate(&javascript::remove_target_script(selector))
            .await
            .map(|_| ())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            tab.find_element(&selector)
                .map_err(|e| element_error(e, &selector))?
                .click()
                .map_err(BrowserError::from)?;
            Ok(())
        })
        .await
    }

    async fn fill(&self, selector: &str, value: &str) -> Result<()> {
        if !self
            .evaluate_bool(&javascript::clear_input_script(selector))
            .await?
        {
            return Err(BrowserError::ElementNotFound(selector.to_string()));
        }

        let selector = selector.to_string();
        let value = value.to_string();
        self.blocking(move |tab| {
            tab.find_element(&selector)
                .map_err(|e| element_error(e, &selector))?
                .type_into(&value)
                .map_err(BrowserError::from)?;
            Ok(())
        })
        .await
    }

    async fn focus(&self, selector: &str) -> Result<()> {
        let selector = selector.to_string();
        self.blocking(move |tab| {
            tab.find_element(&selector)
                .map_err(|e| element_error(e, &selector))?
                .focus()
                .map_err(BrowserError::from)?;
            Ok(())
        })
        .await
    }

    async fn press_key(&self, key: &str) -> Result<()> {
        let key = key.to_string();
        self.blocking(move |tab| {
            tab.press_key(&key).map_err(BrowserError::from)?;
            Ok(())
        })
        .await
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<bool> {
        self.evaluate_bool(&javascript::scroll_into_view_script(selector))
            .await
    }

    async fn scroll_by(&self, dy: i64) -> Result<()> {
        self.evaluate(&format!("window.scrollBy(0, {})", dy))
            .await
            .map(|_| ())
    }

    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>> {
        let clip = if full_page {
            let size = self.evaluate(javascript::document_size_script()).await?;
            let width = size.get("width").and_then(Value::as_f64).unwrap_or(0.0);
            let height = size.get("height").and_then(Value::as_f64).unwrap_or(0.0);
            (width > 0.0 && height > 0.0).then_some(Page::Viewport {
                x: 0.0,
                y: 0.0,
                width,
                height,
                scale: 1.0,
            })
        } else {
            None
        };

        self.blocking(move |tab| {
            tab.capture_screenshot(
                Page::CaptureScreenshotFormatOption::Png,
                None,
                clip,
                true,
            )
            .map_err(|e| BrowserError::from_driver(e, BrowserError::ScreenshotFailed))
        })
        .await
    }

    async fn content(&self) -> Result<String> {
        self.evaluate("document.documentElement.outerHTML")
            .await?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| BrowserError::JavaScriptFailed("page has no document".to_string()))
    }

    async fn url(&self) -> Result<String> {
        self.ensure_open()?;
        Ok(self.tab.get_url())
    }

    async fn title(&self) -> Result<String> {
        Ok(self
            .evaluate("document.title")
            .await?
            .as_str()
            .unwrap_or("")
            .to_string())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            debug!("Chrome session already closed");
            return Ok(());
        }

        let browser = self
            .browser
            .lock()
            .map_err(BrowserError::from_any_error)?
            .take();
        let tab = Arc::clone(&self.tab);

        tokio::task::spawn_blocking(move || {
            if let Err(e) = tab.close(false) {
                warn!("Tab did not close cleanly: {}", e);
            }
            // dropping the handle terminates the Chromium process
            drop(browser);
        })
        .await
        .map_err(BrowserError::from_any_error)?;

        info!("Chrome session closed");
        Ok(())
    }
}

fn element_error(err: anyhow::Error, selector: &str) -> BrowserError {
    BrowserError::from_driver(err, |message| {
        BrowserError::ElementNotFound(format!("{}: {}", selector, message))
    })
}

/// Launches a fresh Chromium process per session.
#[derive(Debug, Default, Clone)]
pub struct ChromeLauncher;

#[async_trait]
impl BrowserLauncher for ChromeLauncher {
    async fn launch(&self, config: &BrowserConfig) -> Result<Arc<dyn BrowserTrait>> {
        let script_timeout_ms = config.default_timeout_ms;
        let config = config.clone();
        let (browser, tab) = tokio::task::spawn_blocking(move || launch_blocking(&config))
            .await
            .map_err(|e| BrowserError::LaunchFailed(e.to_string()))??;

        info!("Browser automation initialized");
        let browser: Arc<dyn BrowserTrait> = Arc::new(ChromeBrowser::new(browser, tab, script_timeout_ms));
        Ok(browser)
    }
}

fn launch_blocking(config: &BrowserConfig) -> Result<(Browser, Arc<Tab>)> {
    let window_size_arg = format!(
        "--window-size={},{}",
        config.viewport.width, config.viewport.height
    );
    let user_agent_arg = config
        .user_agent
        .as_ref()
        .map(|ua| format!("--user-agent={}", ua));

    let mut args = vec![
        OsStr::new("--no-sandbox"),
        OsStr::new("--disable-setuid-sandbox"),
        OsStr::new(&window_size_arg),
    ];

    if let Some(ref ua_arg) = user_agent_arg {
        args.push(OsStr::new(ua_arg));
    }

    for arg in &config.args {
        args.push(OsStr::new(arg));
    }

    let launch_options = LaunchOptions::default_builder()
        .headless(config.headless)
        .args(args)
        .idle_browser_timeout(Duration::from_secs(300))
        .build()
        .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

    let browser =
        Browser::new(launch_options).map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;

    let tab = browser
        .new_tab()
        .map_err(|e| BrowserError::LaunchFailed(e.to_string()))?;
    tab.set_default_timeout(Duration::from_millis(config.default_timeout_ms));

    Ok((browser, tab))
}
