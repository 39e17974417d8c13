use crate::core::config::BrowserConfig;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// How far a page load must progress before a wait is satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitUntil {
    /// The document has been parsed (`DOMContentLoaded`).
    DomContentLoaded,
    /// The `load` event has fired.
    Load,
    /// Load has fired and no resources have arrived for a quiet period.
    NetworkIdle,
}

impl fmt::Display for WaitUntil {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            WaitUntil::DomContentLoaded => "domcontentloaded",
            WaitUntil::Load => "load",
            WaitUntil::NetworkIdle => "networkidle",
        };
        f.write_str(name)
    }
}

/// A live page inside a browser session.
///
/// Every method is a suspension point. Implementations must be safe to call
/// concurrently for read-only probes (`wait_for_selector`), since the selector
/// resolver races several of them against the same page.
#[async_trait]
pub trait BrowserTrait: Send + Sync {
    /// Navigate and wait until `wait_until` is reached, bounded by `timeout_ms`.
    async fn goto(&self, url: &str, wait_until: WaitUntil, timeout_ms: u64) -> Result<()>;

    /// Wait for the current document to reach `state`.
    async fn wait_for_load_state(&self, state: WaitUntil, timeout_ms: u64) -> Result<()>;

    /// Wait until `selector` is attached to the document.
    async fn wait_for_selector(&self, selector: &str, timeout_ms: u64) -> Result<()>;

    /// Whether `selector` matches an element right now.
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Whether the first element matching `selector` is a hyperlink.
    async fn is_link(&self, selector: &str) -> Result<bool>;

    /// Remove a `target` attribute from the first match so the click stays in
    /// this tab.
    async fn remove_target(&self, selector: &str) -> Result<()>;

    async fn click(&self, selector: &str) -> Result<()>;

    /// Replace the content of an input-like element with `value`.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    async fn focus(&self, selector: &str) -> Result<()>;

    async fn press_key(&self, key: &str) -> Result<()>;

    /// Smoothly scroll the first match into the center of the viewport.
    /// Returns `false` if nothing matched.
    async fn scroll_into_view(&self, selector: &str) -> Result<bool>;

    async fn scroll_by(&self, dy: i64) -> Result<()>;

    /// PNG bytes of either the whole document or just the viewport.
    async fn screenshot(&self, full_page: bool) -> Result<Vec<u8>>;

    /// Serialized markup of the current document.
    async fn content(&self) -> Result<String>;

    async fn url(&self) -> Result<String>;

    async fn title(&self) -> Result<String>;

    /// Tear down the underlying browser. Must be safe to call more than once.
    async fn close(&self) -> Result<()>;
}

/// Starts browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self, config: &BrowserConfig) -> Result<Arc<dyn BrowserTrait>>;
}
