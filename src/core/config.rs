use crate::core::browser::WaitUntil;
use crate::errors::Result;
use crate::types::Viewport;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub browser: BrowserConfig,
    pub execution: ExecutionConfig,
    pub navigation: NavigationConfig,
    pub vision: VisionConfig,
    pub screenshots: ScreenshotConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub headless: bool,
    pub viewport: Viewport,
    pub user_agent: Option<String>,
    pub args: Vec<String>,
    pub default_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    pub default_action_timeout_ms: u64,
    pub default_wait_ms: u64,
    pub inter_action_delay_ms: u64,
    pub scroll_offset_px: i64,
    pub post_click_navigation_timeout_ms: u64,
    pub result_settle_ms: u64,
    pub extract_text_limit: usize,
    pub max_result_candidates: usize,
    pub search_input_timeout_ms: u64,
    pub first_result_selectors: Vec<String>,
    pub search_button_selectors: Vec<String>,
    pub search_input_selectors: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    pub max_attempts: u32,
    /// Escalating wait conditions; the last entry repeats for any further
    /// attempts.
    pub attempts: Vec<NavigationAttempt>,
    pub backoff_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationAttempt {
    pub wait_until: WaitUntil,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenshotConfig {
    pub output_dir: Option<PathBuf>,
}

impl Config {
    /// Read a JSON config file. Missing fields fall back to defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(key) = std::env::var("GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                self.vision.api_key = Some(key);
            }
        }
        if let Ok(model) = std::env::var("GEMINI_MODEL") {
            self.vision.model = model;
        }
        if let Ok(headless) = std::env::var("AUTOPILOT_HEADLESS") {
            self.browser.headless = !matches!(headless.as_str(), "0" | "false" | "no");
        }
        if let Ok(dir) = std::env::var("AUTOPILOT_SCREENSHOT_DIR") {
            self.screenshots.output_dir = Some(PathBuf::from(dir));
        }
        self
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            viewport: Viewport::default(),
            user_agent: None,
            args: vec![],
            default_timeout_ms: 8000,
        }
    }
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            default_action_timeout_ms: 7000,
            default_wait_ms: 1000,
            inter_action_delay_ms: 300,
            scroll_offset_px: 500,
            post_click_navigation_timeout_ms: 7000,
            result_settle_ms: 1500,
            extract_text_limit: 1000,
            max_result_candidates: 10,
            search_input_timeout_ms: 3000,
            first_result_selectors: strings(&[
                r#"[data-result="1"] h2 a"#,
                r#"article[data-testid="result"]:first-child h2 a"#,
                ".result:first-child h2 a",
                ".fdb > .result:first-child h3 a",
                "#search .g:first-child h3 a",
                r#"[data-testid="result"]:first-child a"#,
                r#"a[data-testid="result-title-a"]:first-of-type"#,
            ]),
            search_button_selectors: strings(&[
                r#"input[name="btnK"]"#,
                r#"button[type="submit"]"#,
                r#"button[aria-label="Search"]"#,
                "#search_button_homepage",
            ]),
            search_input_selectors: strings(&[
                r#"input[name="q"]"#,
                r#"textarea[name="q"]"#,
                "input#searchbox_input",
            ]),
        }
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            attempts: vec![
                NavigationAttempt {
                    wait_until: WaitUntil::DomContentLoaded,
                    timeout_ms: 8000,
                },
                NavigationAttempt {
                    wait_until: WaitUntil::Load,
                    timeout_ms: 12000,
                },
                NavigationAttempt {
                    wait_until: WaitUntil::NetworkIdle,
                    timeout_ms: 15000,
                },
            ],
            backoff_ms: 500,
        }
    }
}

impl NavigationConfig {
    /// Wait condition for a zero-based attempt number.
    pub fn attempt(&self, attempt: u32) -> NavigationAttempt {
        let idx = (attempt as usize).min(self.attempts.len().saturating_sub(1));
        self.attempts.get(idx).copied().unwrap_or(NavigationAttempt {
            wait_until: WaitUntil::Load,
            timeout_ms: 15000,
        })
    }
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: "gemini-2.0-flash-exp".to_string(),
            base_url: crate::gemini::DEFAULT_BASE_URL.to_string(),
        }
    }
}

impl Default for ScreenshotConfig {
    fn default() -> Self {
        Self {
            output_dir: Some(PathBuf::from("public/screenshots")),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
