pub mod actions;
pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod gemini;
pub mod plan;
pub mod testing;
pub mod types;
pub mod utils;
pub mod vision;

pub use actions::{Action, ActionExecutor, ActionKind, ActionPayload, ActionResult, AutomationPlan, ClickIntent};
pub use browser::{ChromeLauncher, SelectorResolver, SessionManager};
pub use crate::core::{BrowserLauncher, BrowserTrait, Config, Planner, VisionTrait};
pub use errors::{BrowserError, Result};
pub use plan::{GeminiPlanner, PlanExecutionReport, PlanRunner, SearchEngine, SessionStore};
pub use types::*;
pub use utils::ScreenshotArtifact;
pub use vision::{GeminiVision, VisionFallback};
