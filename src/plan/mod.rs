pub mod planner;
pub mod runner;
pub mod store;
pub mod templates;

pub use planner::{parse_actions, parse_plan, GeminiPlanner};
pub use runner::{PlanExecutionReport, PlanRunner};
pub use store::{SessionState, SessionStatus, SessionStore};
pub use templates::{search_prompt, SearchEngine, SearchSelectors};
