pub mod click;
pub mod executor;
pub mod intent;
pub mod model;

pub use click::ClickStrategy;
pub use executor::ActionExecutor;
pub use intent::ClickIntent;
pub use model::{
    Action, ActionKind, ActionPayload, ActionResult, AutomationPlan, ClickStrategyTag,
};
