use crate::actions::{Action, AutomationPlan};
use crate::errors::Result;
use async_trait::async_trait;

/// Turns a natural-language instruction into an ordered action plan.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, prompt: &str) -> Result<AutomationPlan>;

    /// Suggest the next few actions towards `goal` from what the page shows.
    async fn suggest_next(
        &self,
        page_text: &str,
        goal: &str,
        screenshot_base64: Option<&str>,
    ) -> Result<Vec<Action>>;
}
