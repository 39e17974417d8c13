use crate::actions::{Action, AutomationPlan};
use crate::core::config::VisionConfig;
use crate::core::Planner;
use crate::errors::{BrowserError, Result};
use crate::gemini::GeminiClient;
use async_trait::async_trait;
use tracing::{debug, info};

/// Page text beyond this many characters is left out of suggestion prompts.
const SUGGESTION_PAGE_CHARS: usize = 2000;

/// Plans automation runs with a Gemini text model.
pub struct GeminiPlanner {
    client: GeminiClient,
    model: String,
}

impl GeminiPlanner {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn from_config(config: &VisionConfig) -> Result<Self> {
        let key = config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                BrowserError::PlanningFailed("GEMINI_API_KEY is not set".to_string())
            })?;
        Ok(Self::new(
            GeminiClient::new(key, config.base_url.clone())?,
            config.model.clone(),
        ))
    }
}

#[async_trait]
impl Planner for GeminiPlanner {
    async fn plan(&self, prompt: &str) -> Result<AutomationPlan> {
        info!("Generating automation plan for: {}", prompt);
        let text = self
            .client
            .generate_text(&self.model, &planning_prompt(prompt), None)
            .await
            .map_err(|e| BrowserError::PlanningFailed(e.to_string()))?;
        debug!("Planner response: {}", text);
        parse_plan(&text)
    }

    async fn suggest_next(
        &self,
        page_text: &str,
        goal: &str,
        screenshot_base64: Option<&str>,
    ) -> Result<Vec<Action>> {
        info!(
            "Suggesting next actions for \"{}\" (screenshot: {})",
            goal,
            screenshot_base64.is_some()
        );
        let text = self
            .client
            .generate_text(
                &self.model,
                &suggestion_prompt(page_text, goal),
                screenshot_base64,
            )
            .await
            .map_err(|e| BrowserError::PlanningFailed(e.to_string()))?;
        debug!("Suggestion response: {}", text);
        parse_actions(&text)
    }
}

/// Parse a planner reply, tolerating a ```json fence around the object.
pub fn parse_plan(text: &str) -> Result<AutomationPlan> {
    let cleaned = text.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim())
        .map_err(|e| BrowserError::PlanningFailed(format!("planner returned invalid JSON: {}", e)))
}

/// Parse a bare JSON array of actions, with or without a ```json fence.
pub fn parse_actions(text: &str) -> Result<Vec<Action>> {
    let cleaned = text.replace("```json", "").replace("```", "");
    serde_json::from_str(cleaned.trim()).map_err(|e| {
        BrowserError::PlanningFailed(format!("planner returned invalid actions: {}", e))
    })
}

fn suggestion_prompt(page_text: &str, goal: &str) -> String {
    let page: String = page_text.chars().take(SUGGESTION_PAGE_CHARS).collect();
    format!(
        r#"You are analyzing a web page to help continue browser automation.

Current Goal: "{goal}"
Page Content: "{page}"

Based on the page content and current goal, suggest the next 1-3 browser actions.

Respond with a JSON array of actions following this format:
[
  {{
    "type": "click" | "type" | "navigate" | "wait" | "scroll" | "screenshot" | "extract",
    "target": "CSS selector",
    "value": "text value if needed",
    "timeout": 5000,
    "description": "What this action does"
  }}
]

Respond ONLY with valid JSON array, no additional text."#
    )
}

fn planning_prompt(request: &str) -> String {
    format!(
        r#"You are a browser automation expert. Given a user's request, create a detailed plan to automate browser actions.

User Request: "{request}"

Respond with a JSON object with exactly this structure:
{{
  "description": "Brief description of what will be automated",
  "expectedOutcome": "What the user should expect to see",
  "actions": [
    {{
      "type": "navigate" | "click" | "type" | "wait" | "scroll" | "screenshot" | "extract",
      "target": "CSS selector, or the URL for navigate",
      "value": "text to type (type actions only)",
      "timeout": 5000,
      "description": "Human readable description of this step",
      "intent": {{ "kind": "specific-link" | "first-result" | "submit-button" | "direct", "target": "domain for specific-link" }}
    }}
  ]
}}

Guidelines:
- Start with a "navigate" action whenever a URL is needed.
- Prefer robust selectors, e.g. for a search box: input[name="q"], textarea[name="q"], [role="combobox"].
- For search buttons try input[name="btnK"] or button[type="submit"] and set intent "submit-button".
- To open a search result, describe it ("Click the first search result", "Click the Wikipedia result") and set intent "first-result" or "specific-link" with the domain.
- Use 3000-5000ms timeouts for elements and 8000ms only for navigation.
- Use "wait" sparingly.
- End with a "screenshot" action to capture the result.
- For "extract", say in the description what should be extracted.

Respond ONLY with valid JSON, no additional text."#
    )
}
