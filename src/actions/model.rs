use crate::actions::intent::ClickIntent;
use crate::types::ExtractedData;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of action kinds.
///
/// Plans come from an untrusted planner, so unknown kinds deserialize into
/// `Unknown` and are rejected when dispatched rather than when parsed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActionKind {
    Navigate,
    Click,
    Type,
    Wait,
    Scroll,
    Screenshot,
    Extract,
    Unknown(String),
}

impl ActionKind {
    pub fn as_str(&self) -> &str {
        match self {
            ActionKind::Navigate => "navigate",
            ActionKind::Click => "click",
            ActionKind::Type => "type",
            ActionKind::Wait => "wait",
            ActionKind::Scroll => "scroll",
            ActionKind::Screenshot => "screenshot",
            ActionKind::Extract => "extract",
            ActionKind::Unknown(other) => other,
        }
    }
}

impl From<String> for ActionKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "navigate" => ActionKind::Navigate,
            "click" => ActionKind::Click,
            "type" => ActionKind::Type,
            "wait" => ActionKind::Wait,
            "scroll" => ActionKind::Scroll,
            "screenshot" => ActionKind::Screenshot,
            "extract" => ActionKind::Extract,
            _ => ActionKind::Unknown(value),
        }
    }
}

impl From<ActionKind> for String {
    fn from(kind: ActionKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single abstract browser operation. Never mutated once dispatched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub kind: ActionKind,
    /// CSS locator, or the URL for `navigate`.
    #[serde(rename = "target", default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(rename = "timeout", default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub description: String,
    /// Explicit click intent. When absent it is inferred from the description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intent: Option<ClickIntent>,
}

impl Action {
    pub fn new(kind: ActionKind, description: impl Into<String>) -> Self {
        Self {
            kind,
            locator: None,
            value: None,
            timeout_ms: None,
            description: description.into(),
            intent: None,
        }
    }

    pub fn navigate(url: impl Into<String>) -> Self {
        let url = url.into();
        Self::new(ActionKind::Navigate, format!("Navigate to {}", url)).with_locator(url)
    }

    pub fn click(locator: Option<&str>, description: impl Into<String>) -> Self {
        let action = Self::new(ActionKind::Click, description);
        match locator {
            Some(locator) => action.with_locator(locator),
            None => action,
        }
    }

    pub fn type_text(locator: impl Into<String>, value: impl Into<String>) -> Self {
        let value = value.into();
        Self::new(ActionKind::Type, format!("Type \"{}\"", value))
            .with_locator(locator)
            .with_value(value)
    }

    pub fn wait(timeout_ms: u64) -> Self {
        Self::new(ActionKind::Wait, format!("Wait {}ms", timeout_ms)).with_timeout(timeout_ms)
    }

    pub fn screenshot(description: impl Into<String>) -> Self {
        Self::new(ActionKind::Screenshot, description)
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_intent(mut self, intent: ClickIntent) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Locator with surrounding whitespace removed; empty strings count as
    /// missing.
    pub fn locator(&self) -> Option<&str> {
        self.locator
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
    }
}

/// Plan produced by the planning collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutomationPlan {
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub expected_outcome: String,
    pub actions: Vec<Action>,
}

/// Which resolution tier produced a click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ClickStrategyTag {
    AiSelectedSpecificResult,
    AiSelectedSpecificResultFallbackSelector,
    FirstGenericResult,
    SearchButton,
    EnterInSearchInput,
    GenericPlannedTarget,
}

/// Kind-specific outcome of a successful action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionPayload {
    Navigated {
        url: String,
    },
    Clicked {
        clicked: String,
        strategy: ClickStrategyTag,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
    },
    Typed {
        typed: String,
        into: String,
    },
    Waited {
        waited: u64,
    },
    Scrolled {
        scrolled: String,
        into_view: bool,
    },
    Screenshot {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
        timestamp_ms: i64,
        url: String,
        title: String,
    },
    Extracted {
        extracted: ExtractedData,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResult {
    /// Description of the action that produced this result.
    pub action: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(rename = "result")]
    pub payload: ActionPayload,
    pub timestamp: DateTime<Utc>,
}

impl ActionResult {
    pub fn new(action: &Action, payload: ActionPayload) -> Self {
        Self {
            action: action.description.clone(),
            kind: action.kind.clone(),
            payload,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn planner_json_maps_onto_actions() {
        let raw = json!({
            "type": "type",
            "target": "textarea[name=\"q\"]",
            "value": "rust async",
            "timeout": 5000,
            "description": "Type the query"
        });
        let action: Action = serde_json::from_value(raw).unwrap();
        assert_eq!(action.kind, ActionKind::Type);
        assert_eq!(action.locator(), Some("textarea[name=\"q\"]"));
        assert_eq!(action.value.as_deref(), Some("rust async"));
        assert_eq!(action.timeout_ms, Some(5000));
        assert!(action.intent.is_none());
    }

    #[test]
    fn unknown_kind_survives_parsing() {
        let action: Action =
            serde_json::from_value(json!({"type": "hover", "description": "hover"})).unwrap();
        assert_eq!(action.kind, ActionKind::Unknown("hover".to_string()));
        assert_eq!(serde_json::to_value(&action).unwrap()["type"], "hover");
    }

    #[test]
    fn blank_locator_counts_as_missing() {
        let action = Action::click(Some("   "), "click it");
        assert_eq!(action.locator(), None);
    }

    #[test]
    fn click_payload_serializes_flat() {
        let payload = ActionPayload::Clicked {
            clicked: "#go".to_string(),
            strategy: ClickStrategyTag::GenericPlannedTarget,
            title: None,
        };
        assert_eq!(
            serde_json::to_value(payload).unwrap(),
            json!({"clicked": "#go", "strategy": "generic-planned-target"})
        );
    }
}
