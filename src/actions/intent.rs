use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// What a click is trying to hit. Decides which resolution strategies run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ClickIntent {
    /// A named target inside a results listing, e.g. the Wikipedia result.
    SpecificLink {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        target: Option<String>,
    },
    /// Whatever result is listed first.
    FirstResult,
    /// Submit the current search form.
    SubmitButton,
    /// Click the planned locator as-is.
    Direct,
}

const RESULT_PHRASES: &[&str] = &["search result", "first result"];
const BRAND_KEYWORDS: &[&str] = &[
    "wikipedia",
    "github",
    "official",
    "docs",
    "documentation",
];
const KNOWN_RESULT_DOMAINS: &[&str] = &["wikipedia.org", "github.com"];

fn domain_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z0-9][\w-]*(?:\.[\w-]+)*\.(?:com|org|net|io|dev|ai))\b")
            .expect("domain pattern is valid")
    })
}

impl ClickIntent {
    /// Keyword heuristic used when the planner did not tag the click.
    ///
    /// Returns `None` when neither the description nor the locator gives
    /// anything to act on.
    pub fn classify(description: &str, locator: Option<&str>) -> Option<ClickIntent> {
        let description = description.to_lowercase();
        let locator = locator.unwrap_or("");

        let mentions_results = RESULT_PHRASES.iter().any(|p| description.contains(p));
        let named_domain = domain_pattern()
            .captures(&description)
            .map(|c| c[1].to_string())
            .or_else(|| {
                KNOWN_RESULT_DOMAINS
                    .iter()
                    .find(|d| locator.contains(*d))
                    .map(|d| d.to_string())
            });
        let names_brand = BRAND_KEYWORDS.iter().find(|k| description.contains(*k));

        if mentions_results && (named_domain.is_some() || names_brand.is_some()) {
            return Some(ClickIntent::SpecificLink {
                target: named_domain.or_else(|| names_brand.map(|k| k.to_string())),
            });
        }
        if mentions_results {
            return Some(ClickIntent::FirstResult);
        }
        if locator.contains("btnK")
            || description.contains("search button")
            || description.trim() == "click search"
        {
            return Some(ClickIntent::SubmitButton);
        }
        if !locator.trim().is_empty() {
            return Some(ClickIntent::Direct);
        }
        None
    }

    pub fn needs_locator(&self) -> bool {
        matches!(self, ClickIntent::Direct)
    }
}
