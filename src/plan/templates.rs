//! Canned search-engine tasks: the instruction handed to the planner and the
//! selector pools that work on each engine's markup.

use crate::core::config::ExecutionConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    #[default]
    Google,
    Brave,
}

impl SearchEngine {
    pub fn base_url(self) -> &'static str {
        match self {
            SearchEngine::Google => "https://www.google.com",
            SearchEngine::Brave => "https://search.brave.com/",
        }
    }

    pub fn selectors(self) -> SearchSelectors {
        match self {
            SearchEngine::Google => SearchSelectors {
                search_input: &[
                    r#"input[name="q"]"#,
                    r#"textarea[name="q"]"#,
                    "input#searchbox",
                    r#"input[title="Search"]"#,
                    r#"[role="combobox"]"#,
                    r#"input[type="text"][title*="search" i]"#,
                    r#"input[aria-label*="search" i]"#,
                    r#"input[placeholder*="search" i]"#,
                    "#APjFqb",
                    "input.gLFyf",
                    r#"input[data-testid*="search" i]"#,
                ],
                search_button: &[
                    r#"input[name="btnK"]"#,
                    r#"button[type="submit"]"#,
                    r#"[role="button"][aria-label*="search" i]"#,
                    r#"input[value*="Search" i]"#,
                    r#"button[data-testid*="search" i]"#,
                    "input.gNO89b",
                    r#"center input[type="submit"]"#,
                    r#"form[role="search"] button"#,
                    r#"form button[type="submit"]"#,
                ],
                first_result: &[
                    r#"h3 a[href*="http"]"#,
                    r#"a[href*="http"] h3"#,
                    ".g a[href]:first-of-type",
                    r#"[data-ved] a[href*="http"]"#,
                    r#"a[ping][href*="http"]"#,
                    r#".result a[href*="http"]"#,
                    r#".search-result a[href*="http"]"#,
                ],
            },
            SearchEngine::Brave => SearchSelectors {
                search_input: &[
                    r#"input[name="q"]"#,
                    "input#searchbox",
                    r#"input[placeholder*="search" i]"#,
                    r#"input[aria-label*="search" i]"#,
                    r#"form input[type="text"]"#,
                ],
                search_button: &[
                    r#"button[type="submit"]"#,
                    r#"input[type="submit"]"#,
                    "form button",
                ],
                first_result: &[
                    r#".result a[href*="http"]"#,
                    r#".search-result a[href*="http"]"#,
                    r#"h3 a[href*="http"]"#,
                    r#"a[href*="http"]:first-of-type"#,
                ],
            },
        }
    }
}

impl fmt::Display for SearchEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SearchEngine::Google => "google",
            SearchEngine::Brave => "brave",
        })
    }
}

impl FromStr for SearchEngine {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "google" => Ok(SearchEngine::Google),
            "brave" => Ok(SearchEngine::Brave),
            other => Err(format!("unknown search engine: {}", other)),
        }
    }
}

/// Locator pools tuned for one engine.
#[derive(Debug, Clone, Copy)]
pub struct SearchSelectors {
    pub search_input: &'static [&'static str],
    pub search_button: &'static [&'static str],
    pub first_result: &'static [&'static str],
}

impl SearchSelectors {
    /// Add these pools to `config`, keeping its existing entries and order.
    pub fn merge_into(&self, config: &mut ExecutionConfig) {
        merge(&mut config.search_input_selectors, self.search_input);
        merge(&mut config.search_button_selectors, self.search_button);
        merge(&mut config.first_result_selectors, self.first_result);
    }
}

fn merge(pool: &mut Vec<String>, extra: &[&str]) {
    for selector in extra {
        if !pool.iter().any(|s| s == selector) {
            pool.push(selector.to_string());
        }
    }
}

/// Instruction for "search for `term` and open a result", optionally the
/// first one on `domain`.
pub fn search_prompt(term: &str, engine: SearchEngine, domain: Option<&str>) -> String {
    let click = match domain {
        Some(domain) => format!(
            "Click the first result that contains '{}' in the URL or title",
            domain
        ),
        None => "Click the first search result".to_string(),
    };
    format!(
        "Navigate to {}, search for \"{}\", and {}. Take a screenshot of the final page.",
        engine.base_url(),
        term,
        click
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompts_name_the_engine_and_domain() {
        assert_eq!(
            search_prompt("rust lang", SearchEngine::Google, None),
            "Navigate to https://www.google.com, search for \"rust lang\", and Click the first search result. Take a screenshot of the final page."
        );
        let brave = search_prompt("tokio", SearchEngine::Brave, Some("github.com"));
        assert!(brave.starts_with("Navigate to https://search.brave.com/"));
        assert!(brave.contains("contains 'github.com' in the URL or title"));
    }

    #[test]
    fn engines_parse_case_insensitively() {
        assert_eq!("Brave".parse::<SearchEngine>(), Ok(SearchEngine::Brave));
        assert_eq!("google".parse::<SearchEngine>(), Ok(SearchEngine::Google));
        assert!("bing".parse::<SearchEngine>().is_err());
        assert_eq!(SearchEngine::Brave.to_string(), "brave");
    }

    #[test]
    fn merging_keeps_defaults_first_without_duplicates() {
        let mut config = ExecutionConfig::default();
        let before = config.search_input_selectors.clone();

        SearchEngine::Google.selectors().merge_into(&mut config);

        assert_eq!(&config.search_input_selectors[..before.len()], &before[..]);
        assert!(config.search_input_selectors.contains(&"#APjFqb".to_string()));
        let q_inputs = config
            .search_input_selectors
            .iter()
            .filter(|s| s.as_str() == r#"input[name="q"]"#)
            .count();
        assert_eq!(q_inputs, 1);
        assert!(config
            .first_result_selectors
            .contains(&r#"h3 a[href*="http"]"#.to_string()));
    }

    #[test]
    fn engine_selectors_are_valid_css() {
        for engine in [SearchEngine::Google, SearchEngine::Brave] {
            let pools = engine.selectors();
            for selector in pools
                .search_input
                .iter()
                .chain(pools.search_button)
                .chain(pools.first_result)
            {
                assert!(
                    scraper::Selector::parse(selector).is_ok(),
                    "{} selector {} does not parse",
                    engine,
                    selector
                );
            }
        }
    }
}
