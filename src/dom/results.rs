//! Search-result candidates pulled from a page snapshot.
//!
//! Everything here works on serialized markup so it can be tested without a
//! live browser.

use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use url::Url;

const RESULT_CONTAINERS: &str = r#"article[data-testid="result"], div.result, div.g, div.yuRUbf, div[data-testid="web-result"], div.fdb > div.result, li.ais-Hits-item"#;
const TITLE_SELECTORS: &str =
    r#"h2 a, h3 a, a h3, a[data-testid="result-title-a"], span[role="text"] a"#;
const LINK_SELECTOR: &str = "a[href]";
const SNIPPET_SELECTORS: &str = r#"p, span:not([role="text"])"#;
const SNIPPET_FALLBACK_CHARS: usize = 150;

/// One entry of a results listing, as offered to the vision service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultCandidate {
    /// One-based position in the extracted list.
    pub index: usize,
    pub title: String,
    /// Absolute link target.
    pub url: String,
    /// The `href` attribute exactly as written in the markup.
    pub href: String,
    pub snippet: String,
    /// Locator scoped to the result container where possible.
    pub selector: String,
}

impl ResultCandidate {
    /// Locators to try when clicking this candidate, most precise first.
    pub fn click_selectors(&self) -> Vec<String> {
        let mut selectors = vec![format!("a[href={}]", css_string(&self.url))];
        if self.href != self.url {
            selectors.push(format!("a[href={}]", css_string(&self.href)));
        }
        if !selectors.contains(&self.selector) {
            selectors.push(self.selector.clone());
        }
        selectors
    }
}

/// Extract up to `limit` result candidates from `html`.
///
/// Containers without both a title and a link are skipped, as are containers
/// nested inside one already taken and repeats of a URL already listed.
/// Relative links resolve against `page_url` when it parses.
pub fn extract_result_candidates(html: &str, page_url: &str, limit: usize) -> Vec<ResultCandidate> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url).ok();

    let (Ok(containers), Ok(titles), Ok(links), Ok(snippets)) = (
        Selector::parse(RESULT_CONTAINERS),
        Selector::parse(TITLE_SELECTORS),
        Selector::parse(LINK_SELECTOR),
        Selector::parse(SNIPPET_SELECTORS),
    ) else {
        return Vec::new();
    };

    let mut candidates = Vec::new();
    let mut taken = HashSet::new();
    let mut seen_urls = HashSet::new();
    for container in document.select(&containers) {
        if candidates.len() >= limit {
            break;
        }
        // Google nests div.yuRUbf inside div.g
        if container.ancestors().any(|a| taken.contains(&a.id())) {
            continue;
        }

        let title_el = container.select(&titles).next();
        let link_el = container.select(&links).next();

        let (title_el, link_el) = match (title_el, link_el) {
            (Some(title), Some(link)) => (title, link),
            (None, Some(link)) if inside_heading(link) => (link, link),
            _ => continue,
        };

        let Some(href) = link_el.value().attr("href") else {
            continue;
        };
        let title = collapse_text(title_el);
        if title.is_empty() {
            continue;
        }

        let url = resolve_href(base.as_ref(), href);
        if !seen_urls.insert(url.clone()) {
            continue;
        }
        taken.insert(container.id());
        let snippet = container
            .select(&snippets)
            .map(collapse_text)
            .find(|s| !s.is_empty())
            .unwrap_or_else(|| {
                collapse_text(container)
                    .chars()
                    .take(SNIPPET_FALLBACK_CHARS)
                    .collect()
            });

        candidates.push(ResultCandidate {
            index: candidates.len() + 1,
            title,
            url,
            href: href.to_string(),
            snippet,
            selector: scoped_selector(container, href),
        });
    }

    candidates
}

fn inside_heading(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "h1" | "h2" | "h3" | "h4"))
}

fn resolve_href(base: Option<&Url>, href: &str) -> String {
    match base.and_then(|b| b.join(href).ok()) {
        Some(resolved) => resolved.to_string(),
        None => href.to_string(),
    }
}

fn scoped_selector(container: ElementRef<'_>, href: &str) -> String {
    let link = format!("a[href={}]", css_string(href));
    if let Some(id) = container.value().id() {
        return format!("[id={}] {}", css_string(id), link);
    }
    if let Some(test_id) = container.value().attr("data-testid") {
        return format!("[data-testid={}] {}", css_string(test_id), link);
    }
    link
}

fn collapse_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Quote a value for use inside a CSS attribute selector.
pub fn css_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' | '\\' => {
                quoted.push('\\');
                quoted.push(c);
            }
            '\n' => quoted.push_str("\\a "),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}
