use crate::actions::Action;
use crate::core::{BrowserTrait, VisionTrait};
use crate::dom::ResultCandidate;
use crate::errors::BrowserError;
use crate::utils::ScreenshotManager;
use std::sync::Arc;
use tracing::{debug, warn};

pub const UNAVAILABLE_DIAGNOSIS: &str = "Unable to analyze screenshot";
pub const UNAVAILABLE_PAGE_ANALYSIS: &str = "Unable to analyze current page";

/// Vision-based recovery aids: failure diagnosis and result picking.
///
/// Nothing here returns an error. A vision outage degrades to a placeholder
/// diagnosis or "no pick", so the caller's own error always surfaces.
#[derive(Clone)]
pub struct VisionFallback {
    vision: Arc<dyn VisionTrait>,
}

impl VisionFallback {
    pub fn new(vision: Arc<dyn VisionTrait>) -> Self {
        Self { vision }
    }

    /// Free-text explanation of what the screenshot shows, for error
    /// enrichment.
    pub async fn diagnose(&self, image_base64: &str, context: &str) -> String {
        match self
            .vision
            .analyze(image_base64, &diagnosis_prompt(context))
            .await
        {
            Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
            Ok(_) => UNAVAILABLE_DIAGNOSIS.to_string(),
            Err(e) => {
                warn!("Error analyzing screenshot: {}", e);
                UNAVAILABLE_DIAGNOSIS.to_string()
            }
        }
    }

    /// Ask which listed result best matches `description`. Returns a
    /// zero-based index into `candidates`.
    pub async fn pick_result(
        &self,
        image_base64: &str,
        description: &str,
        candidates: &[ResultCandidate],
    ) -> Option<usize> {
        if candidates.is_empty() {
            return None;
        }

        let answer = match self
            .vision
            .analyze(image_base64, &pick_prompt(description, candidates))
            .await
        {
            Ok(answer) => answer,
            Err(e) => {
                warn!("Result selection unavailable: {}", e);
                return None;
            }
        };

        let picked = parse_pick(&answer, candidates.len());
        debug!("Vision pick for \"{}\": {:?} (raw {:?})", description, picked, answer.trim());
        picked.map(|n| n - 1)
    }

    /// Full-page analysis of whatever the browser currently shows.
    pub async fn analyze_current_page(&self, browser: &dyn BrowserTrait, context: &str) -> String {
        match ScreenshotManager::take_base64(browser, true).await {
            Ok(image) => self.diagnose(&image, context).await,
            Err(e) => {
                warn!("Error analyzing current page: {}", e);
                UNAVAILABLE_PAGE_ANALYSIS.to_string()
            }
        }
    }
}

/// Context line handed to `diagnose` when an action fails.
pub fn failure_context(action: &Action, error: &BrowserError) -> String {
    format!(
        "{} failed. User wanted to: \"{}\". Planned target was: \"{}\". Error: {}. Analyze screenshot for alternative.",
        capitalize(action.kind.as_str()),
        action.description,
        action.locator().unwrap_or("none"),
        error
    )
}

pub(crate) fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn diagnosis_prompt(context: &str) -> String {
    format!(
        "Analyze this screenshot of a web page and provide insights about what you see.\n\n\
         Context: \"{}\"\n\n\
         Please describe:\n\
         1. What elements are visible\n\
         2. Any potential actions that could be taken\n\
         3. Important information that stands out\n\n\
         Keep your response concise and actionable.",
        context
    )
}

fn pick_prompt(description: &str, candidates: &[ResultCandidate]) -> String {
    let listing = candidates
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}. Title: \"{}\" | URL: {}", i + 1, c.title, c.url))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Task: User wants to click a search result: \"{}\"\n\
         Based on this, which of the following search results is the MOST relevant?\n\
         {}\n\
         Respond with ONLY the number of the best result (e.g., \"3\"). If none seem relevant, respond \"0\".",
        description, listing
    )
}

/// One-based pick out of `count` listed items. Non-numeric answers, `0`
/// and out-of-range numbers all mean no pick.
pub fn parse_pick(answer: &str, count: usize) -> Option<usize> {
    let digits: String = answer
        .trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '.')
        .chars()
        .take_while(char::is_ascii_digit)
        .collect();
    let n: usize = digits.parse().ok()?;
    (1..=count).contains(&n).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowser, MockVision};

    fn candidate(index: usize, title: &str, url: &str) -> ResultCandidate {
        ResultCandidate {
            index,
            title: title.to_string(),
            url: url.to_string(),
            href: url.to_string(),
            snippet: String::new(),
            selector: format!("a[href=\"{}\"]", url),
        }
    }

    #[test]
    fn parse_pick_bounds() {
        assert_eq!(parse_pick("3", 5), Some(3));
        assert_eq!(parse_pick(" \"2\" ", 5), Some(2));
        assert_eq!(parse_pick("1. Wikipedia", 5), Some(1));
        assert_eq!(parse_pick("0", 5), None);
        assert_eq!(parse_pick("6", 5), None);
        assert_eq!(parse_pick("none of them", 5), None);
        assert_eq!(parse_pick("", 5), None);
    }

    #[tokio::test]
    async fn diagnose_degrades_when_vision_is_down() {
        let fallback = VisionFallback::new(Arc::new(MockVision::failing()));
        assert_eq!(fallback.diagnose("iVBO", "ctx").await, UNAVAILABLE_DIAGNOSIS);
    }

    #[tokio::test]
    async fn diagnose_embeds_context_in_prompt() {
        let vision = Arc::new(MockVision::answering(["A login wall"]));
        let fallback = VisionFallback::new(vision.clone());

        let text = fallback.diagnose("iVBO", "Click failed on #buy").await;

        assert_eq!(text, "A login wall");
        let prompts = vision.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Context: \"Click failed on #buy\""));
    }

    #[tokio::test]
    async fn pick_result_maps_to_zero_based_index() {
        let vision = Arc::new(MockVision::answering(["2"]));
        let fallback = VisionFallback::new(vision.clone());
        let candidates = vec![
            candidate(1, "Rust (video game)", "https://store.test/rust"),
            candidate(2, "Rust - Wikipedia", "https://en.wikipedia.org/wiki/Rust"),
        ];

        let picked = fallback
            .pick_result("iVBO", "Click the Wikipedia result", &candidates)
            .await;

        assert_eq!(picked, Some(1));
        let prompt = &vision.prompts()[0];
        assert!(prompt.contains("2. Title: \"Rust - Wikipedia\" | URL: https://en.wikipedia.org/wiki/Rust"));
        assert!(prompt.contains("respond \"0\""));
    }

    #[tokio::test]
    async fn pick_result_zero_and_outage_mean_no_pick() {
        let candidates = vec![candidate(1, "Only", "https://a.test/")];

        let zero = VisionFallback::new(Arc::new(MockVision::answering(["0"])));
        assert_eq!(zero.pick_result("iVBO", "x", &candidates).await, None);

        let down = VisionFallback::new(Arc::new(MockVision::failing()));
        assert_eq!(down.pick_result("iVBO", "x", &candidates).await, None);
    }

    #[tokio::test]
    async fn current_page_analysis_uses_full_page_capture() {
        let vision = Arc::new(MockVision::answering(["Search results for rust"]));
        let fallback = VisionFallback::new(vision.clone());
        let browser = MockBrowser::new();

        let text = fallback.analyze_current_page(&browser, "what now?").await;

        assert_eq!(text, "Search results for rust");
        assert_eq!(browser.screenshots_taken(), vec![true]);
    }

    #[test]
    fn failure_context_names_kind_and_target() {
        let action = Action::click(Some("#missing"), "Click buy");
        let err = BrowserError::ElementNotFound("#missing".to_string());
        let context = failure_context(&action, &err);
        assert!(context.starts_with("Click failed. User wanted to: \"Click buy\""));
        assert!(context.contains("Planned target was: \"#missing\""));
    }
}
