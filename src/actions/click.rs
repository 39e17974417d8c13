use crate::actions::intent::ClickIntent;
use crate::actions::model::{Action, ActionPayload, ClickStrategyTag};
use crate::browser::resolver::SelectorResolver;
use crate::core::config::ExecutionConfig;
use crate::core::{BrowserTrait, WaitUntil};
use crate::dom::extract_result_candidates;
use crate::errors::{BrowserError, Result};
use crate::utils::ScreenshotManager;
use crate::vision::VisionFallback;
use std::time::Duration;
use tracing::{debug, info, warn};

/// One way of turning a click intent into an actual click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickStrategy {
    /// Let the vision service pick a named result from the listing.
    VisionPickedResult,
    /// Click the first entry of a results listing.
    FirstResult,
    SearchButton,
    /// Submit by pressing Enter inside the search box.
    EnterInSearchInput,
    /// Click the planned locator.
    Direct,
}

impl ClickStrategy {
    /// Ordered strategies tried for `intent`. Earlier entries win.
    pub fn chain(intent: &ClickIntent) -> &'static [ClickStrategy] {
        match intent {
            ClickIntent::SpecificLink { .. } => {
                &[ClickStrategy::VisionPickedResult, ClickStrategy::FirstResult]
            }
            ClickIntent::FirstResult => &[ClickStrategy::FirstResult],
            ClickIntent::SubmitButton => {
                &[ClickStrategy::SearchButton, ClickStrategy::EnterInSearchInput]
            }
            ClickIntent::Direct => &[ClickStrategy::Direct],
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ClickStrategy::VisionPickedResult => "vision-picked-result",
            ClickStrategy::FirstResult => "first-result",
            ClickStrategy::SearchButton => "search-button",
            ClickStrategy::EnterInSearchInput => "enter-in-search-input",
            ClickStrategy::Direct => "direct",
        }
    }
}

/// Outcome of a single strategy.
enum Attempt {
    Clicked(ActionPayload),
    /// Not applicable on this page; the next strategy gets a turn.
    Declined(String),
}

/// Runs a click intent's strategy chain against the live page.
pub(crate) struct ClickRunner<'a> {
    browser: &'a dyn BrowserTrait,
    fallback: &'a VisionFallback,
    config: &'a ExecutionConfig,
}

impl<'a> ClickRunner<'a> {
    pub fn new(
        browser: &'a dyn BrowserTrait,
        fallback: &'a VisionFallback,
        config: &'a ExecutionConfig,
    ) -> Self {
        Self {
            browser,
            fallback,
            config,
        }
    }

    /// Try each strategy in order. A declined strategy hands over to the
    /// next one; a hard error ends the chain.
    pub async fn run(
        &self,
        action: &Action,
        intent: &ClickIntent,
        timeout_ms: u64,
    ) -> Result<ActionPayload> {
        let mut declined = Vec::new();

        for strategy in ClickStrategy::chain(intent) {
            debug!("Trying click strategy {} for \"{}\"", strategy.name(), action.description);
            match self.attempt(*strategy, action, timeout_ms).await? {
                Attempt::Clicked(payload) => {
                    info!(
                        "Clicked via {} for \"{}\"",
                        strategy.name(),
                        action.description
                    );
                    return Ok(payload);
                }
                Attempt::Declined(reason) => {
                    info!("Click strategy {} declined: {}", strategy.name(), reason);
                    declined.push(format!("{}: {}", strategy.name(), reason));
                }
            }
        }

        Err(BrowserError::ResolutionFailed(format!(
            "Click action for \"{}\" could not be resolved ({})",
            action.description,
            declined.join("; ")
        )))
    }

    async fn attempt(
        &self,
        strategy: ClickStrategy,
        action: &Action,
        timeout_ms: u64,
    ) -> Result<Attempt> {
        match strategy {
            ClickStrategy::VisionPickedResult => {
                // any trouble here only means "no confident pick"
                match self.vision_picked_result(action).await {
                    Err(e) if !e.is_session_failure() => {
                        warn!("Vision-guided result selection failed: {}", e);
                        Ok(Attempt::Declined(e.to_string()))
                    }
                    other => other,
                }
            }
            ClickStrategy::FirstResult => self.first_result(timeout_ms).await,
            ClickStrategy::SearchButton => self.search_button(timeout_ms).await,
            ClickStrategy::EnterInSearchInput => self.enter_in_search_input().await,
            ClickStrategy::Direct => self.direct(action, timeout_ms).await,
        }
    }

    async fn vision_picked_result(&self, action: &Action) -> Result<Attempt> {
        tokio::time::sleep(Duration::from_millis(self.config.result_settle_ms)).await;

        let image = ScreenshotManager::take_base64(self.browser, false).await?;
        let html = self.browser.content().await?;
        let page_url = self.browser.url().await?;

        let candidates =
            extract_result_candidates(&html, &page_url, self.config.max_result_candidates);
        if candidates.is_empty() {
            return Ok(Attempt::Declined(
                "no search results extracted from page".to_string(),
            ));
        }
        info!("Found {} potential results for analysis", candidates.len());

        let Some(picked) = self
            .fallback
            .pick_result(&image, &action.description, &candidates)
            .await
        else {
            return Ok(Attempt::Declined("no confident pick".to_string()));
        };
        let chosen = &candidates[picked];
        info!(
            "Selected result #{}: \"{}\" ({})",
            chosen.index, chosen.title, chosen.url
        );

        let selectors = chosen.click_selectors();
        for (position, selector) in selectors.iter().enumerate() {
            if !self.browser.exists(selector).await? {
                continue;
            }
            self.click_and_settle(selector, true).await?;
            let strategy = if position + 1 == selectors.len() && position > 0 {
                ClickStrategyTag::AiSelectedSpecificResultFallbackSelector
            } else {
                ClickStrategyTag::AiSelectedSpecificResult
            };
            return Ok(Attempt::Clicked(ActionPayload::Clicked {
                clicked: selector.clone(),
                strategy,
                title: Some(chosen.title.clone()),
            }));
        }

        Ok(Attempt::Declined(format!(
            "selected result #{} (\"{}\") is not clickable on the page",
            chosen.index, chosen.title
        )))
    }

    async fn first_result(&self, timeout_ms: u64) -> Result<Attempt> {
        let resolver = SelectorResolver::new(self.browser);
        let Some(selector) = resolver
            .resolve(&self.config.first_result_selectors, timeout_ms)
            .await
        else {
            return Ok(Attempt::Declined(
                "no generic first search result found".to_string(),
            ));
        };

        self.click_and_settle(&selector, true).await?;
        Ok(Attempt::Clicked(ActionPayload::Clicked {
            clicked: selector,
            strategy: ClickStrategyTag::FirstGenericResult,
            title: None,
        }))
    }

    async fn search_button(&self, timeout_ms: u64) -> Result<Attempt> {
        let resolver = SelectorResolver::new(self.browser);
        let Some(selector) = resolver
            .resolve(&self.config.search_button_selectors, timeout_ms)
            .await
        else {
            return Ok(Attempt::Declined("no search button found".to_string()));
        };

        self.click_and_settle(&selector, false).await?;
        Ok(Attempt::Clicked(ActionPayload::Clicked {
            clicked: selector,
            strategy: ClickStrategyTag::SearchButton,
            title: None,
        }))
    }

    async fn enter_in_search_input(&self) -> Result<Attempt> {
        let resolver = SelectorResolver::new(self.browser);
        let Some(selector) = resolver
            .resolve(
                &self.config.search_input_selectors,
                self.config.search_input_timeout_ms,
            )
            .await
        else {
            return Ok(Attempt::Declined(
                "no search input to press Enter in".to_string(),
            ));
        };

        info!("No search button, pressing Enter in {}", selector);
        self.browser.focus(&selector).await?;
        self.browser.press_key("Enter").await?;
        self.await_navigation().await;
        Ok(Attempt::Clicked(ActionPayload::Clicked {
            clicked: selector,
            strategy: ClickStrategyTag::EnterInSearchInput,
            title: None,
        }))
    }

    async fn direct(&self, action: &Action, timeout_ms: u64) -> Result<Attempt> {
        let Some(locator) = action.locator() else {
            return Err(BrowserError::InvalidAction(
                "Direct click requires a target selector".to_string(),
            ));
        };

        self.browser.wait_for_selector(locator, timeout_ms).await?;
        let is_link = self.browser.is_link(locator).await?;
        self.click_and_settle(locator, is_link).await?;
        Ok(Attempt::Clicked(ActionPayload::Clicked {
            clicked: locator.to_string(),
            strategy: ClickStrategyTag::GenericPlannedTarget,
            title: None,
        }))
    }

    /// Click, keeping links in the current tab, then give a triggered
    /// navigation a chance to parse.
    async fn click_and_settle(&self, selector: &str, strip_target: bool) -> Result<()> {
        if strip_target {
            if let Err(e) = self.browser.remove_target(selector).await {
                if e.is_session_failure() {
                    return Err(e);
                }
                debug!("Could not strip target from {}: {}", selector, e);
            }
        }
        self.browser.click(selector).await?;
        self.await_navigation().await;
        Ok(())
    }

    async fn await_navigation(&self) {
        // most clicks do not navigate
        if let Err(e) = self
            .browser
            .wait_for_load_state(
                WaitUntil::DomContentLoaded,
                self.config.post_click_navigation_timeout_ms,
            )
            .await
        {
            debug!("No navigation settled after click: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBrowser, MockVision};
    use std::sync::Arc;

    const RESULTS_PAGE: &str = r#"
        <html><body><div id="search">
          <div class="g" id="r1"><h3><a href="https://store.test/rust">Rust (video game)</a></h3></div>
          <div class="g" id="r2"><h3><a href="https://en.wikipedia.org/wiki/Rust_(programming_language)">Rust - Wikipedia</a></h3></div>
        </div></body></html>"#;

    fn runner_parts(answer: &str) -> (VisionFallback, ExecutionConfig) {
        (
            VisionFallback::new(Arc::new(MockVision::answering([answer]))),
            ExecutionConfig::default(),
        )
    }

    #[test]
    fn chains_follow_intent() {
        assert_eq!(
            ClickStrategy::chain(&ClickIntent::SpecificLink { target: None }),
            &[ClickStrategy::VisionPickedResult, ClickStrategy::FirstResult]
        );
        assert_eq!(
            ClickStrategy::chain(&ClickIntent::SubmitButton),
            &[ClickStrategy::SearchButton, ClickStrategy::EnterInSearchInput]
        );
        assert_eq!(ClickStrategy::chain(&ClickIntent::Direct), &[ClickStrategy::Direct]);
    }

    #[tokio::test(start_paused = true)]
    async fn vision_pick_prefers_exact_url_match() {
        let wiki = r#"a[href="https://en.wikipedia.org/wiki/Rust_(programming_language)"]"#;
        let browser = MockBrowser::new()
            .with_url("https://search.test/?q=rust")
            .with_content(RESULTS_PAGE)
            .with_link(wiki);
        let (fallback, config) = runner_parts("2");
        let action = Action::click(None, "Click the Wikipedia search result");
        let intent = ClickIntent::SpecificLink {
            target: Some("wikipedia".to_string()),
        };

        let payload = ClickRunner::new(&browser, &fallback, &config)
            .run(&action, &intent, 7000)
            .await
            .unwrap();

        assert_eq!(
            payload,
            ActionPayload::Clicked {
                clicked: wiki.to_string(),
                strategy: ClickStrategyTag::AiSelectedSpecificResult,
                title: Some("Rust - Wikipedia".to_string()),
            }
        );
        assert_eq!(browser.screenshots_taken(), vec![false]);
        assert!(browser.calls().contains(&format!("remove_target {}", wiki)));
    }

    #[tokio::test(start_paused = true)]
    async fn vision_pick_zero_falls_through_to_first_result() {
        let browser = MockBrowser::new()
            .with_content(RESULTS_PAGE)
            .with_element("#search .g:first-child h3 a");
        let (fallback, config) = runner_parts("0");
        let action = Action::click(None, "Click the GitHub search result");
        let intent = ClickIntent::SpecificLink {
            target: Some("github".to_string()),
        };

        let payload = ClickRunner::new(&browser, &fallback, &config)
            .run(&action, &intent, 7000)
            .await
            .unwrap();

        assert_eq!(
            payload,
            ActionPayload::Clicked {
                clicked: "#search .g:first-child h3 a".to_string(),
                strategy: ClickStrategyTag::FirstGenericResult,
                title: None,
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn search_button_falls_back_to_enter() {
        let browser = MockBrowser::new().with_element(r#"textarea[name="q"]"#);
        let (fallback, config) = runner_parts("0");
        let action = Action::click(Some(r#"input[name="btnK"]"#), "Click search");

        let payload = ClickRunner::new(&browser, &fallback, &config)
            .run(&action, &ClickIntent::SubmitButton, 2000)
            .await
            .unwrap();

        assert!(matches!(
            payload,
            ActionPayload::Clicked {
                strategy: ClickStrategyTag::EnterInSearchInput,
                ..
            }
        ));
        let calls = browser.calls();
        assert!(calls.contains(&r#"focus textarea[name="q"]"#.to_string()));
        assert!(calls.contains(&"press Enter".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_chain_names_every_declined_strategy() {
        let browser = MockBrowser::new();
        let (fallback, config) = runner_parts("0");
        let action = Action::click(None, "Click search button");

        let err = ClickRunner::new(&browser, &fallback, &config)
            .run(&action, &ClickIntent::SubmitButton, 1000)
            .await
            .unwrap_err();

        let message = err.to_string();
        assert!(message.contains("search-button: no search button found"));
        assert!(message.contains("enter-in-search-input"));
    }

    #[tokio::test(start_paused = true)]
    async fn direct_click_strips_target_only_on_links() {
        let browser = MockBrowser::new()
            .with_link("a.docs")
            .with_element("button.buy");
        let (fallback, config) = runner_parts("0");
        let runner = ClickRunner::new(&browser, &fallback, &config);

        runner
            .run(&Action::click(Some("a.docs"), "Open docs"), &ClickIntent::Direct, 1000)
            .await
            .unwrap();
        runner
            .run(&Action::click(Some("button.buy"), "Buy"), &ClickIntent::Direct, 1000)
            .await
            .unwrap();

        let calls = browser.calls();
        assert!(calls.contains(&"remove_target a.docs".to_string()));
        assert!(!calls.contains(&"remove_target button.buy".to_string()));
        assert!(calls.contains(&"click button.buy".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn vision_pick_clicks_through_scoped_locator_when_url_locators_miss() {
        let scoped = r#"[id="r1"] a[href="https://store.test/rust"]"#;
        let browser = MockBrowser::new()
            .with_url("https://search.test/?q=rust")
            .with_content(RESULTS_PAGE)
            .with_link(scoped)
            .with_click_navigation(scoped, "https://store.test/rust", "Rust on the store");
        let (fallback, config) = runner_parts("1");
        let action = Action::click(None, "Click the store search result for Rust");
        let intent = ClickIntent::SpecificLink {
            target: Some("store".to_string()),
        };

        let payload = ClickRunner::new(&browser, &fallback, &config)
            .run(&action, &intent, 7000)
            .await
            .unwrap();

        assert_eq!(
            payload,
            ActionPayload::Clicked {
                clicked: scoped.to_string(),
                strategy: ClickStrategyTag::AiSelectedSpecificResultFallbackSelector,
                title: Some("Rust (video game)".to_string()),
            }
        );
        assert_eq!(browser.url().await.unwrap(), "https://store.test/rust");
        assert_eq!(browser.title().await.unwrap(), "Rust on the store");
    }

    #[tokio::test(start_paused = true)]
    async fn out_of_range_pick_falls_through_to_first_result() {
        let vision = Arc::new(MockVision::answering(["7"]));
        let fallback = VisionFallback::new(vision.clone());
        let config = ExecutionConfig::default();
        let browser = MockBrowser::new()
            .with_content(RESULTS_PAGE)
            .with_element("#search .g:first-child h3 a");
        let action = Action::click(None, "Click the Wikipedia search result");
        let intent = ClickIntent::SpecificLink {
            target: Some("wikipedia".to_string()),
        };

        let payload = ClickRunner::new(&browser, &fallback, &config)
            .run(&action, &intent, 7000)
            .await
            .unwrap();

        assert_eq!(vision.call_count(), 1);
        assert!(matches!(
            payload,
            ActionPayload::Clicked {
                strategy: ClickStrategyTag::FirstGenericResult,
                ..
            }
        ));
        assert!(!browser
            .calls()
            .iter()
            .any(|call| call.contains("wikipedia.org")));
    }

    #[tokio::test(start_paused = true)]
    async fn failed_direct_click_is_not_declined() {
        let browser = MockBrowser::new().with_element("#stale").failing_click("#stale");
        let (fallback, config) = runner_parts("0");

        let err = ClickRunner::new(&browser, &fallback, &config)
            .run(&Action::click(Some("#stale"), "Click stale"), &ClickIntent::Direct, 1000)
            .await
            .unwrap_err();

        assert!(matches!(err, BrowserError::ElementNotFound(_)));
        assert!(!browser.calls().contains(&"click #stale".to_string()));
    }
}
