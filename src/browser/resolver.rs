use crate::core::BrowserTrait;
use futures::stream::{FuturesUnordered, StreamExt};
use std::time::Duration;
use tracing::debug;

/// Races locator candidates against the live document.
pub struct SelectorResolver<'a> {
    browser: &'a dyn BrowserTrait,
}

impl<'a> SelectorResolver<'a> {
    pub fn new(browser: &'a dyn BrowserTrait) -> Self {
        Self { browser }
    }

    /// Probe every candidate at once, each bounded to half the budget, and
    /// return whichever attaches first.
    ///
    /// The winner is decided by completion order, not list position. Losing
    /// probes are dropped, not awaited. `None` means nothing attached within
    /// `budget_ms`.
    pub async fn resolve(&self, candidates: &[String], budget_ms: u64) -> Option<String> {
        if candidates.is_empty() {
            return None;
        }

        let probe_ms = (budget_ms / 2).max(1);
        let mut probes: FuturesUnordered<_> = candidates
            .iter()
            .map(|candidate| async move {
                let probe = self.browser.wait_for_selector(candidate, probe_ms);
                match tokio::time::timeout(Duration::from_millis(probe_ms), probe).await {
                    Ok(Ok(())) => Some(candidate.clone()),
                    _ => None,
                }
            })
            .collect();

        let race = async {
            while let Some(outcome) = probes.next().await {
                if outcome.is_some() {
                    return outcome;
                }
            }
            None
        };

        match tokio::time::timeout(Duration::from_millis(budget_ms), race).await {
            Ok(Some(found)) => {
                debug!("Found element with selector: \"{}\"", found);
                Some(found)
            }
            _ => {
                debug!("None of the {} selectors worked", candidates.len());
                None
            }
        }
    }
}
