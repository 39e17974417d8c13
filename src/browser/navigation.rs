use crate::core::config::NavigationConfig;
use crate::core::{BrowserTrait, WaitUntil};
use crate::errors::{BrowserError, Result};
use std::time::{Duration, Instant};
use tracing::{info, warn};

pub struct NavigationManager;

impl NavigationManager {
    /// Navigate with escalating wait conditions.
    ///
    /// Early attempts only wait for the document to be parsed; later ones
    /// wait for `load` and then for the network to go quiet, because
    /// script-heavy pages may never settle quickly. The last failure is
    /// returned once `max_attempts` is exhausted.
    pub async fn navigate_with_retry(
        browser: &dyn BrowserTrait,
        url: &str,
        max_attempts: u32,
        config: &NavigationConfig,
    ) -> Result<NavigationResult> {
        let start_time = Instant::now();
        let max_attempts = max_attempts.max(1);
        let mut last_error = None;

        for attempt in 0..max_attempts {
            let step = config.attempt(attempt);
            info!(
                "Navigation attempt {}/{} to {} (wait until {}, {}ms)",
                attempt + 1,
                max_attempts,
                url,
                step.wait_until,
                step.timeout_ms
            );

            match browser.goto(url, step.wait_until, step.timeout_ms).await {
                Ok(()) => {
                    info!("Successfully navigated to {}", url);
                    return Ok(NavigationResult {
                        url: url.to_string(),
                        attempts: attempt + 1,
                        wait_until: step.wait_until,
                        duration_ms: start_time.elapsed().as_millis() as u64,
                    });
                }
                Err(e) if e.is_session_failure() => return Err(e),
                Err(e) => {
                    warn!("Navigation attempt {} failed: {}", attempt + 1, e);
                    last_error = Some(e);
                    if attempt + 1 < max_attempts {
                        tokio::time::sleep(Duration::from_millis(config.backoff_ms)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            BrowserError::NavigationFailed(format!("could not navigate to {}", url))
        }))
    }
}

#[derive(Debug, Clone)]
pub struct NavigationResult {
    pub url: String,
    pub attempts: u32,
    pub wait_until: WaitUntil,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBrowser;

    #[tokio::test(start_paused = true)]
    async fn escalates_wait_conditions_until_success() {
        let browser = MockBrowser::new().failing_navigations(2);
        let config = NavigationConfig::default();

        let result =
            NavigationManager::navigate_with_retry(&browser, "https://slow.test/", 3, &config)
                .await
                .unwrap();

        assert_eq!(result.attempts, 3);
        assert_eq!(result.wait_until, WaitUntil::NetworkIdle);
        assert_eq!(
            browser.navigations(),
            vec![
                ("https://slow.test/".to_string(), WaitUntil::DomContentLoaded, 8000),
                ("https://slow.test/".to_string(), WaitUntil::Load, 12000),
                ("https://slow.test/".to_string(), WaitUntil::NetworkIdle, 15000),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn propagates_last_failure_after_exhausting_attempts() {
        let browser = MockBrowser::new().failing_navigations(5);
        let config = NavigationConfig::default();

        let err = NavigationManager::navigate_with_retry(&browser, "https://down.test/", 2, &config)
            .await
            .unwrap_err();

        assert!(matches!(err, BrowserError::NavigationFailed(_)));
        assert!(err.to_string().contains("attempt 2"));
        assert_eq!(browser.navigations().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_success_needs_no_backoff() {
        let browser = MockBrowser::new();
        let config = NavigationConfig::default();
        let started = tokio::time::Instant::now();

        let result = NavigationManager::navigate_with_retry(&browser, "https://ok.test/", 3, &config)
            .await
            .unwrap();

        assert_eq!(result.attempts, 1);
        assert_eq!(result.url, "https://ok.test/");
        assert!(started.elapsed() < Duration::from_millis(config.backoff_ms));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_out_the_backoff_between_attempts() {
        let browser = MockBrowser::new().failing_navigations(2);
        let config = NavigationConfig::default();
        let started = tokio::time::Instant::now();

        NavigationManager::navigate_with_retry(&browser, "https://slow.test/", 3, &config)
            .await
            .unwrap();

        // two failed attempts, each followed by a pause
        assert!(started.elapsed() >= Duration::from_millis(2 * config.backoff_ms));
    }

    #[tokio::test(start_paused = true)]
    async fn session_loss_is_not_retried() {
        let browser = MockBrowser::new().crashing_navigation();
        let config = NavigationConfig::default();
        let started = tokio::time::Instant::now();

        let err = NavigationManager::navigate_with_retry(&browser, "https://crash.test/", 3, &config)
            .await
            .unwrap_err();

        assert!(err.is_session_failure());
        assert_eq!(browser.navigations().len(), 1);
        assert!(started.elapsed() < Duration::from_millis(config.backoff_ms));
    }
}
