use crate::core::BrowserTrait;
use crate::errors::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A captured page image. Created once and never modified.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenshotArtifact {
    pub timestamp_ms: i64,
    pub description: String,
    /// Base64 PNG of the whole document.
    pub full_page_image: String,
    /// Base64 PNG of the visible viewport.
    pub viewport_image: String,
    /// File name under the screenshot directory, if it was written to disk.
    pub storage_path: Option<String>,
    pub url: String,
    pub title: String,
}

pub struct ScreenshotManager;

impl ScreenshotManager {
    pub async fn take_base64(browser: &dyn BrowserTrait, full_page: bool) -> Result<String> {
        let bytes = browser.screenshot(full_page).await?;
        Ok(STANDARD.encode(bytes))
    }

    /// Capture full-page and viewport images and, when `output_dir` is set,
    /// write the full-page image to `screenshot_<timestamp>.png`.
    pub async fn capture(
        browser: &dyn BrowserTrait,
        description: &str,
        output_dir: Option<&Path>,
    ) -> Result<ScreenshotArtifact> {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let full_page = browser.screenshot(true).await?;
        let viewport = browser.screenshot(false).await?;
        let url = browser.url().await?;
        let title = browser.title().await.unwrap_or_default();

        let storage_path = match output_dir {
            Some(dir) => match Self::save_to_file(dir, timestamp_ms, &full_page).await {
                Ok(name) => Some(name),
                Err(e) => {
                    warn!("Could not persist screenshot to {}: {}", dir.display(), e);
                    None
                }
            },
            None => None,
        };

        Ok(ScreenshotArtifact {
            timestamp_ms,
            description: description.to_string(),
            full_page_image: STANDARD.encode(&full_page),
            viewport_image: STANDARD.encode(&viewport),
            storage_path,
            url,
            title,
        })
    }

    async fn save_to_file(dir: &Path, timestamp_ms: i64, bytes: &[u8]) -> Result<String> {
        tokio::fs::create_dir_all(dir).await?;

        let mut name = format!("screenshot_{}.png", timestamp_ms);
        let mut suffix = 1;
        while tokio::fs::try_exists(dir.join(&name)).await? {
            name = format!("screenshot_{}_{}.png", timestamp_ms, suffix);
            suffix += 1;
        }

        let path: PathBuf = dir.join(&name);
        tokio::fs::write(&path, bytes).await?;
        debug!("Screenshot written to {}", path.display());
        Ok(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBrowser;

    #[tokio::test]
    async fn capture_encodes_both_images_and_persists() {
        let browser = MockBrowser::new().with_url("https://example.test/").with_title("Example");
        let dir = tempfile::tempdir().unwrap();

        let first = ScreenshotManager::capture(&browser, "landing", Some(dir.path()))
            .await
            .unwrap();
        let second = ScreenshotManager::capture(&browser, "again", Some(dir.path()))
            .await
            .unwrap();

        assert_eq!(first.url, "https://example.test/");
        assert_eq!(first.title, "Example");
        assert_eq!(first.full_page_image, STANDARD.encode(MockBrowser::FULL_PAGE_PNG));
        assert_eq!(first.viewport_image, STANDARD.encode(MockBrowser::VIEWPORT_PNG));

        let first_path = first.storage_path.unwrap();
        let second_path = second.storage_path.unwrap();
        assert!(first_path.starts_with("screenshot_"));
        assert_ne!(first_path, second_path);
        let written = std::fs::read(dir.path().join(&first_path)).unwrap();
        assert_eq!(written, MockBrowser::FULL_PAGE_PNG);
    }

    #[tokio::test]
    async fn capture_without_directory_stays_in_memory() {
        let browser = MockBrowser::new();
        let artifact = ScreenshotManager::capture(&browser, "inline", None).await.unwrap();
        assert!(artifact.storage_path.is_none());
        assert_eq!(artifact.description, "inline");
    }
}
