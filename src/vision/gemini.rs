use crate::core::config::VisionConfig;
use crate::core::VisionTrait;
use crate::errors::{BrowserError, Result};
use crate::gemini::GeminiClient;
use async_trait::async_trait;
use tracing::debug;

/// Screenshot analysis backed by a Gemini multimodal model.
pub struct GeminiVision {
    client: Option<GeminiClient>,
    model: String,
}

impl GeminiVision {
    /// Builds the service from config. A missing API key is not an error
    /// here; every `analyze` call fails instead, which the fallback turns
    /// into its placeholder diagnosis.
    pub fn from_config(config: &VisionConfig) -> Result<Self> {
        let client = match config.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => {
                Some(GeminiClient::new(key, config.base_url.clone())?)
            }
            _ => None,
        };
        Ok(Self {
            client,
            model: config.model.clone(),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

#[async_trait]
impl VisionTrait for GeminiVision {
    async fn analyze(&self, image_base64: &str, prompt: &str) -> Result<String> {
        let client = self
            .client
            .as_ref()
            .ok_or_else(|| BrowserError::VisionFailed("no Gemini API key configured".to_string()))?;

        debug!("Requesting screenshot analysis from {}", self.model);
        client
            .generate_text(&self.model, prompt, Some(image_base64))
            .await
            .map_err(|e| BrowserError::VisionFailed(e.to_string()))
    }
}
