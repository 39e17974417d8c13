use crate::errors::Result;
use async_trait::async_trait;

/// A vision-capable analysis service.
///
/// Request is a base64 PNG plus a free-text prompt; response is free text.
#[async_trait]
pub trait VisionTrait: Send + Sync {
    async fn analyze(&self, image_base64: &str, prompt: &str) -> Result<String>;
}
