pub mod client;
pub mod types;

pub use client::{GeminiClient, DEFAULT_BASE_URL};
pub use types::{GenerateContentRequest, GenerateContentResponse};
