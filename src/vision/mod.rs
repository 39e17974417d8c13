pub mod fallback;
pub mod gemini;

pub use fallback::{failure_context, parse_pick, VisionFallback, UNAVAILABLE_DIAGNOSIS};
pub use gemini::GeminiVision;
