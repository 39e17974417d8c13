pub mod javascript;
pub mod screenshot;

pub use javascript::JavaScriptRunner;
pub use screenshot::{ScreenshotArtifact, ScreenshotManager};
