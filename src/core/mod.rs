pub mod browser;
pub mod config;
pub mod planner;
pub mod vision;

pub use browser::{BrowserLauncher, BrowserTrait, WaitUntil};
pub use config::Config;
pub use planner::Planner;
pub use vision::VisionTrait;
