pub mod chrome;
pub mod navigation;
pub mod resolver;
pub mod session;

pub use chrome::{ChromeBrowser, ChromeLauncher};
pub use navigation::{NavigationManager, NavigationResult};
pub use resolver::SelectorResolver;
pub use session::SessionManager;
