use headless_chrome::browser::ConnectionClosed;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Browser session unavailable: {0}")]
    SessionUnavailable(String),

    #[error("Another plan is already running on this session")]
    SessionBusy,

    #[error("Invalid action: {0}")]
    InvalidAction(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("{0}")]
    ResolutionFailed(String),

    #[error("{kind} failed: {message}. AI Analysis: {diagnosis}")]
    StepFailed {
        kind: String,
        message: String,
        diagnosis: String,
    },

    #[error("JavaScript execution failed: {0}")]
    JavaScriptFailed(String),

    #[error("Screenshot failed: {0}")]
    ScreenshotFailed(String),

    #[error("Timeout error: {0}")]
    TimeoutError(String),

    #[error("Vision service failed: {0}")]
    VisionFailed(String),

    #[error("API error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Planning failed: {0}")]
    PlanningFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Chrome error: {0}")]
    ChromeError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BrowserError>;

// headless_chrome reports everything through anyhow
impl From<anyhow::Error> for BrowserError {
    fn from(err: anyhow::Error) -> Self {
        BrowserError::from_driver(err, BrowserError::ChromeError)
    }
}

impl BrowserError {
    /// Map a driver error, treating a dropped DevTools connection as session
    /// loss. Anything else goes through `otherwise`.
    pub fn from_driver<F>(err: anyhow::Error, otherwise: F) -> Self
    where
        F: FnOnce(String) -> BrowserError,
    {
        if err.chain().any(|cause| cause.is::<ConnectionClosed>()) {
            BrowserError::SessionUnavailable(err.to_string())
        } else {
            otherwise(err.to_string())
        }
    }

    pub fn from_any_error<E: std::fmt::Display>(err: E) -> Self {
        BrowserError::ChromeError(err.to_string())
    }

    /// True when the live session can no longer be driven and the rest of the
    /// plan is pointless.
    pub fn is_session_failure(&self) -> bool {
        matches!(
            self,
            BrowserError::SessionUnavailable(_) | BrowserError::LaunchFailed(_)
        )
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, BrowserError::InvalidAction(_))
    }
}
