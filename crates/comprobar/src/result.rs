//! Result and error types for Comprobar.

use thiserror::Error;

/// Result type for harness operations
pub type HarnessResult<T> = Result<T, HarnessError>;

/// Coarse classification of a [`HarnessError`].
///
/// Failures are grouped by the stage that raised them so reports and tests can
/// match on the class without caring about the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Browser could not be started or a page could not be created
    Launch,
    /// Page failed to load or settle
    Navigation,
    /// A wait or expectation never became true
    StepTimeout,
    /// Target exists but cannot receive the action
    ElementNotInteractable,
    /// A route pattern served a request it was not meant for
    RouteMismatch,
    /// Screenshot or artifact write failed
    Capture,
    /// Session lifecycle misuse
    Session,
    /// Scenario, fixture or I/O problem
    Setup,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Launch => "LaunchError",
            Self::Navigation => "NavigationError",
            Self::StepTimeout => "StepTimeoutError",
            Self::ElementNotInteractable => "ElementNotInteractableError",
            Self::RouteMismatch => "RouteMismatchError",
            Self::Capture => "CaptureError",
            Self::Session => "SessionError",
            Self::Setup => "SetupError",
        };
        f.write_str(name)
    }
}

/// Errors that can occur during a verification run
#[derive(Debug, Error)]
pub enum HarnessError {
    /// Browser launch error
    #[error("Failed to launch browser: {message}")]
    BrowserLaunch {
        /// Error message
        message: String,
    },

    /// Page error (CDP command failed outside a step)
    #[error("Page error: {message}")]
    Page {
        /// Error message
        message: String,
    },

    /// Navigation error
    #[error("Navigation to {url} failed: {message}")]
    Navigation {
        /// URL that failed
        url: String,
        /// Error message
        message: String,
    },

    /// A step's completion condition did not hold in time
    #[error("Step {index} timed out after {timeout_ms}ms waiting for {condition}")]
    StepTimeout {
        /// Zero-based step index
        index: usize,
        /// Selector or condition that did not resolve
        condition: String,
        /// Timeout that elapsed
        timeout_ms: u64,
    },

    /// Element cannot receive the action
    #[error("Step {index}: element {selector} is not interactable ({reason})")]
    ElementNotInteractable {
        /// Zero-based step index
        index: usize,
        /// Target selector
        selector: String,
        /// Why the action was refused
        reason: String,
    },

    /// Route pattern matched an unintended request
    #[error("Route {pattern} mismatch: {message}")]
    RouteMismatch {
        /// Offending pattern
        pattern: String,
        /// Details
        message: String,
    },

    /// Screenshot or artifact write error
    #[error("Capture failed: {message}")]
    Capture {
        /// Error message
        message: String,
    },

    /// A session is already live in this process
    #[error("A browser session is already active in this process")]
    SessionActive,

    /// Invalid state error (operation called in wrong state)
    #[error("Invalid state: {message}")]
    InvalidState {
        /// Error message
        message: String,
    },

    /// Fixture error
    #[error("Fixture error: {message}")]
    Fixture {
        /// Error message
        message: String,
    },

    /// Scenario configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),
}

impl HarnessError {
    /// Classify the error
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BrowserLaunch { .. } => ErrorKind::Launch,
            Self::Navigation { .. } => ErrorKind::Navigation,
            Self::StepTimeout { .. } => ErrorKind::StepTimeout,
            Self::ElementNotInteractable { .. } => ErrorKind::ElementNotInteractable,
            Self::RouteMismatch { .. } => ErrorKind::RouteMismatch,
            Self::Capture { .. } => ErrorKind::Capture,
            Self::Page { .. } | Self::SessionActive | Self::InvalidState { .. } => {
                ErrorKind::Session
            }
            Self::Fixture { .. }
            | Self::Config { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Yaml(_) => ErrorKind::Setup,
        }
    }

    /// Create a navigation error
    #[must_use]
    pub fn navigation(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Navigation {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Create a page error
    #[must_use]
    pub fn page(message: impl Into<String>) -> Self {
        Self::Page {
            message: message.into(),
        }
    }

    /// Create a configuration error
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a capture error
    #[must_use]
    pub fn capture(message: impl Into<String>) -> Self {
        Self::Capture {
            message: message.into(),
        }
    }
}
