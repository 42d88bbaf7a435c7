//! Error types for render operations
//!
//! Errors carry an intent-neutral kind that the boundary adapter translates
//! into its own status codes. Timeout classification is structural: the code
//! path that detects the deadline or a stalled protocol call builds a
//! `Timeout` variant, nothing inspects message text.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for render operations
pub type RenderResult<T> = Result<T, RenderError>;

/// Error types for render operations
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    /// Malformed or incomplete request; never retried, never restarts the browser
    #[error("Invalid render request: {0}")]
    Validation(String),

    /// The browser could not load the given source
    #[error("Navigation failed: {0}")]
    Navigation(String),

    /// The render exceeded its deadline or the browser reported a stalled call
    #[error("Render timed out: {0}")]
    Timeout(String),

    /// Any other failure reported while rendering
    #[error("Render failed: {0}")]
    Render(String),

    /// No browser is available (supervisor closed or failed to relaunch)
    #[error("Renderer unavailable: {0}")]
    Unavailable(String),

    /// Waiting for a free page exceeded the configured queue timeout
    #[error("Timed out after {0:?} waiting for a free render page")]
    QueueTimeout(Duration),
}

/// Coarse classification of a [`RenderError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderErrorKind {
    Validation,
    Navigation,
    Timeout,
    Render,
    Unavailable,
    QueueTimeout,
}

impl RenderError {
    #[must_use]
    pub fn kind(&self) -> RenderErrorKind {
        match self {
            Self::Validation(_) => RenderErrorKind::Validation,
            Self::Navigation(_) => RenderErrorKind::Navigation,
            Self::Timeout(_) => RenderErrorKind::Timeout,
            Self::Render(_) => RenderErrorKind::Render,
            Self::Unavailable(_) => RenderErrorKind::Unavailable,
            Self::QueueTimeout(_) => RenderErrorKind::QueueTimeout,
        }
    }

    /// Whether this failure is evidence of a wedged browser and should trigger a restart
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn navigation(msg: impl Into<String>) -> Self {
        Self::Navigation(msg.into())
    }

    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn render(msg: impl Into<String>) -> Self {
        Self::Render(msg.into())
    }

    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }
}

impl From<anyhow::Error> for RenderError {
    fn from(err: anyhow::Error) -> Self {
        // {:#} keeps the context chain
        Self::Render(format!("{err:#}"))
    }
}
