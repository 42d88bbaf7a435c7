//! Core configuration types for the render service

use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::render::Viewport;

/// Main configuration struct, built via [`super::RenderConfigBuilder`] or
/// [`RenderConfig::from_env`]
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    /// Deadline for one render operation (navigation, settling and capture)
    pub(crate) render_timeout: Duration,

    /// Number of pooled tabs, and therefore the render concurrency ceiling
    pub(crate) pool_size: usize,

    pub(crate) viewport: Viewport,

    /// Optional bound on waiting for a free tab
    ///
    /// When unset, requests queue until a tab frees up.
    pub(crate) queue_timeout: Option<Duration>,

    pub(crate) bind_addr: SocketAddr,
    pub(crate) headless: bool,
    pub(crate) max_body_bytes: usize,
    pub(crate) log_format: LogFormat,

    /// Explicit browser executable; auto-detected (or downloaded) when unset
    pub(crate) chromium_path: Option<PathBuf>,
}

/// Output format of the log subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "compact" | "text" => Ok(Self::Compact),
            "json" => Ok(Self::Json),
            other => Err(anyhow::anyhow!(
                "Unknown log format '{other}': expected 'compact' or 'json'"
            )),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compact => f.write_str("compact"),
            Self::Json => f.write_str("json"),
        }
    }
}
