//! Accessors and derived settings for `RenderConfig`

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use super::builder::RenderConfigBuilder;
use super::types::{LogFormat, RenderConfig};
use crate::browser_setup::LaunchSettings;
use crate::render::{ExecutorSettings, Viewport};

impl RenderConfig {
    #[must_use]
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder::default()
    }

    #[must_use]
    pub fn render_timeout(&self) -> Duration {
        self.render_timeout
    }

    #[must_use]
    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    #[must_use]
    pub fn queue_timeout(&self) -> Option<Duration> {
        self.queue_timeout
    }

    #[must_use]
    pub fn bind_addr(&self) -> SocketAddr {
        self.bind_addr
    }

    #[must_use]
    pub fn headless(&self) -> bool {
        self.headless
    }

    #[must_use]
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }

    #[must_use]
    pub fn log_format(&self) -> LogFormat {
        self.log_format
    }

    #[must_use]
    pub fn chromium_path(&self) -> Option<&Path> {
        self.chromium_path.as_deref()
    }

    /// Defaults handed to the render executor
    #[must_use]
    pub fn executor_settings(&self) -> ExecutorSettings {
        ExecutorSettings {
            default_timeout: self.render_timeout,
            queue_timeout: self.queue_timeout,
            default_viewport: self.viewport,
        }
    }

    /// Settings for every browser launch, first one and restarts alike
    #[must_use]
    pub fn launch_settings(&self) -> LaunchSettings {
        LaunchSettings {
            headless: self.headless,
            window: self.viewport,
            executable: self.chromium_path.clone(),
        }
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfigBuilder::default().into_config()
    }
}
