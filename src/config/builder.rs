//! Fluent builder for `RenderConfig`
//!
//! Every field has a working default; `build()` rejects values the service
//! cannot run with.

use anyhow::{Result, ensure};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use super::types::{LogFormat, RenderConfig};
use crate::render::Viewport;
use crate::utils::{
    DEFAULT_BIND_ADDR, DEFAULT_MAX_BODY_BYTES, DEFAULT_POOL_CAPACITY, DEFAULT_RENDER_TIMEOUT_MS,
};

#[derive(Debug, Clone)]
pub struct RenderConfigBuilder {
    pub(crate) render_timeout: Duration,
    pub(crate) pool_size: usize,
    pub(crate) viewport: Viewport,
    pub(crate) queue_timeout: Option<Duration>,
    pub(crate) bind_addr: SocketAddr,
    pub(crate) headless: bool,
    pub(crate) max_body_bytes: usize,
    pub(crate) log_format: LogFormat,
    pub(crate) chromium_path: Option<PathBuf>,
}

impl Default for RenderConfigBuilder {
    fn default() -> Self {
        Self {
            render_timeout: Duration::from_millis(DEFAULT_RENDER_TIMEOUT_MS),
            pool_size: DEFAULT_POOL_CAPACITY,
            viewport: Viewport::default(),
            queue_timeout: None,
            bind_addr: DEFAULT_BIND_ADDR,
            headless: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            log_format: LogFormat::default(),
            chromium_path: None,
        }
    }
}

impl RenderConfigBuilder {
    /// Deadline for one render operation
    #[must_use]
    pub fn render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }

    /// Number of pooled tabs (render concurrency ceiling)
    #[must_use]
    pub fn pool_size(mut self, size: usize) -> Self {
        self.pool_size = size;
        self
    }

    #[must_use]
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Viewport::new(width, height);
        self
    }

    /// Bound the time a request may wait for a free tab
    ///
    /// `None` (the default) lets requests queue until a tab frees up.
    #[must_use]
    pub fn queue_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.queue_timeout = timeout;
        self
    }

    #[must_use]
    pub fn bind_addr(mut self, addr: SocketAddr) -> Self {
        self.bind_addr = addr;
        self
    }

    #[must_use]
    pub fn headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    #[must_use]
    pub fn max_body_bytes(mut self, bytes: usize) -> Self {
        self.max_body_bytes = bytes;
        self
    }

    #[must_use]
    pub fn log_format(mut self, format: LogFormat) -> Self {
        self.log_format = format;
        self
    }

    #[must_use]
    pub fn chromium_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Validate and build the configuration
    ///
    /// # Errors
    ///
    /// Returns an error if the pool size, a viewport dimension, a timeout or the
    /// body limit is zero.
    pub fn build(self) -> Result<RenderConfig> {
        ensure!(self.pool_size > 0, "pool size must be at least 1");
        ensure!(
            self.viewport.width > 0 && self.viewport.height > 0,
            "viewport must be non-zero, got {}x{}",
            self.viewport.width,
            self.viewport.height
        );
        ensure!(
            !self.render_timeout.is_zero(),
            "render timeout must be greater than zero"
        );
        if let Some(queue_timeout) = self.queue_timeout {
            ensure!(
                !queue_timeout.is_zero(),
                "queue timeout must be greater than zero when set"
            );
        }
        ensure!(self.max_body_bytes > 0, "max body size must be greater than zero");

        Ok(self.into_config())
    }

    pub(crate) fn into_config(self) -> RenderConfig {
        RenderConfig {
            render_timeout: self.render_timeout,
            pool_size: self.pool_size,
            viewport: self.viewport,
            queue_timeout: self.queue_timeout,
            bind_addr: self.bind_addr,
            headless: self.headless,
            max_body_bytes: self.max_body_bytes,
            log_format: self.log_format,
            chromium_path: self.chromium_path,
        }
    }
}
