//! Per-request render execution
//!
//! Validates the request, checks a surface out of the live pool, renders under
//! the request deadline, and classifies failures. A timeout-class failure is
//! treated as a wedged browser and triggers a background restart; the failure
//! itself is always surfaced to the caller, never retried here.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::errors::{RenderError, RenderResult};
use super::request::{RenderFormat, RenderOutput, RenderRequest, Viewport};
use super::timeout::with_render_timeout;
use crate::surface_pool::{PoolError, RenderSurface, SurfaceLease};
use crate::supervisor::{BrowserLauncher, BrowserSupervisor, RestartReason, SurfaceOf};
use crate::utils::DEFAULT_RENDER_TIMEOUT_MS;

/// Executor defaults, usually derived from [`crate::config::RenderConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutorSettings {
    /// Deadline for a render when the request sets none
    pub default_timeout: Duration,
    /// Optional bound on the time spent waiting for a free surface
    pub queue_timeout: Option<Duration>,
    pub default_viewport: Viewport,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_millis(DEFAULT_RENDER_TIMEOUT_MS),
            queue_timeout: None,
            default_viewport: Viewport::default(),
        }
    }
}

pub struct RenderExecutor<L: BrowserLauncher> {
    supervisor: Arc<BrowserSupervisor<L>>,
    settings: ExecutorSettings,
}

impl<L: BrowserLauncher> Clone for RenderExecutor<L> {
    fn clone(&self) -> Self {
        Self {
            supervisor: Arc::clone(&self.supervisor),
            settings: self.settings,
        }
    }
}

impl<L: BrowserLauncher> RenderExecutor<L> {
    pub fn new(supervisor: Arc<BrowserSupervisor<L>>, settings: ExecutorSettings) -> Self {
        Self {
            supervisor,
            settings,
        }
    }

    pub fn supervisor(&self) -> &Arc<BrowserSupervisor<L>> {
        &self.supervisor
    }

    pub fn settings(&self) -> &ExecutorSettings {
        &self.settings
    }

    /// Render a request to bytes
    ///
    /// # Errors
    /// * `Validation` - bad request, nothing was acquired
    /// * `QueueTimeout` / `Unavailable` - no surface could be obtained
    /// * `Timeout` - deadline exceeded; a browser restart has been triggered
    /// * `Navigation` / `Render` - the render itself failed
    pub async fn execute(&self, request: RenderRequest) -> RenderResult<RenderOutput> {
        let job = request.resolve(self.settings.default_viewport, self.settings.default_timeout)?;

        let lease = match self.settings.queue_timeout {
            Some(limit) => tokio::time::timeout(limit, self.acquire())
                .await
                .map_err(|_| RenderError::QueueTimeout(limit))??,
            None => self.acquire().await?,
        };
        let generation = lease.generation();

        debug!(
            generation,
            format = %job.format,
            timeout_ms = job.timeout.as_millis() as u64,
            "Rendering"
        );

        let result = with_render_timeout(
            lease.render(&job),
            job.timeout,
            operation_name(job.format),
        )
        .await;

        // Back to the issuing pool, unless the failure closed the surface
        drop(lease);

        match result {
            Ok(bytes) => Ok(RenderOutput {
                format: job.format,
                bytes,
            }),
            Err(e) if e.is_timeout() => {
                let live = self.supervisor.lifecycle().generation;
                if live == generation {
                    warn!("Render on generation {generation} timed out, restarting browser: {e}");
                    self.supervisor.trigger_restart(RestartReason::Timeout);
                } else {
                    info!(
                        "Render on stale generation {generation} timed out; generation {live} already live"
                    );
                }
                Err(e)
            }
            Err(e) => {
                debug!("Render on generation {generation} failed: {e}");
                Err(e)
            }
        }
    }

    /// Check a surface out of the live pool, following restarts
    ///
    /// A discarded pool fails its waiters; they wait for the next generation and
    /// queue again there. No render has started yet, so this is not a retry.
    async fn acquire(&self) -> RenderResult<SurfaceLease<SurfaceOf<L>>> {
        loop {
            let pool = self.supervisor.current_pool();
            match pool.acquire().await {
                Ok(lease) => return Ok(lease),
                Err(PoolError::Discarded { generation }) => {
                    debug!("Pool generation {generation} discarded while acquiring, following restart");
                    self.supervisor.wait_for_generation_after(generation).await?;
                }
            }
        }
    }
}

fn operation_name(format: RenderFormat) -> &'static str {
    if format.is_image() {
        "Screenshot"
    } else {
        "PDF export"
    }
}

