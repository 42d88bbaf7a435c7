//! Chromium-backed browser, process and render surface
//!
//! [`ChromeLauncher`] starts one headless Chromium per generation through
//! chromiumoxide; [`ChromeSurface`] is a single tab that loads a job's source and
//! captures it as an image or a PDF.

pub mod page_load;

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::{CaptureScreenshotFormat, PrintToPdfParams};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, Page};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::browser_profile::{BrowserProfile, create_unique_profile};
use crate::browser_setup::{LaunchSettings, LaunchedBrowser, launch_browser};
use crate::render::{RenderError, RenderFormat, RenderJob, RenderSource, Viewport};
use crate::supervisor::{BrowserLauncher, BrowserProcess};
use crate::surface_pool::RenderSurface;
use crate::utils::constants::{
    CDP_REQUEST_TIMEOUT_SECS, NETWORK_IDLE_MAX_WAIT_SECS, PAGE_SETTLE_MAX_WAIT_SECS,
};
use page_load::{network_idle_events, wait_for_network_idle, wait_for_page_settle};

// =============================================================================
// Launcher
// =============================================================================

#[derive(Debug, Clone)]
pub struct ChromeLauncher {
    settings: LaunchSettings,
}

impl ChromeLauncher {
    pub fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }
}

impl BrowserLauncher for ChromeLauncher {
    type Process = ChromeProcess;

    async fn launch(&self) -> Result<ChromeProcess> {
        let profile = create_unique_profile()?;
        let LaunchedBrowser {
            browser,
            handler,
            disconnected,
        } = launch_browser(&self.settings, profile.path()).await?;

        info!(
            "Chrome launched (headless: {}, profile: {})",
            self.settings.headless,
            profile.path().display()
        );

        Ok(ChromeProcess {
            browser,
            handler,
            disconnected,
            profile: Some(profile),
            viewport: self.settings.window,
            closed: false,
        })
    }
}

// =============================================================================
// Process
// =============================================================================

pub struct ChromeProcess {
    browser: Browser,
    handler: JoinHandle<()>,
    disconnected: watch::Receiver<bool>,
    /// Removed from disk when the process is closed
    profile: Option<BrowserProfile>,
    viewport: Viewport,
    closed: bool,
}

impl BrowserProcess for ChromeProcess {
    type Surface = ChromeSurface;

    async fn open_surface(&self) -> Result<ChromeSurface> {
        let page = self
            .browser
            .new_page("about:blank")
            .await
            .context("Failed to open browser tab")?;
        page.execute(viewport_params(self.viewport).map_err(anyhow::Error::msg)?)
            .await
            .context("Failed to size browser tab")?;
        Ok(ChromeSurface::new(page))
    }

    fn disconnected(&self) -> impl std::future::Future<Output = ()> + Send + 'static {
        let mut rx = self.disconnected.clone();
        async move {
            // A dropped sender means the handler task is gone, which is a disconnect too
            let _ = rx.wait_for(|gone| *gone).await;
        }
    }

    async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        let deadline = Duration::from_secs(CDP_REQUEST_TIMEOUT_SECS);
        let graceful = match tokio::time::timeout(deadline, self.browser.close()).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(anyhow::anyhow!("Browser.close failed: {e}")),
            Err(_) => Err(anyhow::anyhow!("Browser.close timed out after {deadline:?}")),
        };

        if let Err(e) = &graceful {
            warn!("{e}, killing browser process");
            if let Some(Err(kill_err)) = self.browser.kill().await {
                warn!("Failed to kill browser process: {kill_err}");
            }
        }
        match tokio::time::timeout(deadline, self.browser.wait()).await {
            Ok(Ok(status)) => debug!("Browser process exited: {status:?}"),
            Ok(Err(e)) => debug!("Failed to wait for browser process: {e}"),
            Err(_) => debug!("Browser process did not exit within {deadline:?}"),
        }

        self.handler.abort();
        drop(self.profile.take());

        graceful
    }
}

impl Drop for ChromeProcess {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

// =============================================================================
// Surface
// =============================================================================

/// One browser tab
pub struct ChromeSurface {
    page: Page,
    open: AtomicBool,
}

impl ChromeSurface {
    fn new(page: Page) -> Self {
        Self {
            page,
            open: AtomicBool::new(true),
        }
    }

    async fn load(&self, job: &RenderJob) -> Result<(), RenderError> {
        match &job.source {
            RenderSource::Markup(html) => {
                // Start from a clean document so nothing of the previous render leaks in
                self.page
                    .goto("about:blank")
                    .await
                    .map_err(|e| self.classify(e, "Failed to reset page"))?;
                self.page
                    .set_content(html)
                    .await
                    .map_err(|e| self.classify(e, "Failed to load markup"))?;
            }
            RenderSource::Url(url) => {
                let idle_events = match network_idle_events(&self.page).await {
                    Ok(events) => Some(events),
                    Err(e) => {
                        debug!("Lifecycle events unavailable, skipping network idle wait: {e}");
                        None
                    }
                };
                let main_frame = self.page.mainframe().await.ok().flatten();

                self.page
                    .goto(url.trim())
                    .await
                    .map_err(|e| self.classify_navigation(e, url))?;
                self.page
                    .wait_for_navigation()
                    .await
                    .map_err(|e| self.classify_navigation(e, url))?;

                if let Some(mut events) = idle_events {
                    let max_wait = job
                        .timeout
                        .min(Duration::from_secs(NETWORK_IDLE_MAX_WAIT_SECS));
                    wait_for_network_idle(
                        &mut events,
                        main_frame.as_ref().map(|frame| frame.inner().as_str()),
                        max_wait,
                    )
                    .await;
                }
            }
        }

        wait_for_page_settle(&self.page, Duration::from_secs(PAGE_SETTLE_MAX_WAIT_SECS)).await;
        Ok(())
    }

    async fn capture(&self, job: &RenderJob) -> Result<Vec<u8>, RenderError> {
        if job.format == RenderFormat::Pdf {
            let pdf = &job.pdf;
            let params = PrintToPdfParams {
                landscape: pdf.landscape,
                print_background: Some(pdf.print_background()),
                scale: pdf.scale,
                paper_width: Some(pdf.paper_width()),
                paper_height: Some(pdf.paper_height()),
                margin_top: pdf.margin_top,
                margin_bottom: pdf.margin_bottom,
                margin_left: pdf.margin_left,
                margin_right: pdf.margin_right,
                page_ranges: pdf.page_ranges.clone(),
                prefer_css_page_size: pdf.prefer_css_page_size,
                ..Default::default()
            };
            return self
                .page
                .pdf(params)
                .await
                .map_err(|e| self.classify(e, "Failed to print PDF"));
        }

        let format = match job.format {
            RenderFormat::Png => CaptureScreenshotFormat::Png,
            RenderFormat::Webp => CaptureScreenshotFormat::Webp,
            _ => CaptureScreenshotFormat::Jpeg,
        };
        let mut params = ScreenshotParams::builder()
            .format(format)
            .full_page(job.full_page)
            .omit_background(job.omit_background);
        if let Some(quality) = job.quality {
            params = params.quality(i64::from(quality));
        }

        self.page
            .screenshot(params.build())
            .await
            .map_err(|e| self.classify(e, "Failed to capture screenshot"))
    }

    /// Map a CDP failure to a render error, closing the surface if its connection is gone
    fn classify(&self, err: CdpError, context: &str) -> RenderError {
        match err {
            CdpError::Timeout => RenderError::timeout(format!("{context}: browser call timed out")),
            CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse => {
                self.open.store(false, Ordering::Release);
                RenderError::render(format!("{context}: browser connection lost: {err}"))
            }
            other => RenderError::render(format!("{context}: {other}")),
        }
    }

    fn classify_navigation(&self, err: CdpError, url: &str) -> RenderError {
        match err {
            CdpError::Timeout
            | CdpError::Ws(_)
            | CdpError::ChannelSendError(_)
            | CdpError::NoResponse => self.classify(err, &format!("Navigation to {url}")),
            other => RenderError::navigation(format!("Navigation to {url} failed: {other}")),
        }
    }
}

impl RenderSurface for ChromeSurface {
    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    async fn render(&self, job: &RenderJob) -> Result<Vec<u8>, RenderError> {
        let params = viewport_params(job.viewport).map_err(RenderError::render)?;
        self.page
            .execute(params)
            .await
            .map_err(|e| self.classify(e, "Failed to set viewport"))?;

        self.load(job).await?;
        self.capture(job).await
    }

    async fn close(self) -> Result<()> {
        self.open.store(false, Ordering::Release);
        self.page
            .close()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to close browser tab: {e}"))
    }
}

fn viewport_params(viewport: Viewport) -> Result<SetDeviceMetricsOverrideParams, String> {
    SetDeviceMetricsOverrideParams::builder()
        .width(i64::from(viewport.width))
        .height(i64::from(viewport.height))
        .device_scale_factor(1.0)
        .mobile(false)
        .build()
}
