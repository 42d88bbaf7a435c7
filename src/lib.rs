//! Headless-browser render service: HTML or URLs in, images or PDFs out
//!
//! One Chromium process serves every render through a fixed pool of tabs.
//! [`BrowserSupervisor`] owns the process and pool and rebuilds both when the
//! browser disconnects or a render hangs; [`RenderExecutor`] runs one request
//! against the live pool under a deadline; [`http::build_router`] exposes it all
//! over HTTP.

pub mod browser_profile;
pub mod browser_setup;
pub mod chrome;
pub mod config;
pub mod http;
pub mod render;
pub mod supervisor;
pub mod surface_pool;
pub mod telemetry;
pub mod utils;

pub use browser_setup::{
    LaunchSettings, download_managed_browser, find_browser_executable, launch_browser,
};
pub use chrome::{ChromeLauncher, ChromeProcess, ChromeSurface};
pub use config::{LogFormat, RenderConfig, RenderConfigBuilder};
pub use render::{
    ExecutorSettings, PdfOptions, RenderError, RenderErrorKind, RenderExecutor, RenderFormat,
    RenderJob, RenderOptions, RenderOutput, RenderRequest, RenderResult, RenderSource, Viewport,
};
pub use supervisor::{
    BrowserLauncher, BrowserProcess, BrowserSupervisor, Lifecycle, RestartOutcome, RestartReason,
    SupervisorState, SupervisorStatus,
};
pub use surface_pool::{PoolError, PoolStats, RenderSurface, RenderSurfacePool, SurfaceLease};
