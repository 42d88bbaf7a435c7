//! Shared configuration constants for htmlrender
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

/// Default render deadline: 60 seconds
///
/// Applied to the render operation itself (navigation, load settling and capture),
/// not to the time a request spends queued for a free page.
pub const DEFAULT_RENDER_TIMEOUT_MS: u64 = 60_000;

/// Default number of pooled pages (browser tabs)
///
/// Every page is a live tab inside the single Chrome process, so this is also the
/// ceiling on concurrent renders the browser is asked to perform.
pub const DEFAULT_POOL_CAPACITY: usize = 4;

/// Default viewport width in CSS pixels
pub const DEFAULT_VIEWPORT_WIDTH: u32 = 1920;

/// Default viewport height in CSS pixels
pub const DEFAULT_VIEWPORT_HEIGHT: u32 = 1080;

/// Default listen port for the HTTP adapter
pub const DEFAULT_PORT: u16 = 3033;

/// Default listen address for the HTTP adapter: all interfaces
pub const DEFAULT_BIND_ADDR: SocketAddr =
    SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, DEFAULT_PORT));

/// Default request body limit: 10 MiB of markup
pub const DEFAULT_MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// US Letter, in inches, the CDP default paper size
pub const DEFAULT_PAPER_WIDTH_IN: f64 = 8.5;
pub const DEFAULT_PAPER_HEIGHT_IN: f64 = 11.0;

/// Upper bound for the CDP request timeout of the launched browser
///
/// Individual renders are bounded by their own deadline; this only guards
/// protocol calls issued outside a render (page creation, close).
pub const CDP_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Prefix for per-launch Chrome profile directories in the temp dir
pub const PROFILE_DIR_PREFIX: &str = "kodegen_htmlrender_chrome";

/// Longest wait for a loaded document to report `readyState === 'complete'`
pub const PAGE_SETTLE_MAX_WAIT_SECS: u64 = 10;

/// Longest wait after navigation for the page's network to go quiet
///
/// Chrome reports `networkIdle` once no requests have been in flight for 500ms.
pub const NETWORK_IDLE_MAX_WAIT_SECS: u64 = 15;
