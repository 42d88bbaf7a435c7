//! Render request and output types
//!
//! A [`RenderRequest`] is what the boundary adapter hands to the executor. It is
//! resolved into a [`RenderJob`] (validated format, effective viewport, effective
//! deadline) before any page is acquired.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

use super::errors::RenderError;
use crate::utils::{DEFAULT_PAPER_HEIGHT_IN, DEFAULT_PAPER_WIDTH_IN};

/// What to render: literal markup or a remote document
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderSource {
    /// Loaded straight into the page, no network round-trip for the document itself
    Markup(String),
    /// Navigated to; capture waits for the page to settle
    Url(String),
}

impl RenderSource {
    pub fn markup(html: impl Into<String>) -> Self {
        Self::Markup(html.into())
    }

    pub fn url(url: impl Into<String>) -> Self {
        Self::Url(url.into())
    }

    fn validate(&self) -> Result<(), RenderError> {
        match self {
            Self::Markup(html) if html.trim().is_empty() => {
                Err(RenderError::validation("'html' must not be empty"))
            }
            Self::Url(raw) => {
                let parsed = Url::parse(raw.trim())
                    .map_err(|e| RenderError::validation(format!("Invalid URL '{raw}': {e}")))?;
                match parsed.scheme() {
                    "http" | "https" | "file" | "data" => Ok(()),
                    other => Err(RenderError::validation(format!(
                        "Unsupported URL scheme '{other}'"
                    ))),
                }
            }
            Self::Markup(_) => Ok(()),
        }
    }
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderFormat {
    Png,
    Jpeg,
    Webp,
    Pdf,
}

impl RenderFormat {
    /// Format used when a request names none
    pub const DEFAULT: Self = Self::Jpeg;

    #[must_use]
    pub const fn content_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
            Self::Webp => "image/webp",
            Self::Pdf => "application/pdf",
        }
    }

    #[must_use]
    pub const fn is_image(&self) -> bool {
        !matches!(self, Self::Pdf)
    }

    /// Whether the encoder honours a quality setting
    #[must_use]
    pub const fn is_lossy(&self) -> bool {
        matches!(self, Self::Jpeg | Self::Webp)
    }

    /// Resolve an optional raw format name, defaulting when absent
    pub fn resolve(raw: Option<&str>) -> Result<Self, RenderError> {
        match raw {
            None => Ok(Self::DEFAULT),
            Some(name) => name.parse(),
        }
    }
}

impl FromStr for RenderFormat {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" => Ok(Self::Png),
            "jpg" | "jpeg" => Ok(Self::Jpeg),
            "webp" => Ok(Self::Webp),
            "pdf" => Ok(Self::Pdf),
            other => Err(RenderError::validation(format!(
                "Unsupported format '{other}': expected one of png, jpg, jpeg, webp, pdf"
            ))),
        }
    }
}

impl fmt::Display for RenderFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Png => "png",
            Self::Jpeg => "jpeg",
            Self::Webp => "webp",
            Self::Pdf => "pdf",
        };
        f.write_str(name)
    }
}

/// Viewport size in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(
            crate::utils::DEFAULT_VIEWPORT_WIDTH,
            crate::utils::DEFAULT_VIEWPORT_HEIGHT,
        )
    }
}

/// PDF export arguments; every field falls back to the CDP default when absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PdfOptions {
    pub landscape: Option<bool>,
    pub print_background: Option<bool>,
    pub scale: Option<f64>,
    /// Inches
    pub paper_width: Option<f64>,
    /// Inches
    pub paper_height: Option<f64>,
    pub margin_top: Option<f64>,
    pub margin_bottom: Option<f64>,
    pub margin_left: Option<f64>,
    pub margin_right: Option<f64>,
    /// e.g. "1-5, 8"
    pub page_ranges: Option<String>,
    pub prefer_css_page_size: Option<bool>,
}

impl PdfOptions {
    #[must_use]
    pub fn paper_width(&self) -> f64 {
        self.paper_width.unwrap_or(DEFAULT_PAPER_WIDTH_IN)
    }

    #[must_use]
    pub fn paper_height(&self) -> f64 {
        self.paper_height.unwrap_or(DEFAULT_PAPER_HEIGHT_IN)
    }

    #[must_use]
    pub fn print_background(&self) -> bool {
        self.print_background.unwrap_or(true)
    }
}

/// Caller-supplied render options
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RenderOptions {
    /// Accepted here for compatibility with bodies that nest the format in options
    pub format: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Capture the whole scrollable page instead of the viewport
    pub full_page: Option<bool>,
    /// 0-100, JPEG and WebP only
    pub quality: Option<u8>,
    pub omit_background: Option<bool>,
    /// Per-request deadline override
    pub timeout_ms: Option<u64>,
    pub pdf: PdfOptions,
}

/// A render request as handed over by the boundary adapter
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub source: RenderSource,
    /// Raw format name, resolved and validated by the executor
    pub format: Option<String>,
    pub options: RenderOptions,
}

impl RenderRequest {
    pub fn new(source: RenderSource) -> Self {
        Self {
            source,
            format: None,
            options: RenderOptions::default(),
        }
    }

    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    #[must_use]
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout_ms = Some(u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX));
        self
    }

    /// Validate and resolve into a job using the executor defaults
    pub fn resolve(
        self,
        default_viewport: Viewport,
        default_timeout: Duration,
    ) -> Result<RenderJob, RenderError> {
        self.source.validate()?;

        let raw_format = self.format.as_deref().or(self.options.format.as_deref());
        let format = RenderFormat::resolve(raw_format)?;

        let viewport = Viewport::new(
            self.options.width.unwrap_or(default_viewport.width),
            self.options.height.unwrap_or(default_viewport.height),
        );
        if viewport.width == 0 || viewport.height == 0 {
            return Err(RenderError::validation(
                "Viewport width and height must be greater than zero",
            ));
        }

        if let Some(quality) = self.options.quality {
            if quality > 100 {
                return Err(RenderError::validation(format!(
                    "quality must be between 0 and 100, got {quality}"
                )));
            }
            if !format.is_lossy() {
                return Err(RenderError::validation(format!(
                    "quality is only supported for jpeg and webp, not {format}"
                )));
            }
        }

        if format == RenderFormat::Pdf
            && let Some(scale) = self.options.pdf.scale
            && !(0.1..=2.0).contains(&scale)
        {
            return Err(RenderError::validation(format!(
                "pdf.scale must be between 0.1 and 2.0, got {scale}"
            )));
        }

        let timeout = match self.options.timeout_ms {
            Some(0) => {
                return Err(RenderError::validation("timeoutMs must be greater than zero"));
            }
            Some(ms) => Duration::from_millis(ms),
            None => default_timeout,
        };

        Ok(RenderJob {
            source: self.source,
            format,
            viewport,
            full_page: self.options.full_page.unwrap_or(false),
            quality: self.options.quality,
            omit_background: self.options.omit_background.unwrap_or(false),
            pdf: self.options.pdf,
            timeout,
        })
    }
}

/// A validated render, ready for a page
#[derive(Debug, Clone, PartialEq)]
pub struct RenderJob {
    pub source: RenderSource,
    pub format: RenderFormat,
    pub viewport: Viewport,
    pub full_page: bool,
    pub quality: Option<u8>,
    pub omit_background: bool,
    pub pdf: PdfOptions,
    /// Effective deadline for the render operation
    pub timeout: Duration,
}

/// Rendered bytes plus their media type
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub format: RenderFormat,
    pub bytes: Vec<u8>,
}

impl RenderOutput {
    #[must_use]
    pub fn content_type(&self) -> &'static str {
        self.format.content_type()
    }
}
