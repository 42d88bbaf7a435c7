//! Render requests, errors and execution
//!
//! The executor turns a [`RenderRequest`] into bytes using a surface checked out
//! of the supervisor's live pool.

pub mod errors;
pub mod executor;
pub mod request;
pub mod timeout;

pub use errors::{RenderError, RenderErrorKind, RenderResult};
pub use executor::{ExecutorSettings, RenderExecutor};
pub use request::{
    PdfOptions, RenderFormat, RenderJob, RenderOptions, RenderOutput, RenderRequest, RenderSource,
    Viewport,
};
pub use timeout::with_render_timeout;
