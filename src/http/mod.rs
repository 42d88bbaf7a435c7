//! HTTP boundary adapter
//!
//! `POST /` renders a JSON request body to bytes, `GET /health` reports the
//! supervisor status. Everything else about a request (validation, queueing,
//! deadlines) is the executor's business.

mod error;
mod handlers;

pub use error::{ErrorBody, HttpError};

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};

use crate::render::RenderExecutor;
use crate::supervisor::BrowserLauncher;

/// Build the service router over `executor`
///
/// Bodies larger than `max_body_bytes` are rejected with 413 before parsing.
pub fn build_router<L: BrowserLauncher>(executor: RenderExecutor<L>, max_body_bytes: usize) -> Router {
    Router::new()
        .route(
            "/",
            post(handlers::render::<L>).fallback(handlers::method_not_allowed),
        )
        .route(
            "/health",
            get(handlers::health::<L>).fallback(handlers::method_not_allowed),
        )
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .with_state(executor)
}
