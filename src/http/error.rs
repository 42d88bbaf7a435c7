//! Error responses of the HTTP adapter
//!
//! Every failure is answered with `{"error": "<message>"}` and a status derived
//! from the error class.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::{debug, warn};

use crate::render::{RenderError, RenderErrorKind};

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpError {
    status: StatusCode,
    message: String,
}

impl HttpError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn method_not_allowed() -> Self {
        Self::new(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
    }

    pub fn unsupported_media_type() -> Self {
        Self::new(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "Unexpected Content-Type: only supports 'application/json'",
        )
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<RenderError> for HttpError {
    fn from(err: RenderError) -> Self {
        let status = match err.kind() {
            RenderErrorKind::Validation => StatusCode::BAD_REQUEST,
            RenderErrorKind::QueueTimeout | RenderErrorKind::Unavailable => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            RenderErrorKind::Navigation | RenderErrorKind::Timeout | RenderErrorKind::Render => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self::new(status, err.to_string())
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            warn!(status = %self.status, "Render request failed: {}", self.message);
        } else {
            debug!(status = %self.status, "Render request rejected: {}", self.message);
        }
        (
            self.status,
            Json(ErrorBody {
                error: self.message,
            }),
        )
            .into_response()
    }
}
