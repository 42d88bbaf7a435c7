//! Route handlers: JSON request parsing, rendering, health and method fallback

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{Map, Value};
use tracing::debug;

use super::error::HttpError;
use crate::render::{RenderExecutor, RenderOptions, RenderRequest, RenderSource};
use crate::supervisor::BrowserLauncher;

pub(super) async fn render<L: BrowserLauncher>(
    State(executor): State<RenderExecutor<L>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = match parse_request(&headers, &body) {
        Ok(request) => request,
        Err(err) => return err.into_response(),
    };

    match executor.execute(request).await {
        Ok(output) => {
            debug!(
                format = %output.format,
                bytes = output.bytes.len(),
                "Render succeeded"
            );
            (
                StatusCode::OK,
                [(header::CONTENT_TYPE, output.content_type())],
                output.bytes,
            )
                .into_response()
        }
        Err(err) => HttpError::from(err).into_response(),
    }
}

pub(super) async fn health<L: BrowserLauncher>(
    State(executor): State<RenderExecutor<L>>,
) -> Response {
    Json(executor.supervisor().status()).into_response()
}

pub(super) async fn method_not_allowed() -> HttpError {
    HttpError::method_not_allowed()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .is_some_and(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
}

/// Turn a raw body into a render request, checking the shape of every field
pub(crate) fn parse_request(headers: &HeaderMap, body: &[u8]) -> Result<RenderRequest, HttpError> {
    if !is_json(headers) {
        return Err(HttpError::unsupported_media_type());
    }

    let value: Value = serde_json::from_slice(body)
        .map_err(|e| HttpError::bad_request(format!("Malformed JSON body: {e}")))?;
    let Value::Object(mut fields) = value else {
        return Err(HttpError::bad_request("Request body must be a JSON object"));
    };

    let html = take_string(&mut fields, "html")?;
    let url = take_string(&mut fields, "url")?;
    let source = match (html, url) {
        (Some(html), None) => RenderSource::Markup(html),
        (None, Some(url)) => RenderSource::Url(url),
        (Some(_), Some(_)) => {
            return Err(HttpError::bad_request(
                "Provide either 'html' or 'url' in the request body, not both",
            ));
        }
        (None, None) => {
            return Err(HttpError::bad_request(
                "Missing 'html' (or 'url') property in request body, or it is not a string",
            ));
        }
    };

    let format = take_string(&mut fields, "format")?;

    let options = match fields.remove("options") {
        None | Some(Value::Null) => RenderOptions::default(),
        Some(options @ Value::Object(_)) => serde_json::from_value(options)
            .map_err(|e| HttpError::bad_request(format!("Invalid 'options': {e}")))?,
        Some(_) => {
            return Err(HttpError::bad_request(
                "Property 'options' can only be an object (or omitted)",
            ));
        }
    };

    let mut request = RenderRequest::new(source).with_options(options);
    if let Some(format) = format {
        request = request.with_format(format);
    }
    Ok(request)
}

/// Remove an optional string field; `null` counts as absent
fn take_string(fields: &mut Map<String, Value>, key: &str) -> Result<Option<String>, HttpError> {
    match fields.remove(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(HttpError::bad_request(format!(
            "Property '{key}' must be a string"
        ))),
    }
}
