//! Router-wide middleware: HTTPS redirect and JSON bodies for bare error responses.

use crate::error::{INTERNAL_MESSAGE, NOT_ALLOWED_MESSAGE};
use crate::response::{jsonify, message_body, DEFAULT_INDENT};
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};

const FORWARDED_PROTO: &str = "x-forwarded-proto";
const MAX_MESSAGE_BYTES: usize = 1024;

/// Answer plain-HTTP requests with `301` to the same host and path over HTTPS.
pub async fn ssl_redirect(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if !state.settings.redirects_to_https() {
        return next.run(request).await;
    }
    let scheme = request
        .headers()
        .get(FORWARDED_PROTO)
        .and_then(|v| v.to_str().ok())
        .or_else(|| request.uri().scheme_str())
        .unwrap_or("http");
    if scheme.eq_ignore_ascii_case("https") {
        return next.run(request).await;
    }
    let host = state
        .settings
        .server_name
        .as_deref()
        .or_else(|| request.headers().get(header::HOST).and_then(|v| v.to_str().ok()))
        .unwrap_or("localhost");
    let path = request.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let location = format!("https://{}{}", host, path);
    let Ok(location) = HeaderValue::from_str(&location) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    tracing::debug!(location = ?location, "redirecting to https");
    let mut response = StatusCode::MOVED_PERMANENTLY.into_response();
    response.headers_mut().insert(header::LOCATION, location);
    response
}

/// Give bare 4xx/5xx responses from the router and tower layers (unrouted verbs, body limits,
/// extractor rejections) the JSON error envelope.
pub async fn error_envelope(response: Response) -> Response {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));
    if !(status.is_client_error() || status.is_server_error()) || is_json {
        return response;
    }
    let (parts, body) = response.into_parts();
    let message = if status == StatusCode::METHOD_NOT_ALLOWED {
        NOT_ALLOWED_MESSAGE.to_string()
    } else if status.is_server_error() {
        INTERNAL_MESSAGE.to_string()
    } else {
        let text = axum::body::to_bytes(body, MAX_MESSAGE_BYTES)
            .await
            .ok()
            .and_then(|b| String::from_utf8(b.to_vec()).ok())
            .map(|t| t.trim().to_string())
            .unwrap_or_default();
        if text.is_empty() {
            status.canonical_reason().unwrap_or("Error").to_string()
        } else {
            text
        }
    };
    let mut envelope = jsonify(status, message_body(&message), DEFAULT_INDENT);
    if let Some(allow) = parts.headers.get(header::ALLOW) {
        envelope.headers_mut().insert(header::ALLOW, allow.clone());
    }
    envelope
}
