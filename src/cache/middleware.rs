//! Caching layer for read endpoints.
//!
//! Order inside the layer: cache lookup (when `CACHE_MAX_AGE > 0`), the handler on a miss,
//! `Cache-Control`/`Expires` decoration, then conditional-request handling on every response,
//! including cache hits.

use super::{make_cache_key, CacheStore, CachedResponse};
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

const NO_STORE: &str = "max-age=0, no-cache, no-store, must-revalidate";

pub async fn cache_control(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let method = request.method().clone();
    if method != Method::GET && method != Method::HEAD {
        return next.run(request).await;
    }
    let validators = Validators::from_headers(request.headers());
    let max_age = state.settings.cache_max_age;

    let mut response = if max_age > 0 {
        let key = make_cache_key(request.uri(), request.headers());
        match lookup(state.cache.as_ref(), &key).await {
            Some(hit) => {
                tracing::debug!(key = %key, "cache hit");
                hit.into_response()
            }
            None => {
                let response = next.run(request).await;
                if method == Method::GET {
                    store(state.cache.as_ref(), &key, response, max_age).await
                } else {
                    response
                }
            }
        }
    } else {
        next.run(request).await
    };

    apply_cache_headers(response.headers_mut(), max_age);
    validators.apply(response)
}

async fn lookup(cache: &dyn CacheStore, key: &str) -> Option<CachedResponse> {
    match cache.get(key).await {
        Ok(hit) => hit,
        Err(e) => {
            tracing::warn!(error = %e, key = %key, "cache lookup failed; serving live response");
            None
        }
    }
}

/// Buffer a successful response and write it to the cache, returning an equivalent response.
async fn store(cache: &dyn CacheStore, key: &str, response: Response, max_age: u64) -> Response {
    if response.status() != StatusCode::OK {
        return response;
    }
    let (parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, usize::MAX).await {
        Ok(b) => b,
        Err(e) => {
            return AppError::Cache(format!("unable to buffer response: {}", e)).into_response()
        }
    };
    let entry = CachedResponse::capture(parts.status, &parts.headers, &bytes);
    if let Err(e) = cache.set(key, &entry, Duration::from_secs(max_age)).await {
        tracing::warn!(error = %e, key = %key, "cache store failed");
    }
    Response::from_parts(parts, Body::from(bytes))
}

fn set_header(headers: &mut HeaderMap, name: header::HeaderName, value: &str) {
    if let Ok(v) = HeaderValue::from_str(value) {
        headers.insert(name, v);
    }
}

fn apply_cache_headers(headers: &mut HeaderMap, max_age: u64) {
    if max_age == 0 {
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
        headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
        set_header(headers, header::EXPIRES, &httpdate::fmt_http_date(UNIX_EPOCH));
        return;
    }
    set_header(headers, header::CACHE_CONTROL, &format!("public, max-age={}", max_age));
    let base = headers
        .get(header::LAST_MODIFIED)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| httpdate::parse_http_date(v).ok())
        .unwrap_or_else(SystemTime::now);
    let expires = httpdate::fmt_http_date(base + Duration::from_secs(max_age));
    set_header(headers, header::EXPIRES, &expires);
}

/// Conditional-request headers captured before the request is consumed.
#[derive(Debug, Default)]
struct Validators {
    if_none_match: Option<String>,
    if_modified_since: Option<SystemTime>,
}

impl Validators {
    fn from_headers(headers: &HeaderMap) -> Self {
        Validators {
            if_none_match: headers
                .get(header::IF_NONE_MATCH)
                .and_then(|v| v.to_str().ok())
                .map(String::from),
            if_modified_since: headers
                .get(header::IF_MODIFIED_SINCE)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| httpdate::parse_http_date(v).ok()),
        }
    }

    /// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted without it.
    fn not_modified(&self, headers: &HeaderMap) -> bool {
        if let Some(candidates) = &self.if_none_match {
            let Some(etag) = headers.get(header::ETAG).and_then(|v| v.to_str().ok()) else {
                return false;
            };
            return candidates
                .split(',')
                .map(str::trim)
                .any(|c| c == "*" || opaque(c) == opaque(etag));
        }
        match (
            self.if_modified_since,
            headers
                .get(header::LAST_MODIFIED)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| httpdate::parse_http_date(v).ok()),
        ) {
            (Some(since), Some(modified)) => modified <= since,
            _ => false,
        }
    }

    fn apply(&self, response: Response) -> Response {
        if response.status() != StatusCode::OK || !self.not_modified(response.headers()) {
            return response;
        }
        let mut not_modified = Response::new(Body::empty());
        *not_modified.status_mut() = StatusCode::NOT_MODIFIED;
        let out = not_modified.headers_mut();
        for name in [
            header::ETAG,
            header::LAST_MODIFIED,
            header::CACHE_CONTROL,
            header::EXPIRES,
            header::PRAGMA,
        ] {
            if let Some(v) = response.headers().get(&name) {
                out.insert(name, v.clone());
            }
        }
        not_modified
    }
}

/// Entity tag without the weak prefix.
fn opaque(tag: &str) -> &str {
    tag.strip_prefix("W/").unwrap_or(tag)
}
