//! Canonical JSON responses.
//!
//! Every body is rendered with sorted keys and a fixed indent, carries the reason phrase of its
//! status code under `status`, and is sent with `Last-Modified` (time of serialization) and a
//! strong `ETag` derived from the body bytes.

use crate::service::Page;
use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::time::SystemTime;

pub const DEFAULT_INDENT: usize = 2;
pub const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Rebuild objects so keys come out sorted regardless of how `serde_json::Map` is backed.
fn sort_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<String, Value> =
                map.into_iter().map(|(k, v)| (k, sort_keys(v))).collect();
            Value::Object(sorted.into_iter().collect())
        }
        Value::Array(items) => Value::Array(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

/// Serialize with sorted keys; `indent == 0` produces compact output.
pub fn to_canonical_json<T: Serialize>(payload: &T, indent: usize) -> serde_json::Result<Vec<u8>> {
    let value = sort_keys(serde_json::to_value(payload)?);
    if indent == 0 {
        return serde_json::to_vec(&value);
    }
    let pad = vec![b' '; indent];
    let mut out = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(&pad);
    let mut ser = serde_json::Serializer::with_formatter(&mut out, formatter);
    value.serialize(&mut ser)?;
    Ok(out)
}

/// Strong entity tag: quoted hex of the first 16 bytes of the body's SHA-256.
pub fn etag_for(body: &[u8]) -> String {
    let digest = Sha256::digest(body);
    format!("\"{}\"", hex::encode(&digest[..16]))
}

/// Build the JSON response for `payload`, overriding any `status` key with the reason phrase.
pub fn jsonify(status: StatusCode, mut payload: Map<String, Value>, indent: usize) -> Response {
    let reason = status.canonical_reason().unwrap_or("Unknown");
    payload.insert("status".into(), Value::String(reason.to_string()));
    let body = match to_canonical_json(&payload, indent) {
        Ok(b) => b,
        Err(e) => {
            tracing::error!(error = %e, "response serialization failed");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let etag = etag_for(&body);
    let last_modified = httpdate::fmt_http_date(SystemTime::now());

    let mut response = Response::new(Body::from(body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    if let Ok(v) = HeaderValue::from_str(&etag) {
        headers.insert(header::ETAG, v);
    }
    if let Ok(v) = HeaderValue::from_str(&last_modified) {
        headers.insert(header::LAST_MODIFIED, v);
    }
    response
}

/// Single entity body: the flat row object.
pub fn success_one(status: StatusCode, row: Value, indent: usize) -> Response {
    let payload = match row {
        Value::Object(m) => m,
        other => {
            let mut m = Map::new();
            m.insert("data".into(), other);
            m
        }
    };
    jsonify(status, payload, indent)
}

/// List envelope: `objects`, `num_results`, `page`, `total_pages`.
pub fn success_many(page: Page, indent: usize) -> Response {
    let mut payload = Map::new();
    payload.insert("objects".into(), Value::Array(page.objects));
    payload.insert("num_results".into(), page.num_results.into());
    payload.insert("page".into(), page.page.into());
    payload.insert("total_pages".into(), page.total_pages.into());
    jsonify(StatusCode::OK, payload, indent)
}

pub fn message_body(message: &str) -> Map<String, Value> {
    let mut m = Map::new();
    m.insert("message".into(), Value::String(message.to_string()));
    m
}
