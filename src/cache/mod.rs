//! Response cache: storage backends, key derivation and the HTTP caching layer.

mod key;
mod memory;
#[cfg(feature = "memcached")]
mod memcached;
mod middleware;

pub use key::make_cache_key;
pub use memory::InMemoryCache;
#[cfg(feature = "memcached")]
pub use memcached::MemcachedCache;
pub use middleware::cache_control;

use crate::config::{CacheBackend, Settings};
use crate::error::AppError;
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::Response,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// A fully buffered response as stored in the cache.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
}

fn header_string(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
}

impl CachedResponse {
    pub fn capture(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> Self {
        CachedResponse {
            status: status.as_u16(),
            body: body.to_vec(),
            content_type: header_string(headers, header::CONTENT_TYPE),
            etag: header_string(headers, header::ETAG),
            last_modified: header_string(headers, header::LAST_MODIFIED),
        }
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK);
        let headers = response.headers_mut();
        for (name, value) in [
            (header::CONTENT_TYPE, self.content_type),
            (header::ETAG, self.etag),
            (header::LAST_MODIFIED, self.last_modified),
        ] {
            if let Some(v) = value.and_then(|v| HeaderValue::from_str(&v).ok()) {
                headers.insert(name, v);
            }
        }
        response
    }
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<CachedResponse>, AppError>;
    async fn set(&self, key: &str, value: &CachedResponse, ttl: Duration) -> Result<(), AppError>;
}

/// Build the backend named by `CACHE_TYPE`.
pub async fn open(settings: &Settings) -> Result<Arc<dyn CacheStore>, AppError> {
    match &settings.cache {
        CacheBackend::Simple => Ok(Arc::new(InMemoryCache::new())),
        #[cfg(feature = "memcached")]
        CacheBackend::Memcached { servers, .. } => {
            Ok(Arc::new(MemcachedCache::connect(servers).await?))
        }
        #[cfg(not(feature = "memcached"))]
        CacheBackend::Memcached { .. } => Err(crate::error::ConfigError::Validation(
            "CACHE_TYPE=memcached requires the `memcached` feature".into(),
        )
        .into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capture_keeps_validators() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ETAG, HeaderValue::from_static("\"abc\""));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let cached = CachedResponse::capture(StatusCode::OK, &headers, b"{}");
        assert_eq!(cached.etag.as_deref(), Some("\"abc\""));
        assert_eq!(cached.last_modified, None);

        let resp = cached.into_response();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::ETAG], "\"abc\"");
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/json");
    }

    #[tokio::test]
    async fn simple_backend_by_default() {
        let cache = open(&Settings::test()).await.unwrap();
        assert!(cache.get("missing").await.unwrap().is_none());
    }
}
