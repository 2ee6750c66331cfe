use axum::http::{header, HeaderMap, Uri};

/// Cache key for a request: absolute URL (path and query) followed by the negotiated media type,
/// so the same resource requested with different `Accept` headers is cached separately.
pub fn make_cache_key(uri: &Uri, headers: &HeaderMap) -> String {
    let scheme = uri.scheme_str().unwrap_or("http");
    let host = uri
        .authority()
        .map(|a| a.as_str())
        .or_else(|| headers.get(header::HOST).and_then(|v| v.to_str().ok()))
        .unwrap_or("localhost");
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    let media = headers
        .get(header::ACCEPT)
        .or_else(|| headers.get(header::CONTENT_TYPE))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    format!("{}://{}{}/{}", scheme, host, path, media)
}
