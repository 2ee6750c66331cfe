//! Router assembly: resource routes plus the HTTP layers shared by every path.

pub mod common;
pub mod entity;

pub use common::common_routes;
pub use entity::entity_routes;

use crate::error::AppError;
use crate::middleware::{error_envelope, ssl_redirect};
use crate::model::Todo;
use crate::state::AppState;
use axum::{
    http::header,
    middleware::{from_fn_with_state, map_response},
    Router,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{AllowMethods, AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

async fn not_found() -> AppError {
    AppError::NotFound("no route".into())
}

/// CORS on every path: the request origin is echoed back and `Content-Type` may be sent.
pub fn cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers([header::CONTENT_TYPE])
}

/// The complete application: index, reset and the Todo resource.
pub fn app(state: AppState) -> Router {
    let body_limit = state.settings.body_limit;
    Router::new()
        .merge(common_routes(state.clone()))
        .merge(entity_routes::<Todo>(state.clone()))
        .fallback(not_found)
        .layer(from_fn_with_state(state, ssl_redirect))
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(map_response(error_envelope))
        .layer(CompressionLayer::new())
        .layer(cors())
        .layer(TraceLayer::new_for_http())
}
