//! Index and maintenance routes.

use crate::handlers::common::{index, reset};
use crate::state::AppState;
use axum::{routing::get, Router};

pub fn common_routes(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/reset/", get(reset))
        .with_state(state)
}
