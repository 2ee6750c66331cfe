use crate::error::AppError;
use crate::response::{jsonify, message_body};
use crate::state::AppState;
use crate::store;
use axum::{extract::State, http::StatusCode, response::Response};

pub const WELCOME: &str = "Welcome to the TodoMVC API!";

pub async fn index() -> &'static str {
    WELCOME
}

/// Drop and recreate every table.
pub async fn reset(State(state): State<AppState>) -> Result<Response, AppError> {
    store::reset(&state.pool, &state.schemas).await?;
    Ok(jsonify(StatusCode::OK, message_body("Database reset!"), state.settings.json_indent))
}
