//! Typed errors and HTTP mapping.

use crate::response::{jsonify, DEFAULT_INDENT};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::{Map, Value};
use sqlx::error::ErrorKind;
use thiserror::Error;

/// Message used for every 405, whether from a disabled bulk operation or an unrouted verb.
pub const NOT_ALLOWED_MESSAGE: &str = "The method is not allowed for the requested URL.";

/// Message for every 5xx; details stay in the logs.
pub const INTERNAL_MESSAGE: &str = "The server encountered an internal error.";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: '{value}'")]
    Invalid { key: &'static str, value: String },
    #[error("missing setting: {0}")]
    Missing(&'static str),
    #[error("validation: {0}")]
    Validation(String),
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("{field}: {message}")]
    Validation { field: String, message: String },
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{}", NOT_ALLOWED_MESSAGE)]
    MethodNotAllowed,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database: {0}")]
    Db(sqlx::Error),
    #[error("cache: {0}")]
    Cache(String),
}

impl AppError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Db(sqlx::Error::RowNotFound) => StatusCode::NOT_FOUND,
            AppError::Config(_) | AppError::Db(_) | AppError::Cache(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Constraint violations become `Conflict` so the raw store text never reaches the client.
impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &e {
            let constraint = match db.kind() {
                ErrorKind::UniqueViolation => Some("unique"),
                ErrorKind::ForeignKeyViolation => Some("foreign key"),
                ErrorKind::NotNullViolation => Some("not null"),
                ErrorKind::CheckViolation => Some("check"),
                _ => None,
            };
            if let Some(kind) = constraint {
                tracing::warn!(error = %db, "integrity error");
                return AppError::Conflict(format!("{} constraint violated", kind));
            }
        }
        AppError::Db(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let mut body = Map::new();
        match &self {
            AppError::Validation { field, message } => {
                body.insert("message".into(), Value::String(self.to_string()));
                let mut errors = Map::new();
                errors.insert(field.clone(), Value::String(message.clone()));
                body.insert("validation_errors".into(), Value::Object(errors));
            }
            AppError::NotFound(_) => {
                body.insert("message".into(), "No result found".into());
            }
            _ if status.is_server_error() => {
                tracing::error!(error = %self, "request failed");
                body.insert("message".into(), INTERNAL_MESSAGE.into());
            }
            _ => {
                body.insert("message".into(), Value::String(self.to_string()));
            }
        }
        jsonify(status, body, DEFAULT_INDENT)
    }
}
