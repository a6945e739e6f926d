// src/error.rs

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;

use crate::engine::EngineError;

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict
    Conflict(String),

    /// Typed business-rule outcome from the attempt engine; carries its own
    /// status mapping and machine-readable payload.
    Engine(EngineError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Engine(e) => return engine_response(e),
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Maps the engine taxonomy to HTTP. Business failures keep their message
/// and code; only `Store` is hidden behind a generic 500.
fn engine_response(e: EngineError) -> Response {
    let status = match &e {
        EngineError::NotFound => StatusCode::NOT_FOUND,
        EngineError::WindowNotOpen { .. }
        | EngineError::WindowClosed { .. }
        | EngineError::AttemptsExhausted { .. }
        | EngineError::ResumeCountExceeded { .. } => StatusCode::FORBIDDEN,
        EngineError::ActiveSessionExists { .. } | EngineError::SessionNotActive => {
            StatusCode::CONFLICT
        }
        EngineError::Store(msg) => {
            tracing::error!("Engine store failure: {}", msg);
            let body = Json(json!({
                "error": "Internal Server Error",
                "code": "store_failure",
            }));
            return (StatusCode::INTERNAL_SERVER_ERROR, body).into_response();
        }
    };

    let mut body = json!({
        "error": e.to_string(),
        "code": e.code(),
    });
    match &e {
        EngineError::ActiveSessionExists {
            session_id: Some(id),
        } => {
            body["session_id"] = json!(id);
        }
        EngineError::WindowNotOpen { opens_at } => {
            body["opens_at"] = json!(opens_at);
        }
        EngineError::WindowClosed { closed_at } => {
            body["closed_at"] = json!(closed_at);
        }
        _ => {}
    }

    (status, Json(body)).into_response()
}

impl From<EngineError> for AppError {
    fn from(e: EngineError) -> Self {
        AppError::Engine(e)
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
