//! API error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use turnstile_auth::AuthError;
use turnstile_db::DbError;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),
}

fn database_status(e: &DbError) -> (StatusCode, &'static str, String) {
    match e {
        DbError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
        DbError::Duplicate(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            "DATABASE_ERROR",
            "Internal error".to_string(),
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            ApiError::Auth(AuthError::Repository(e)) => database_status(e),
            ApiError::Auth(e) => {
                let (status, message) = e.status_and_message();
                (status, "AUTH_ERROR", message)
            }
        };

        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        }

        let body = axum::Json(json!({
            "error": message,
            "code": code,
        }));

        (status, body).into_response()
    }
}
