//! Authentication error types

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;
use turnstile_db::DbError;

use crate::password::PasswordError;

/// The only message a client ever sees for a rejected credential
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid User ID/Password";

/// Why the `Authorization` header could not be parsed
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderError {
    #[error("missing authorization header")]
    Missing,

    #[error("authorization header is not visible ASCII")]
    NotAscii,

    #[error("empty authorization header")]
    Empty,

    #[error("authorization header has no credentials")]
    MissingCredentials,
}

/// Why a bearer token was refused
///
/// `TokenService::verify` only produces `Malformed`, `BadSignature` and
/// `Expired`; the other kinds come from the bearer flow around it.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    #[error("malformed token")]
    Malformed,

    #[error("bad token signature")]
    BadSignature,

    #[error("token expired")]
    Expired,

    #[error("token already used")]
    Reused,

    #[error("token subject does not exist")]
    UnknownIdentity,
}

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid authorization header: {0}")]
    Parse(HeaderError),

    #[error("Unsupported authorization scheme")]
    UnsupportedScheme,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error("Invalid token: {0}")]
    InvalidToken(TokenError),

    #[error("Insufficient permissions")]
    Forbidden,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Repository error: {0}")]
    Repository(#[from] DbError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether the failure is about the presented credential rather than the service
    pub fn is_credential_failure(&self) -> bool {
        match self {
            AuthError::Parse(_)
            | AuthError::UnsupportedScheme
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken(_) => true,
            AuthError::Forbidden
            | AuthError::Validation(_)
            | AuthError::Repository(_)
            | AuthError::Internal(_) => false,
        }
    }

    /// Status code and client-facing message
    pub fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AuthError::Parse(_)
            | AuthError::UnsupportedScheme
            | AuthError::InvalidCredentials
            | AuthError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                INVALID_CREDENTIALS_MESSAGE.to_string(),
            ),
            AuthError::Forbidden => (StatusCode::FORBIDDEN, "Insufficient permissions".to_string()),
            AuthError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AuthError::Repository(_) | AuthError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error".to_string(),
            ),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(err: TokenError) -> Self {
        AuthError::InvalidToken(err)
    }
}

impl From<HeaderError> for AuthError {
    fn from(err: HeaderError) -> Self {
        AuthError::Parse(err)
    }
}

impl From<PasswordError> for AuthError {
    fn from(err: PasswordError) -> Self {
        AuthError::Internal(err.to_string())
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!("Authentication failed internally: {}", self);
        }

        let body = axum::Json(json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credential_failures_share_one_message() {
        let failures = [
            AuthError::Parse(HeaderError::Missing),
            AuthError::Parse(HeaderError::MissingCredentials),
            AuthError::UnsupportedScheme,
            AuthError::InvalidCredentials,
            AuthError::InvalidToken(TokenError::Malformed),
            AuthError::InvalidToken(TokenError::BadSignature),
            AuthError::InvalidToken(TokenError::Expired),
            AuthError::InvalidToken(TokenError::Reused),
            AuthError::InvalidToken(TokenError::UnknownIdentity),
        ];

        for failure in failures {
            assert!(failure.is_credential_failure());
            let (status, message) = failure.status_and_message();
            assert_eq!(status, StatusCode::UNAUTHORIZED);
            assert_eq!(message, INVALID_CREDENTIALS_MESSAGE);
        }
    }

    #[test]
    fn test_repository_failure_is_not_a_credential_failure() {
        let err = AuthError::Repository(DbError::Migration("boom".to_string()));
        assert!(!err.is_credential_failure());
        let (status, message) = err.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_ne!(message, INVALID_CREDENTIALS_MESSAGE);
    }
}
