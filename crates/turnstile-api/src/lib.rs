//! Turnstile REST API
//!
//! This crate provides the Axum-based HTTP API for Turnstile: signup,
//! sign-in through the authentication middleware, key issuance and
//! identity administration.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::create_router;
pub use state::{AppState, MetricsHandle};
