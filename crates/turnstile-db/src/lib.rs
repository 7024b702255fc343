//! Turnstile Database Layer
//!
//! This crate provides the persistence layer for Turnstile identities and
//! used bearer tokens, using SQLite via sqlx.

pub mod error;
pub mod models;
pub mod repository;

pub use error::DbError;
pub use models::*;
pub use repository::Database;

/// Re-export sqlx types for convenience
pub use sqlx::SqlitePool;
