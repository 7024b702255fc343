//! Used bearer token tracking for single-use mode
//!
//! Tokens are recorded by their SHA-256 digest so an entry has a fixed size
//! regardless of how large the presented token was.

use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use turnstile_db::{Database, DbError};

/// Hex SHA-256 digest of a token
pub fn token_digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

/// Set of bearer tokens that have already been presented
#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    /// Check whether a token has been presented before
    async fn has_been_used(&self, token: &str) -> Result<bool, DbError>;

    /// Record a token as presented (idempotent)
    async fn mark_used(&self, token: &str) -> Result<(), DbError>;

    /// Record a token and report whether this was its first use
    ///
    /// Stores override this with a single atomic insert.
    async fn consume(&self, token: &str) -> Result<bool, DbError> {
        if self.has_been_used(token).await? {
            return Ok(false);
        }
        self.mark_used(token).await?;
        Ok(true)
    }
}

/// Process-local blacklist for single-instance deployments
#[derive(Default)]
pub struct InMemoryBlacklist {
    used: Mutex<HashSet<String>>,
}

impl InMemoryBlacklist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.used.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.lock().is_empty()
    }
}

#[async_trait]
impl TokenBlacklist for InMemoryBlacklist {
    async fn has_been_used(&self, token: &str) -> Result<bool, DbError> {
        Ok(self.used.lock().contains(&token_digest(token)))
    }

    async fn mark_used(&self, token: &str) -> Result<(), DbError> {
        self.used.lock().insert(token_digest(token));
        Ok(())
    }

    async fn consume(&self, token: &str) -> Result<bool, DbError> {
        Ok(self.used.lock().insert(token_digest(token)))
    }
}

/// Blacklist kept in the shared database, for multi-instance deployments
#[derive(Clone)]
pub struct DatabaseBlacklist {
    db: Database,
}

impl DatabaseBlacklist {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TokenBlacklist for DatabaseBlacklist {
    async fn has_been_used(&self, token: &str) -> Result<bool, DbError> {
        self.db.is_token_used(&token_digest(token)).await
    }

    async fn mark_used(&self, token: &str) -> Result<(), DbError> {
        self.db.record_token_use(&token_digest(token)).await?;
        Ok(())
    }

    async fn consume(&self, token: &str) -> Result<bool, DbError> {
        self.db.record_token_use(&token_digest(token)).await
    }
}
