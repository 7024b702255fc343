//! SQLite-backed storage for identities and used tokens

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::{debug, info};

use crate::error::DbError;

mod identities;
mod used_tokens;

/// Schema statements, applied in order on every start
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS identities (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username TEXT NOT NULL UNIQUE,
        password_hash TEXT NOT NULL,
        email TEXT UNIQUE,
        role TEXT NOT NULL DEFAULT 'user'
            CHECK (role IN ('admin', 'editor', 'user')),
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS used_tokens (
        digest TEXT PRIMARY KEY,
        used_at TEXT NOT NULL
    )
    "#,
];

/// Handle to the identity store; cheap to clone
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database at a `sqlite:` URL
    pub async fn new(database_url: &str) -> Result<Self, DbError> {
        info!("Connecting to database: {}", database_url);

        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;

        Self::migrated(pool).await
    }

    /// Open a private in-memory database
    ///
    /// Every SQLite connection to `:memory:` gets its own database, so the pool
    /// is pinned to a single connection.
    pub async fn in_memory() -> Result<Self, DbError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::migrated(pool).await
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Round-trip a trivial query to prove the store is reachable
    pub async fn ping(&self) -> Result<(), DbError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn migrated(pool: SqlitePool) -> Result<Self, DbError> {
        let db = Self { pool };
        for (step, statement) in MIGRATIONS.iter().enumerate() {
            debug!("Applying schema step {}", step + 1);
            sqlx::query(statement)
                .execute(&db.pool)
                .await
                .map_err(|e| DbError::Migration(format!("step {}: {}", step + 1, e)))?;
        }
        info!("Database schema is up to date");
        Ok(db)
    }
}
