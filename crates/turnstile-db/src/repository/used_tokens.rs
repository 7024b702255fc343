//! Used bearer token operations
//!
//! Rows are keyed by a digest of the token, never the token itself.

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::repository::Database;

impl Database {
    /// Check whether a token digest has been recorded
    pub async fn is_token_used(&self, digest: &str) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM used_tokens WHERE digest = ?")
            .bind(digest)
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }

    /// Record a token digest
    ///
    /// Returns `true` if the digest was not recorded before. The insert is a
    /// single statement, so concurrent callers see exactly one `true`.
    pub async fn record_token_use(&self, digest: &str) -> Result<bool, DbError> {
        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO used_tokens (digest, used_at)
            VALUES (?, ?)
            "#,
        )
        .bind(digest)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Count recorded token digests
    pub async fn count_used_tokens(&self) -> Result<i64, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM used_tokens")
            .fetch_one(&self.pool)
            .await?;
        Ok(result.get("count"))
    }
}
