//! Identity operations

use chrono::Utc;
use sqlx::Row;

use crate::error::DbError;
use crate::models::{Identity, IdentityChanges, NewIdentity};
use crate::repository::Database;

const IDENTITY_COLUMNS: &str = "id, username, password_hash, email, role, created_at, updated_at";

/// Map a UNIQUE constraint failure onto [`DbError::Duplicate`]
fn duplicate_or(err: sqlx::Error, what: impl FnOnce() -> String) -> DbError {
    match &err {
        sqlx::Error::Database(e) if e.is_unique_violation() => DbError::Duplicate(what()),
        _ => DbError::Connection(err),
    }
}

impl Database {
    // ==================== Identity Operations ====================

    /// Insert a new identity
    pub async fn insert_identity(&self, identity: NewIdentity) -> Result<Identity, DbError> {
        let now = Utc::now();

        // Check if identity already exists
        let existing = self.get_identity_by_username(&identity.username).await?;
        if existing.is_some() {
            return Err(DbError::Duplicate(format!(
                "Identity '{}' already exists",
                identity.username
            )));
        }

        let result = sqlx::query(
            r#"
            INSERT INTO identities (username, password_hash, email, role, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&identity.username)
        .bind(&identity.password_hash)
        .bind(&identity.email)
        .bind(identity.role.as_str())
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            duplicate_or(e, || format!("Identity '{}' already exists", identity.username))
        })?;

        let id: i64 = result.get("id");

        Ok(Identity {
            id,
            username: identity.username,
            password_hash: identity.password_hash,
            email: identity.email,
            role: identity.role,
            created_at: now,
            updated_at: now,
        })
    }

    /// Get an identity by username
    pub async fn get_identity_by_username(
        &self,
        username: &str,
    ) -> Result<Option<Identity>, DbError> {
        let result = sqlx::query(&format!(
            "SELECT {} FROM identities WHERE username = ?",
            IDENTITY_COLUMNS
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Identity::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get an identity by ID
    pub async fn get_identity_by_id(&self, id: i64) -> Result<Option<Identity>, DbError> {
        let result = sqlx::query(&format!(
            "SELECT {} FROM identities WHERE id = ?",
            IDENTITY_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Identity::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// Get an identity by email
    pub async fn get_identity_by_email(&self, email: &str) -> Result<Option<Identity>, DbError> {
        let result = sqlx::query(&format!(
            "SELECT {} FROM identities WHERE email = ?",
            IDENTITY_COLUMNS
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        result.map(|row| Identity::try_from(&row).map_err(DbError::from)).transpose()
    }

    /// List all identities
    pub async fn list_identities(&self) -> Result<Vec<Identity>, DbError> {
        let rows = sqlx::query(&format!(
            "SELECT {} FROM identities ORDER BY username",
            IDENTITY_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| Identity::try_from(row).map_err(DbError::from))
            .collect()
    }

    /// Apply column changes to an identity
    ///
    /// Returns the updated identity, or `None` if no identity has this ID.
    /// Hashes in `changes` are written verbatim.
    pub async fn update_identity(
        &self,
        id: i64,
        changes: IdentityChanges,
    ) -> Result<Option<Identity>, DbError> {
        let Some(mut identity) = self.get_identity_by_id(id).await? else {
            return Ok(None);
        };
        if changes.is_empty() {
            return Ok(Some(identity));
        }

        if let Some(password_hash) = changes.password_hash {
            identity.password_hash = password_hash;
        }
        if let Some(email) = changes.email {
            identity.email = email;
        }
        if let Some(role) = changes.role {
            identity.role = role;
        }
        identity.updated_at = Utc::now();

        sqlx::query(
            r#"
            UPDATE identities
            SET password_hash = ?, email = ?, role = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&identity.password_hash)
        .bind(&identity.email)
        .bind(identity.role.as_str())
        .bind(identity.updated_at.to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| duplicate_or(e, || "Email already in use".to_string()))?;

        Ok(Some(identity))
    }

    /// Check if any identities exist
    pub async fn has_identities(&self) -> Result<bool, DbError> {
        let result = sqlx::query("SELECT COUNT(*) as count FROM identities")
            .fetch_one(&self.pool)
            .await?;
        let count: i64 = result.get("count");
        Ok(count > 0)
    }
}
