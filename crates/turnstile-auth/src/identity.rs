//! Identity lookup, provisioning and credential checks
//!
//! Every write that carries a new plaintext password goes through
//! [`PasswordHasher`] here, exactly once, before it reaches the database.

use std::sync::Arc;

use tracing::{debug, info};
use turnstile_db::{Database, Identity, IdentityChanges, NewIdentity, Role};

use crate::error::AuthError;
use crate::password::PasswordHasher;

/// Stored in place of a hash for identities that have no local password
///
/// Not a PHC string, so [`PasswordHasher::compare`] can never accept it.
pub const UNUSABLE_PASSWORD: &str = "!";

/// Plaintext compared against when the username is unknown
const DUMMY_PASSWORD: &str = "turnstile-timing-equalizer";

/// Signup request
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub role: Role,
}

/// Fields to change on an existing identity
///
/// `email: Some(None)` clears the email.
#[derive(Debug, Clone, Default)]
pub struct IdentityUpdate {
    pub password: Option<String>,
    pub email: Option<Option<String>>,
    pub role: Option<Role>,
}

#[derive(Clone)]
pub struct IdentityRepository {
    db: Database,
    hasher: PasswordHasher,
    dummy_hash: Arc<str>,
}

impl IdentityRepository {
    pub fn new(db: Database, hasher: PasswordHasher) -> Result<Self, AuthError> {
        let dummy_hash = hasher.hash(DUMMY_PASSWORD)?;
        Ok(Self {
            db,
            hasher,
            dummy_hash: dummy_hash.into(),
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.db.get_identity_by_username(username).await?)
    }

    pub async fn find_by_id(&self, id: i64) -> Result<Option<Identity>, AuthError> {
        Ok(self.db.get_identity_by_id(id).await?)
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Identity>, AuthError> {
        Ok(self.db.get_identity_by_email(email).await?)
    }

    pub async fn list(&self) -> Result<Vec<Identity>, AuthError> {
        Ok(self.db.list_identities().await?)
    }

    pub async fn has_identities(&self) -> Result<bool, AuthError> {
        Ok(self.db.has_identities().await?)
    }

    /// Look up a username and check the password against its stored hash
    ///
    /// Unknown usernames and wrong passwords both yield `None`, and both pay
    /// for one hash comparison.
    pub async fn authenticate_basic(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<Identity>, AuthError> {
        let identity = self.db.get_identity_by_username(username).await?;

        let stored_hash = match &identity {
            Some(identity) if identity.password_hash != UNUSABLE_PASSWORD => {
                identity.password_hash.clone()
            }
            _ => self.dummy_hash.to_string(),
        };
        let usable = identity
            .as_ref()
            .is_some_and(|i| i.password_hash != UNUSABLE_PASSWORD);

        let matches = self
            .hasher
            .spawn_compare(password.to_string(), stored_hash)
            .await?;

        if usable && matches {
            Ok(identity)
        } else {
            debug!("Basic authentication failed for {}", username);
            Ok(None)
        }
    }

    /// Resolve the subject of an already verified token
    pub async fn authenticate_token(&self, id: i64) -> Result<Option<Identity>, AuthError> {
        self.find_by_id(id).await
    }

    /// Return the identity for an externally verified email, creating it if needed
    pub async fn create_from_oauth(&self, email: &str) -> Result<Identity, AuthError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AuthError::Validation("Email is required".to_string()));
        }

        if let Some(existing) = self.db.get_identity_by_email(email).await? {
            info!("Welcome back {}", existing.username);
            return Ok(existing);
        }

        info!("Creating identity for {}", email);
        let created = self
            .db
            .insert_identity(NewIdentity {
                username: email.to_string(),
                password_hash: UNUSABLE_PASSWORD.to_string(),
                email: Some(email.to_string()),
                role: Role::User,
            })
            .await;

        match created {
            Ok(identity) => {
                metrics::counter!("turnstile_identities_created_total", "source" => "oauth")
                    .increment(1);
                Ok(identity)
            }
            // Lost a race with a concurrent provisioning of the same email
            Err(e) if e.is_unique_violation() => self
                .db
                .get_identity_by_email(email)
                .await?
                .ok_or(AuthError::Repository(e)),
            Err(e) => Err(e.into()),
        }
    }

    /// Create an identity from a plaintext password
    pub async fn signup(&self, account: NewAccount) -> Result<Identity, AuthError> {
        validate_username(&account.username)?;
        if account.password.is_empty() {
            return Err(AuthError::Validation("Password cannot be empty".to_string()));
        }

        let password_hash = self.hasher.spawn_hash(account.password).await?;
        let identity = self
            .db
            .insert_identity(NewIdentity {
                username: account.username,
                password_hash,
                email: account.email,
                role: account.role,
            })
            .await?;

        metrics::counter!("turnstile_identities_created_total", "source" => "signup").increment(1);
        info!("Created identity {} ({})", identity.username, identity.role);
        Ok(identity)
    }

    /// Update an identity, hashing the password only when a new one is given
    ///
    /// Returns `None` if no identity has this ID.
    pub async fn update(
        &self,
        id: i64,
        update: IdentityUpdate,
    ) -> Result<Option<Identity>, AuthError> {
        let password_hash = match update.password {
            Some(password) if password.is_empty() => {
                return Err(AuthError::Validation("Password cannot be empty".to_string()));
            }
            Some(password) => Some(self.hasher.spawn_hash(password).await?),
            None => None,
        };

        let changes = IdentityChanges {
            password_hash,
            email: update.email,
            role: update.role,
        };

        Ok(self.db.update_identity(id, changes).await?)
    }
}

/// Usernames must be non-empty and free of `:`, which delimits Basic credentials
fn validate_username(username: &str) -> Result<(), AuthError> {
    if username.trim().is_empty() {
        return Err(AuthError::Validation("Username cannot be empty".to_string()));
    }
    if username.contains(':') {
        return Err(AuthError::Validation(
            "Username cannot contain ':'".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_repository() -> IdentityRepository {
    let db = Database::in_memory().await.unwrap();
    IdentityRepository::new(db, crate::password::test_hasher()).unwrap()
}
