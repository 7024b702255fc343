//! Password hashing and verification using Argon2id

use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{
        PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString, rand_core::OsRng,
    },
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid work factor: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Hashing task failed: {0}")]
    Task(String),
}

/// Argon2 work factor
///
/// Defaults to the argon2 crate's recommended parameters, which cost about
/// as much as bcrypt with 10 rounds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PasswordConfig {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism (lanes)
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

impl PasswordConfig {
    fn to_params(&self) -> Result<Params, PasswordError> {
        Params::new(self.memory_kib, self.iterations, self.parallelism, None)
            .map_err(|e| PasswordError::InvalidParams(e.to_string()))
    }
}

/// Salted one-way password hasher
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
}

impl PasswordHasher {
    pub fn new(config: &PasswordConfig) -> Result<Self, PasswordError> {
        let params = config.to_params()?;
        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }

    /// Hash a plaintext password into a PHC string
    ///
    /// A fresh random salt is drawn on every call.
    pub fn hash(&self, plaintext: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;
        Ok(hash.to_string())
    }

    /// Check a plaintext password against a stored hash
    ///
    /// The comparison itself is constant-time. Anything that is not a PHC
    /// string never matches.
    pub fn compare(&self, plaintext: &str, hashed: &str) -> bool {
        let parsed = match PasswordHash::new(hashed) {
            Ok(parsed) => parsed,
            Err(_) => return false,
        };

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                warn!("Stored password hash could not be verified: {}", e);
                false
            }
        }
    }

    /// [`hash`](Self::hash) on the blocking thread pool
    pub async fn spawn_hash(&self, plaintext: String) -> Result<String, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.hash(&plaintext))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))?
    }

    /// [`compare`](Self::compare) on the blocking thread pool
    pub async fn spawn_compare(
        &self,
        plaintext: String,
        hashed: String,
    ) -> Result<bool, PasswordError> {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || hasher.compare(&plaintext, &hashed))
            .await
            .map_err(|e| PasswordError::Task(e.to_string()))
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(&PasswordConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_compare() {
        let hasher = test_hasher();
        let hash = hasher.hash("mysecret").unwrap();

        assert_ne!(hash, "mysecret");
        assert!(hash.starts_with("$argon2id$"));
        assert!(hasher.compare("mysecret", &hash));
        assert!(!hasher.compare("MySecret", &hash));
        assert!(!hasher.compare("", &hash));
    }

    #[test]
    fn test_same_password_is_salted() {
        let hasher = test_hasher();
        let first = hasher.hash("mysecret").unwrap();
        let second = hasher.hash("mysecret").unwrap();

        assert_ne!(first, second);
        assert!(hasher.compare("mysecret", &first));
        assert!(hasher.compare("mysecret", &second));
    }

    #[test]
    fn test_garbage_hash_never_matches() {
        let hasher = test_hasher();
        assert!(!hasher.compare("none", "none"));
        assert!(!hasher.compare("!", "!"));
        assert!(!hasher.compare("", ""));
    }

    #[test]
    fn test_work_factor_is_encoded_in_hash() {
        let hasher = PasswordHasher::new(&PasswordConfig {
            memory_kib: 2048,
            iterations: 3,
            parallelism: 2,
        })
        .unwrap();
        let hash = hasher.hash("mysecret").unwrap();

        assert!(hash.contains("m=2048"));
        assert!(hash.contains("t=3"));
        assert!(hash.contains("p=2"));

        // Verification reads the parameters from the hash, not the hasher
        assert!(test_hasher().compare("mysecret", &hash));
    }

    #[test]
    fn test_invalid_work_factor_rejected() {
        let config = PasswordConfig {
            iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            PasswordHasher::new(&config),
            Err(PasswordError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_spawned_hash_and_compare() {
        let hasher = test_hasher();
        let hash = hasher.spawn_hash("mysecret".to_string()).await.unwrap();
        assert!(
            hasher
                .spawn_compare("mysecret".to_string(), hash.clone())
                .await
                .unwrap()
        );
        assert!(
            !hasher
                .spawn_compare("wrong".to_string(), hash)
                .await
                .unwrap()
        );
    }
}
