//! Request/Response DTOs

use serde::{Deserialize, Serialize};
use turnstile_db::Identity;

// ==================== Auth Types ====================

/// Signup request
#[derive(Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

/// Identity plus the token issued for it
#[derive(Serialize)]
pub struct TokenResponse {
    pub identity: IdentityResponse,
    pub token: String,
}

/// Non-expiring API key
#[derive(Serialize)]
pub struct KeyResponse {
    pub key: String,
}

// ==================== Identity Types ====================

/// OAuth provisioning request
#[derive(Deserialize)]
pub struct OAuthProvisionRequest {
    pub email: String,
}

/// Update identity request
///
/// An empty `email` clears the stored email.
#[derive(Deserialize)]
pub struct UpdateIdentityRequest {
    pub password: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

/// Identity response (without password hash)
#[derive(Serialize)]
pub struct IdentityResponse {
    pub id: i64,
    pub username: String,
    pub email: Option<String>,
    pub role: String,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&Identity> for IdentityResponse {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            username: identity.username.clone(),
            email: identity.email.clone(),
            role: identity.role.as_str().to_string(),
            created_at: identity.created_at.to_rfc3339(),
            updated_at: identity.updated_at.to_rfc3339(),
        }
    }
}
