//! Signed token issuance and verification

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use tracing::debug;
use turnstile_db::{Identity, Role};

use crate::error::{AuthError, TokenError};

/// What a token vouches for
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenPayload {
    /// Identity ID
    pub id: i64,
    /// Identity role at issuance
    pub role: Role,
}

impl From<&Identity> for TokenPayload {
    fn from(identity: &Identity) -> Self {
        Self {
            id: identity.id,
            role: identity.role,
        }
    }
}

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub id: i64,
    pub role: Role,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp), absent for keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
}

/// How long an issued token stays valid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenLifetime {
    /// The configured default expiry, or no expiry if none is configured
    Default,
    /// Expires after the given duration
    Ttl(Duration),
    /// Never expires; for long-lived API credentials
    Key,
}

/// Issues and verifies HS256 tokens with a shared secret
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    default_ttl: Option<Duration>,
}

impl TokenService {
    pub fn new(secret: &str, default_ttl: Option<Duration>) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            default_ttl,
        }
    }

    pub fn default_ttl(&self) -> Option<Duration> {
        self.default_ttl
    }

    /// Sign a payload
    pub fn issue(
        &self,
        payload: TokenPayload,
        lifetime: TokenLifetime,
    ) -> Result<String, AuthError> {
        self.issue_at(payload, lifetime, Utc::now())
    }

    /// Sign a payload as if issued at `now`
    pub fn issue_at(
        &self,
        payload: TokenPayload,
        lifetime: TokenLifetime,
        now: DateTime<Utc>,
    ) -> Result<String, AuthError> {
        let ttl = match lifetime {
            TokenLifetime::Default => self.default_ttl,
            TokenLifetime::Ttl(ttl) => Some(ttl),
            TokenLifetime::Key => None,
        };

        let exp = match ttl {
            Some(ttl) => Some(
                now.checked_add_signed(ttl)
                    .ok_or_else(|| AuthError::Internal("Token expiry out of range".to_string()))?
                    .timestamp(),
            ),
            None => None,
        };

        let claims = Claims {
            id: payload.id,
            role: payload.role,
            iat: now.timestamp(),
            exp,
        };

        debug!(id = payload.id, ?lifetime, "Issuing token");

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("Failed to sign token: {}", e)))
    }

    /// Sign a token for an identity
    pub fn issue_for(
        &self,
        identity: &Identity,
        lifetime: TokenLifetime,
    ) -> Result<String, AuthError> {
        self.issue(TokenPayload::from(identity), lifetime)
    }

    /// Sign a non-expiring key for an identity
    pub fn issue_key(&self, identity: &Identity) -> Result<String, AuthError> {
        self.issue_for(identity, TokenLifetime::Key)
    }

    /// Verify a token and return its payload
    pub fn verify(&self, token: &str) -> Result<TokenPayload, TokenError> {
        self.verify_at(token, Utc::now())
    }

    /// Verify a token as if the current time were `now`
    pub fn verify_at(&self, token: &str, now: DateTime<Utc>) -> Result<TokenPayload, TokenError> {
        self.decode_claims(token, now).map(|claims| TokenPayload {
            id: claims.id,
            role: claims.role,
        })
    }

    fn decode_claims(&self, token: &str, now: DateTime<Utc>) -> Result<Claims, TokenError> {
        // Expiry is checked below against `now`, and keys carry no `exp` at all
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::BadSignature,
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Malformed,
            }
        })?;

        if let Some(exp) = token_data.claims.exp
            && now.timestamp() > exp
        {
            return Err(TokenError::Expired);
        }

        Ok(token_data.claims)
    }
}
