//! Turnstile Authentication and Authorization
//!
//! This crate authenticates requests carrying Basic or Bearer credentials,
//! issues signed tokens, optionally enforces single-use bearer tokens and
//! manages the identity records credentials are checked against.

pub mod blacklist;
pub mod error;
pub mod identity;
pub mod middleware;
pub mod password;
pub mod token;

pub use blacklist::{DatabaseBlacklist, InMemoryBlacklist, TokenBlacklist, token_digest};
pub use error::{AuthError, HeaderError, INVALID_CREDENTIALS_MESSAGE, TokenError};
pub use identity::{IdentityRepository, IdentityUpdate, NewAccount, UNUSABLE_PASSWORD};
pub use middleware::{
    AuthContext, Authenticator, Credentials, TokenUsePolicy, auth_middleware, parse_authorization,
    require_admin, require_editor,
};
pub use password::{PasswordConfig, PasswordError, PasswordHasher};
pub use token::{Claims, TokenLifetime, TokenPayload, TokenService};
