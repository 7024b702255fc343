//! Request authentication for Axum
//!
//! [`Authenticator::authenticate`] runs the whole credential check: parse the
//! `Authorization` header, dispatch on its scheme, resolve an identity and mint
//! a fresh token for it. [`auth_middleware`] wraps it for use as a layer.

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};
use tracing::debug;
use turnstile_db::Identity;

use crate::blacklist::TokenBlacklist;
use crate::error::{AuthError, HeaderError, TokenError};
use crate::identity::IdentityRepository;
use crate::token::{TokenLifetime, TokenService};

/// Whether a bearer token may be presented more than once
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum TokenUsePolicy {
    #[default]
    Multi,
    Single,
}

/// Result of a successful authentication, stored in request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub identity: Identity,
    /// Token issued for this request with the default lifetime
    pub token: String,
}

/// Credentials carried by an `Authorization` header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Credentials<'a> {
    /// Still base64 encoded
    Basic(&'a str),
    Bearer(&'a str),
}

impl Credentials<'_> {
    fn scheme(&self) -> &'static str {
        match self {
            Credentials::Basic(_) => "basic",
            Credentials::Bearer(_) => "bearer",
        }
    }
}

/// Split an `Authorization` header into scheme and credentials
///
/// The scheme is matched case-insensitively. Unknown schemes are rejected
/// without echoing the scheme back.
pub fn parse_authorization(header: Option<&str>) -> Result<Credentials<'_>, AuthError> {
    let header = header.ok_or(HeaderError::Missing)?;
    let mut parts = header.split_whitespace();
    let scheme = parts.next().ok_or(HeaderError::Empty)?;

    let basic = scheme.eq_ignore_ascii_case("basic");
    if !basic && !scheme.eq_ignore_ascii_case("bearer") {
        return Err(AuthError::UnsupportedScheme);
    }

    let credentials = parts.next().ok_or(HeaderError::MissingCredentials)?;
    Ok(if basic {
        Credentials::Basic(credentials)
    } else {
        Credentials::Bearer(credentials)
    })
}

/// Decode `base64(username:password)`, splitting on the first `:`
fn decode_basic(encoded: &str) -> Result<(String, String), AuthError> {
    let decoded = STANDARD
        .decode(encoded)
        .map_err(|_| AuthError::InvalidCredentials)?;
    let decoded = String::from_utf8(decoded).map_err(|_| AuthError::InvalidCredentials)?;
    let (username, password) = decoded
        .split_once(':')
        .ok_or(AuthError::InvalidCredentials)?;
    Ok((username.to_string(), password.to_string()))
}

/// Checks credentials and issues tokens
pub struct Authenticator {
    identities: IdentityRepository,
    tokens: Arc<TokenService>,
    blacklist: Arc<dyn TokenBlacklist>,
    token_uses: TokenUsePolicy,
}

impl Authenticator {
    pub fn new(
        identities: IdentityRepository,
        tokens: Arc<TokenService>,
        blacklist: Arc<dyn TokenBlacklist>,
        token_uses: TokenUsePolicy,
    ) -> Self {
        Self {
            identities,
            tokens,
            blacklist,
            token_uses,
        }
    }

    pub fn identities(&self) -> &IdentityRepository {
        &self.identities
    }

    pub fn tokens(&self) -> &TokenService {
        &self.tokens
    }

    pub fn token_uses(&self) -> TokenUsePolicy {
        self.token_uses
    }

    /// Authenticate the value of an `Authorization` header
    pub async fn authenticate(&self, header: Option<&str>) -> Result<AuthContext, AuthError> {
        let credentials = match parse_authorization(header) {
            Ok(credentials) => credentials,
            Err(e) => {
                record_attempt("none", &Err(&e));
                debug!("Rejected authorization header: {}", e);
                return Err(e);
            }
        };

        let scheme = credentials.scheme();
        let resolved = match credentials {
            Credentials::Basic(encoded) => self.basic(encoded).await,
            Credentials::Bearer(token) => self.bearer(token).await,
        };
        record_attempt(scheme, &resolved.as_ref().map(|_| ()));

        let identity = resolved.inspect_err(|e| {
            debug!(scheme, "Authentication rejected: {}", e);
        })?;

        let token = self.tokens.issue_for(&identity, TokenLifetime::Default)?;
        debug!(scheme, "Authenticated {} ({})", identity.username, identity.role);

        Ok(AuthContext { identity, token })
    }

    async fn basic(&self, encoded: &str) -> Result<Identity, AuthError> {
        let (username, password) = decode_basic(encoded)?;
        self.identities
            .authenticate_basic(&username, &password)
            .await?
            .ok_or(AuthError::InvalidCredentials)
    }

    async fn bearer(&self, token: &str) -> Result<Identity, AuthError> {
        // In single-use mode the token is consumed before its signature is
        // checked, so even a token that then fails verification is spent.
        match self.token_uses {
            TokenUsePolicy::Single => {
                if !self.blacklist.consume(token).await? {
                    return Err(TokenError::Reused.into());
                }
            }
            TokenUsePolicy::Multi => {}
        }

        let payload = self.tokens.verify(token)?;
        self.identities
            .authenticate_token(payload.id)
            .await?
            .ok_or(AuthError::InvalidToken(TokenError::UnknownIdentity))
    }
}

fn record_attempt(scheme: &'static str, result: &Result<(), &AuthError>) {
    let outcome = match result {
        Ok(()) => "success",
        Err(e) if e.is_credential_failure() => "rejected",
        Err(_) => "error",
    };
    metrics::counter!("turnstile_auth_attempts_total", "scheme" => scheme, "outcome" => outcome)
        .increment(1);
}

/// Authentication middleware
///
/// Rejects the request unless its `Authorization` header carries valid Basic
/// or Bearer credentials. On success an [`AuthContext`] is added to the
/// request extensions.
pub async fn auth_middleware(
    State(authenticator): State<Arc<Authenticator>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let header = match request.headers().get(AUTHORIZATION) {
        Some(value) => Some(value.to_str().map_err(|_| HeaderError::NotAscii)?.to_owned()),
        None => None,
    };

    let context = authenticator.authenticate(header.as_deref()).await?;
    request.extensions_mut().insert(context);

    Ok(next.run(request).await)
}

/// Middleware to require the admin role
pub async fn require_admin(request: Request, next: Next) -> Result<Response, AuthError> {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(HeaderError::Missing)?;

    if !context.identity.role.is_admin() {
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(request).await)
}

/// Middleware to require the admin or editor role
pub async fn require_editor(request: Request, next: Next) -> Result<Response, AuthError> {
    let context = request
        .extensions()
        .get::<AuthContext>()
        .ok_or(HeaderError::Missing)?;

    if !context.identity.role.can_edit() {
        return Err(AuthError::Forbidden);
    }

    Ok(next.run(request).await)
}
