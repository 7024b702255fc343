//! Signup, sign-in and key routes

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tracing::info;
use turnstile_auth::{AuthContext, NewAccount, TokenLifetime, auth_middleware};
use turnstile_db::Role;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{IdentityResponse, KeyResponse, SignupRequest, TokenResponse};
use super::validation::{validate_password, validate_username};

/// POST /api/v1/auth/signup
async fn signup(
    State(state): State<AppState>,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    validate_username(&request.username)?;
    validate_password(&request.password)?;

    let email = request.email.filter(|e| !e.trim().is_empty());
    let identity = state
        .identities()
        .signup(NewAccount {
            username: request.username,
            password: request.password,
            email,
            role: Role::User,
        })
        .await?;

    let token = state.tokens().issue_for(&identity, TokenLifetime::Default)?;
    info!("Signed up {}", identity.username);

    Ok((
        StatusCode::CREATED,
        Json(TokenResponse {
            identity: IdentityResponse::from(&identity),
            token,
        }),
    ))
}

/// POST /api/v1/auth/signin
///
/// The middleware has already checked the credentials and minted the token.
async fn signin(Extension(context): Extension<AuthContext>) -> Json<TokenResponse> {
    Json(TokenResponse {
        identity: IdentityResponse::from(&context.identity),
        token: context.token,
    })
}

/// POST /api/v1/auth/key
async fn key(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<Json<KeyResponse>, ApiError> {
    let key = state.tokens().issue_key(&context.identity)?;
    info!("Issued API key for {}", context.identity.username);
    Ok(Json(KeyResponse { key }))
}

/// GET /api/v1/auth/me
async fn me(Extension(context): Extension<AuthContext>) -> Json<IdentityResponse> {
    Json(IdentityResponse::from(&context.identity))
}

/// Create auth routes
pub fn routes(state: &AppState) -> Router<AppState> {
    let protected = Router::new()
        .route("/api/v1/auth/signin", post(signin))
        .route("/api/v1/auth/key", post(key))
        .route("/api/v1/auth/me", get(me))
        .route_layer(from_fn_with_state(
            state.authenticator.clone(),
            auth_middleware,
        ));

    Router::new()
        .route("/api/v1/auth/signup", post(signup))
        .merge(protected)
}
