//! Identity administration routes (admin only)

use axum::{
    Json, Router,
    extract::{Path, State},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post, put},
};
use std::str::FromStr;
use tracing::info;
use turnstile_auth::{IdentityUpdate, auth_middleware, require_admin};
use turnstile_db::Role;

use crate::error::ApiError;
use crate::state::AppState;

use super::types::{IdentityResponse, OAuthProvisionRequest, UpdateIdentityRequest};
use super::validation::validate_password;

/// GET /api/v1/identities
async fn list_identities(
    State(state): State<AppState>,
) -> Result<Json<Vec<IdentityResponse>>, ApiError> {
    let identities = state.identities().list().await?;
    Ok(Json(identities.iter().map(IdentityResponse::from).collect()))
}

/// POST /api/v1/identities/oauth
///
/// Called by a trusted OAuth bridge once the provider has verified the email.
async fn provision_oauth(
    State(state): State<AppState>,
    Json(request): Json<OAuthProvisionRequest>,
) -> Result<Json<IdentityResponse>, ApiError> {
    let identity = state.identities().create_from_oauth(&request.email).await?;
    Ok(Json(IdentityResponse::from(&identity)))
}

/// PUT /api/v1/identities/{id}
async fn update_identity(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(request): Json<UpdateIdentityRequest>,
) -> Result<Json<IdentityResponse>, ApiError> {
    if let Some(password) = &request.password {
        validate_password(password)?;
    }

    let role = request
        .role
        .as_deref()
        .map(Role::from_str)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let email = request
        .email
        .map(|e| Some(e.trim().to_string()).filter(|e| !e.is_empty()));

    let identity = state
        .identities()
        .update(
            id,
            IdentityUpdate {
                password: request.password,
                email,
                role,
            },
        )
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Identity {} not found", id)))?;

    info!("Updated identity {}", identity.username);
    Ok(Json(IdentityResponse::from(&identity)))
}

/// Create identity administration routes
pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/identities", get(list_identities))
        .route("/api/v1/identities/oauth", post(provision_oauth))
        .route("/api/v1/identities/{id}", put(update_identity))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(
            state.authenticator.clone(),
            auth_middleware,
        ))
}
