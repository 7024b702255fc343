//! API routes

mod auth;
mod identities;
mod ops;
mod types;
mod validation;

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::{AppState, MetricsHandle};

/// Create the main router
pub fn create_router(state: AppState, metrics_handle: Option<Arc<MetricsHandle>>) -> Router {
    let mut router = Router::new()
        .merge(ops::routes())
        .merge(auth::routes(&state))
        .merge(identities::routes(&state))
        .with_state(state);

    if let Some(handle) = metrics_handle {
        router = router.merge(ops::metrics_routes(handle));
    }

    router.layer(TraceLayer::new_for_http())
}
