//! Application state

use std::sync::Arc;
use turnstile_auth::{Authenticator, IdentityRepository, TokenService};

/// Prometheus handle used to render `/metrics`
pub use metrics_exporter_prometheus::PrometheusHandle as MetricsHandle;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<Authenticator>,
}

impl AppState {
    pub fn new(authenticator: Arc<Authenticator>) -> Self {
        Self { authenticator }
    }

    pub fn identities(&self) -> &IdentityRepository {
        self.authenticator.identities()
    }

    pub fn tokens(&self) -> &TokenService {
        self.authenticator.tokens()
    }
}
