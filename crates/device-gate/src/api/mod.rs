//! HTTP API for the device gate.

mod handlers;
mod middleware;
mod types;

pub use handlers::*;
pub use middleware::logging_middleware;
pub use types::*;

use crate::gate::Gate;
use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Verification pipeline; `None` when no bot token is configured
    pub gate: Option<Arc<Gate>>,
    /// Proxies whose `X-Forwarded-For` entries are trusted
    pub trusted_proxies: usize,
}

impl AppState {
    /// Create new application state.
    pub fn new(gate: Option<Gate>, trusted_proxies: usize) -> Self {
        Self {
            gate: gate.map(Arc::new),
            trusted_proxies,
        }
    }
}

/// Create the API router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/api/verify",
            post(handlers::verify).fallback(handlers::method_not_allowed),
        )
        .layer(axum_middleware::from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
