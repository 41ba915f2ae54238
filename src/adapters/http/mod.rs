//! HTTP adapters - REST API implementations.
//!
//! Each concern has its own router; [`api_router`] merges them and applies
//! the shared middleware.

pub mod error;
pub mod pool_health;
pub mod selection;

use std::time::Duration;

use axum::routing::get;
use axum::{Json, Router};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub use pool_health::{pool_health_router, PoolHealthAppState};
pub use selection::{selection_router, SelectionAppState};

use selection::dto::HealthResponse;

/// Middleware switches for [`api_router`].
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub request_timeout: Duration,
    pub enable_tracing: bool,
}

/// Builds the full service router with `/health` and shared layers.
pub fn api_router(
    selection: SelectionAppState,
    pool_health: PoolHealthAppState,
    options: RouterOptions,
) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .merge(selection_router().with_state(selection))
        .merge(pool_health_router().with_state(pool_health))
        .layer(TimeoutLayer::new(options.request_timeout));

    if options.enable_tracing {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    }
}

/// GET /health - Liveness
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse::ok())
}
