//! Route configuration for pool health endpoints.

use axum::routing::get;
use axum::Router;

use super::handlers::{get_pool_health, PoolHealthAppState};

/// Routes:
/// - `GET /api/pool-health?filter={json}&threshold=N`
pub fn pool_health_router() -> Router<PoolHealthAppState> {
    Router::new().route("/api/pool-health", get(get_pool_health))
}
