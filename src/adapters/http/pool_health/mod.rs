//! HTTP adapter for pool health telemetry.

pub mod handlers;
pub mod routes;

pub use handlers::PoolHealthAppState;
pub use routes::pool_health_router;
