//! Pool health handlers.

mod pool_health_monitor;

pub use pool_health_monitor::{PoolHealthConfig, PoolHealthMonitor};
