//! Pool health module - advisory eligible-count telemetry per bucket.

mod report;

pub use report::{DifficultyBreakdown, PoolHealthReport};
