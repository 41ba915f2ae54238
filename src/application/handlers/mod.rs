//! Application handlers.
//!
//! Command and query handlers that orchestrate domain operations.

pub mod exposure;
pub mod pool_health;
pub mod selection;

pub use exposure::{RecordAnswerCommand, RecordAnswerHandler};
pub use pool_health::{PoolHealthConfig, PoolHealthMonitor};
pub use selection::{
    ReservationCoordinator, ReservationCoordinatorConfig, ReservationExhausted, ReservationLease,
    SelectQuestionsCommand, SelectQuestionsHandler, SelectionSettings,
};
