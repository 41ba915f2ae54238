//! Application layer - Commands, Queries, and Handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.
//! Selection and answer recording are commands; pool health is a query.

pub mod handlers;

pub use handlers::{
    // Selection
    ReservationCoordinator, ReservationCoordinatorConfig, SelectQuestionsCommand,
    SelectQuestionsHandler, SelectionSettings,
    // Exposure
    RecordAnswerCommand, RecordAnswerHandler,
    // Pool health
    PoolHealthConfig, PoolHealthMonitor,
};
