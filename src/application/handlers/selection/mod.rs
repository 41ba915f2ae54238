//! Selection handlers.

mod reservation_coordinator;
mod select_questions;

pub use reservation_coordinator::{
    ReservationCoordinator, ReservationCoordinatorConfig, ReservationExhausted, ReservationLease,
};
pub use select_questions::{SelectQuestionsCommand, SelectQuestionsHandler, SelectionSettings};
