//! HTTP adapter for selection and answer recording.
//!
//! # Endpoints
//!
//! - `POST /api/selections` - Assemble a test instance from a frozen template
//! - `POST /api/exposures/answered` - Record the result for a viewed item

pub mod dto;
pub mod handlers;
pub mod routes;

// Re-export commonly used types
pub use handlers::SelectionAppState;
pub use routes::selection_router;
