//! Route configuration for selection endpoints.

use axum::routing::post;
use axum::Router;

use super::handlers::{record_answer, select_questions, SelectionAppState};

/// Creates the selection router.
///
/// Routes:
/// - `POST /api/selections` - Assemble a test instance
/// - `POST /api/exposures/answered` - Record an answer result
pub fn selection_router() -> Router<SelectionAppState> {
    Router::new()
        .route("/api/selections", post(select_questions))
        .route("/api/exposures/answered", post(record_answer))
}
