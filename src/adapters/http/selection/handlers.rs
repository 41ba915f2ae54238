//! HTTP handlers for selection and answer endpoints.
//!
//! These handlers connect Axum routes to the selection engine and the
//! answer recording handler.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use tracing::error;

use crate::application::handlers::exposure::{RecordAnswerCommand, RecordAnswerHandler};
use crate::application::handlers::selection::{SelectQuestionsCommand, SelectQuestionsHandler};
use crate::domain::foundation::{CandidateId, InstanceId, ItemId, OrganizationId};
use crate::domain::selection::SelectionError;
use crate::ports::LedgerError;

use super::dto::{RecordAnswerRequest, SelectQuestionsRequest};
use crate::adapters::http::error::ErrorResponse;

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for selection endpoints.
#[derive(Clone)]
pub struct SelectionAppState {
    pub select_questions: Arc<SelectQuestionsHandler>,
    pub record_answer: Arc<RecordAnswerHandler>,
    /// Expose infrastructure error text to callers.
    pub verbose_errors: bool,
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers (POST endpoints)
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/selections - Assemble a test instance
///
/// Dropping the connection drops this future, which releases any claims the
/// request still holds. A snapshot that fails validation is rejected with 400
/// before the engine sees it.
pub async fn select_questions(
    State(state): State<SelectionAppState>,
    payload: Result<Json<SelectQuestionsRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(body) => body,
        Err(rejection) => return bad_request(rejection.body_text()),
    };
    let candidate_id = match CandidateId::new(request.candidate_id) {
        Ok(id) => id,
        Err(e) => return bad_request(e.to_string()),
    };
    let organization_id = match OrganizationId::new(request.organization_id) {
        Ok(id) => id,
        Err(e) => return bad_request(e.to_string()),
    };

    let cmd = SelectQuestionsCommand {
        template: request.template,
        candidate_id,
        organization_id,
        seed: request.seed,
    };

    match state.select_questions.handle(cmd).await {
        Ok(instance) => (StatusCode::CREATED, Json(instance)).into_response(),
        Err(err) => handle_selection_error(err, state.verbose_errors),
    }
}

/// POST /api/exposures/answered - Record an answer result
pub async fn record_answer(
    State(state): State<SelectionAppState>,
    Json(request): Json<RecordAnswerRequest>,
) -> Response {
    let item_id = match ItemId::new(request.item_id) {
        Ok(id) => id,
        Err(e) => return bad_request(e.to_string()),
    };
    let instance_id: InstanceId = match request.instance_id.parse() {
        Ok(id) => id,
        Err(_) => return bad_request("Invalid instance ID format"),
    };

    let cmd = RecordAnswerCommand {
        item_id,
        instance_id,
        result: request.result,
    };

    match state.record_answer.handle(cmd).await {
        Ok(record) => (StatusCode::OK, Json(record)).into_response(),
        Err(err) => handle_ledger_error(err, state.verbose_errors),
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Error Handling
// ════════════════════════════════════════════════════════════════════════════════

fn bad_request(message: impl Into<String>) -> Response {
    (StatusCode::BAD_REQUEST, Json(ErrorResponse::bad_request(message))).into_response()
}

fn handle_selection_error(err: SelectionError, verbose: bool) -> Response {
    let body = ErrorResponse::new(err.code(), err.to_string());
    match err {
        SelectionError::PoolShortage(report) => {
            let details = serde_json::to_value(&report).ok();
            let body = ErrorResponse {
                message: report.summary(),
                details,
                ..body
            };
            (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
        }
        SelectionError::ReservationTimeout { .. } => (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, "1")],
            Json(body),
        )
            .into_response(),
        SelectionError::StalePolicySnapshot { .. } => {
            (StatusCode::CONFLICT, Json(body)).into_response()
        }
        SelectionError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, Json(body)).into_response(),
        SelectionError::Cancelled => (StatusCode::REQUEST_TIMEOUT, Json(body)).into_response(),
        SelectionError::Infrastructure(message) => {
            error!(error = %message, "selection failed");
            internal_error(message, verbose)
        }
    }
}

fn handle_ledger_error(err: LedgerError, verbose: bool) -> Response {
    let body = ErrorResponse::new(err.code(), err.to_string());
    match err {
        LedgerError::DuplicateWrite { .. } => (StatusCode::CONFLICT, Json(body)).into_response(),
        LedgerError::NotFound { .. } => (StatusCode::NOT_FOUND, Json(body)).into_response(),
        LedgerError::Unavailable(message) => {
            error!(error = %message, "answer recording failed");
            internal_error(message, verbose)
        }
    }
}

fn internal_error(message: String, verbose: bool) -> Response {
    let message = if verbose {
        message
    } else {
        "Internal server error".to_string()
    };
    (StatusCode::INTERNAL_SERVER_ERROR, Json(ErrorResponse::internal(message))).into_response()
}
