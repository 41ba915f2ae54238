//! Selection-specific error types.

use thiserror::Error;

use crate::domain::foundation::{ErrorCode, TemplateId, ValidationError};

use super::shortage::ShortageReport;

/// Errors surfaced by a selection request.
///
/// `ReservationConflict` and `DuplicateExposureWrite` are handled inside the
/// engine and never appear here.
#[derive(Debug, Clone, Error)]
pub enum SelectionError {
    /// Not enough eligible items; the only kind content operations act on.
    #[error("pool shortage: {}", .0.summary())]
    PoolShortage(ShortageReport),

    /// The reservation store did not answer within the bounded retries.
    #[error("reservation coordinator unavailable after {attempts} attempt(s): {message}")]
    ReservationTimeout { attempts: u32, message: String },

    /// The embedded policy no longer matches the digest pinned at freeze time.
    #[error("policy snapshot for template {template_id} is stale (pinned {pinned}, found {found})")]
    StalePolicySnapshot {
        template_id: TemplateId,
        pinned: String,
        found: String,
    },

    #[error("invalid selection request: {0}")]
    InvalidRequest(#[from] ValidationError),

    /// The caller abandoned the request before commit.
    #[error("selection cancelled before commit")]
    Cancelled,

    #[error("infrastructure error: {0}")]
    Infrastructure(String),
}

impl SelectionError {
    pub fn infrastructure(message: impl Into<String>) -> Self {
        SelectionError::Infrastructure(message.into())
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            SelectionError::PoolShortage(_) => ErrorCode::PoolShortage,
            SelectionError::ReservationTimeout { .. } => ErrorCode::ReservationTimeout,
            SelectionError::StalePolicySnapshot { .. } => ErrorCode::StalePolicySnapshot,
            SelectionError::InvalidRequest(_) => ErrorCode::ValidationFailed,
            SelectionError::Cancelled => ErrorCode::Cancelled,
            SelectionError::Infrastructure(_) => ErrorCode::InternalError,
        }
    }

    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SelectionError::ReservationTimeout { .. } | SelectionError::Infrastructure(_)
        )
    }

    /// Whether content operations should be alerted.
    pub fn is_content_actionable(&self) -> bool {
        matches!(self, SelectionError::PoolShortage(_))
    }
}
