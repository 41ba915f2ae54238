//! Error types shared across the domain layer.

use std::fmt;
use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: i64,
        max: i64,
        actual: i64,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(field: impl Into<String>, min: i64, max: i64, actual: i64) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min,
            max,
            actual,
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error codes organized by category.
///
/// `PoolShortage` is the only code content operations act on; every other
/// code is an operational or retry concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Validation errors
    ValidationFailed,

    // Content availability
    PoolShortage,

    // Concurrency / snapshot errors
    DuplicateExposureWrite,
    ReservationTimeout,
    StalePolicySnapshot,
    Cancelled,

    // Not found errors
    ExposureNotFound,

    // Infrastructure errors
    DatabaseError,
    InternalError,
}

impl ErrorCode {
    /// Returns the wire representation of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "VALIDATION_FAILED",
            ErrorCode::PoolShortage => "POOL_SHORTAGE",
            ErrorCode::DuplicateExposureWrite => "DUPLICATE_EXPOSURE_WRITE",
            ErrorCode::ReservationTimeout => "RESERVATION_TIMEOUT",
            ErrorCode::StalePolicySnapshot => "STALE_POLICY_SNAPSHOT",
            ErrorCode::Cancelled => "CANCELLED",
            ErrorCode::ExposureNotFound => "EXPOSURE_NOT_FOUND",
            ErrorCode::DatabaseError => "DATABASE_ERROR",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_empty_field_displays_correctly() {
        let err = ValidationError::empty_field("item_id");
        assert_eq!(format!("{}", err), "Field 'item_id' cannot be empty");
    }

    #[test]
    fn validation_error_out_of_range_displays_correctly() {
        let err = ValidationError::out_of_range("max_exposures_per_candidate", 1, 1000, 0);
        assert_eq!(
            format!("{}", err),
            "Field 'max_exposures_per_candidate' must be between 1 and 1000, got 0"
        );
    }

    #[test]
    fn error_code_displays_screaming_snake_case() {
        assert_eq!(ErrorCode::PoolShortage.to_string(), "POOL_SHORTAGE");
        assert_eq!(
            ErrorCode::StalePolicySnapshot.to_string(),
            "STALE_POLICY_SNAPSHOT"
        );
    }
}
