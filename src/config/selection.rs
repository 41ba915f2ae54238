//! Selection engine and reservation tuning

use serde::Deserialize;
use std::time::Duration;

use super::error::ValidationError;
use crate::application::{ReservationCoordinatorConfig, SelectionSettings};

/// Selection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SelectionConfig {
    /// Multiplier applied to each section's count before pre-flight
    #[serde(default = "default_preflight_margin")]
    pub preflight_margin: f64,

    /// Lifetime of a reservation claim in milliseconds
    #[serde(default = "default_reservation_ttl")]
    pub reservation_ttl_ms: u64,

    /// Width of the reservation collision bucket in seconds
    #[serde(default = "default_time_bucket")]
    pub time_bucket_secs: u64,

    /// Timeout for a single claim store call in milliseconds
    #[serde(default = "default_call_timeout")]
    pub reservation_call_timeout_ms: u64,

    /// Attempts per claim store operation, including the first
    #[serde(default = "default_max_attempts")]
    pub reservation_max_attempts: u32,

    /// Initial retry backoff in milliseconds
    #[serde(default = "default_backoff")]
    pub reservation_backoff_ms: u64,
}

impl SelectionConfig {
    pub fn settings(&self) -> SelectionSettings {
        SelectionSettings {
            preflight_margin: self.preflight_margin,
            time_bucket_secs: self.time_bucket_secs,
        }
    }

    pub fn coordinator(&self) -> ReservationCoordinatorConfig {
        ReservationCoordinatorConfig {
            claim_ttl: Duration::from_millis(self.reservation_ttl_ms),
            call_timeout: Duration::from_millis(self.reservation_call_timeout_ms),
            max_attempts: self.reservation_max_attempts,
            initial_backoff: Duration::from_millis(self.reservation_backoff_ms),
        }
    }

    /// Validate selection configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.preflight_margin.is_finite() || self.preflight_margin < 1.0 {
            return Err(ValidationError::InvalidPreflightMargin);
        }
        if self.reservation_ttl_ms == 0 {
            return Err(ValidationError::InvalidReservation("reservation_ttl_ms"));
        }
        if self.reservation_call_timeout_ms == 0
            || self.reservation_call_timeout_ms >= self.reservation_ttl_ms
        {
            return Err(ValidationError::InvalidReservation(
                "reservation_call_timeout_ms",
            ));
        }
        if self.reservation_max_attempts == 0 {
            return Err(ValidationError::InvalidReservation(
                "reservation_max_attempts",
            ));
        }
        if self.time_bucket_secs == 0 {
            return Err(ValidationError::InvalidTimeBucket);
        }
        Ok(())
    }
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            preflight_margin: default_preflight_margin(),
            reservation_ttl_ms: default_reservation_ttl(),
            time_bucket_secs: default_time_bucket(),
            reservation_call_timeout_ms: default_call_timeout(),
            reservation_max_attempts: default_max_attempts(),
            reservation_backoff_ms: default_backoff(),
        }
    }
}

fn default_preflight_margin() -> f64 {
    1.5
}

fn default_reservation_ttl() -> u64 {
    5_000
}

fn default_time_bucket() -> u64 {
    300
}

fn default_call_timeout() -> u64 {
    250
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff() -> u64 {
    25
}
