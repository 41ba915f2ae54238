//! Repetition policy embedded in a template.
//!
//! A policy is copied verbatim into every instance snapshot and never
//! mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{Timestamp, ValidationError};

/// Anti-repetition rules for one template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepetitionPolicy {
    /// Days an item stays blocked for a candidate after their last exposure.
    #[serde(default)]
    pub cooldown_days_per_candidate: u32,

    /// Lifetime exposure cap per candidate; `None` means unbounded.
    #[serde(default)]
    pub max_exposures_per_candidate: Option<u32>,

    /// Distinct-candidate depth after which an item rotates out of an
    /// organization; `None` or `0` disables rotation.
    #[serde(default)]
    pub org_rotation_depth: Option<u32>,

    /// Window over which rotation depth is counted; `None` counts all history.
    #[serde(default)]
    pub org_rotation_window_days: Option<u32>,

    /// Days an item stays blocked after its last exposure to anyone.
    #[serde(default)]
    pub global_cooldown_days: Option<u32>,

    /// Spread selections across tags instead of pure seeded order.
    #[serde(default)]
    pub enforce_taxonomy_diversity: bool,

    /// Lets the remaining exposure budget re-serve an item inside cooldown.
    #[serde(default)]
    pub allow_reserve_within_cooldown: bool,

    /// Total exposures after which an item is frozen for everyone.
    #[serde(default)]
    pub freeze_after_exposures: Option<u32>,
}

impl Default for RepetitionPolicy {
    fn default() -> Self {
        Self {
            cooldown_days_per_candidate: 0,
            max_exposures_per_candidate: None,
            org_rotation_depth: None,
            org_rotation_window_days: None,
            global_cooldown_days: None,
            enforce_taxonomy_diversity: false,
            allow_reserve_within_cooldown: false,
            freeze_after_exposures: None,
        }
    }
}

impl RepetitionPolicy {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(max) = self.max_exposures_per_candidate {
            if max == 0 {
                return Err(ValidationError::out_of_range(
                    "max_exposures_per_candidate",
                    1,
                    i64::from(u32::MAX),
                    0,
                ));
            }
        }
        if let Some(threshold) = self.freeze_after_exposures {
            if threshold == 0 {
                return Err(ValidationError::out_of_range(
                    "freeze_after_exposures",
                    1,
                    i64::from(u32::MAX),
                    0,
                ));
            }
        }
        Ok(())
    }

    /// Effective rotation depth, treating zero as disabled.
    pub fn rotation_depth(&self) -> Option<u32> {
        self.org_rotation_depth.filter(|depth| *depth > 0)
    }

    /// Start of the rotation window relative to `now`.
    pub fn rotation_window_start(&self, now: &Timestamp) -> Option<Timestamp> {
        self.org_rotation_window_days
            .map(|days| now.minus_days(i64::from(days)))
    }

    /// Canonical, order-stable encoding used for snapshot digests.
    pub fn canonical_form(&self) -> String {
        fn opt(v: Option<u32>) -> String {
            v.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string())
        }
        format!(
            "cooldown={};max={};depth={};window={};global={};diversity={};override={};freeze={}",
            self.cooldown_days_per_candidate,
            opt(self.max_exposures_per_candidate),
            opt(self.org_rotation_depth),
            opt(self.org_rotation_window_days),
            opt(self.global_cooldown_days),
            self.enforce_taxonomy_diversity,
            self.allow_reserve_within_cooldown,
            opt(self.freeze_after_exposures),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_is_permissive() {
        let policy = RepetitionPolicy::default();
        assert!(policy.validate().is_ok());
        assert_eq!(policy.rotation_depth(), None);
        assert!(!policy.allow_reserve_within_cooldown);
    }

    #[test]
    fn zero_max_exposures_is_rejected() {
        let policy = RepetitionPolicy {
            max_exposures_per_candidate: Some(0),
            ..Default::default()
        };
        assert!(policy.validate().is_err());
    }

    #[test]
    fn zero_rotation_depth_is_disabled() {
        let policy = RepetitionPolicy {
            org_rotation_depth: Some(0),
            ..Default::default()
        };
        assert_eq!(policy.rotation_depth(), None);
    }

    #[test]
    fn canonical_form_changes_with_any_field() {
        let base = RepetitionPolicy::default();
        let changed = RepetitionPolicy {
            allow_reserve_within_cooldown: true,
            ..Default::default()
        };
        assert_ne!(base.canonical_form(), changed.canonical_form());
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let policy: RepetitionPolicy =
            serde_json::from_str(r#"{"cooldown_days_per_candidate": 90}"#).unwrap();
        assert_eq!(policy.cooldown_days_per_candidate, 90);
        assert_eq!(policy.max_exposures_per_candidate, None);
    }
}
