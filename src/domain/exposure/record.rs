//! Exposure ledger entries.
//!
//! An exposure is the fact that an item was shown to (or answered by) a
//! candidate inside a test instance. Entries are append-only; the single
//! permitted mutation is `viewed -> answered`, applied once.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{
    CandidateId, ExposureId, InstanceId, ItemId, OrganizationId, Timestamp, ValidationError,
};

/// How far the candidate got with the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureOutcome {
    Viewed,
    Answered,
}

impl ExposureOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureOutcome::Viewed => "viewed",
            ExposureOutcome::Answered => "answered",
        }
    }
}

impl fmt::Display for ExposureOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Scoring result attached when an exposure is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExposureResult {
    Correct,
    Incorrect,
    Skipped,
    #[default]
    None,
}

impl ExposureResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExposureResult::Correct => "correct",
            ExposureResult::Incorrect => "incorrect",
            ExposureResult::Skipped => "skipped",
            ExposureResult::None => "none",
        }
    }
}

/// Input for appending a new ledger entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewExposure {
    pub item_id: ItemId,
    pub candidate_id: CandidateId,
    pub instance_id: InstanceId,
    pub organization_id: OrganizationId,
    pub used_at: Timestamp,
    pub outcome: ExposureOutcome,
    pub result: ExposureResult,
}

impl NewExposure {
    /// The `viewed` entry written when an instance is committed.
    pub fn viewed(
        item_id: ItemId,
        candidate_id: CandidateId,
        instance_id: InstanceId,
        organization_id: OrganizationId,
        used_at: Timestamp,
    ) -> Self {
        Self {
            item_id,
            candidate_id,
            instance_id,
            organization_id,
            used_at,
            outcome: ExposureOutcome::Viewed,
            result: ExposureResult::None,
        }
    }
}

/// A persisted ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureRecord {
    pub id: ExposureId,
    pub item_id: ItemId,
    pub candidate_id: CandidateId,
    pub instance_id: InstanceId,
    pub organization_id: OrganizationId,
    pub used_at: Timestamp,
    pub outcome: ExposureOutcome,
    pub result: ExposureResult,
}

impl ExposureRecord {
    pub fn from_new(id: ExposureId, new: NewExposure) -> Self {
        Self {
            id,
            item_id: new.item_id,
            candidate_id: new.candidate_id,
            instance_id: new.instance_id,
            organization_id: new.organization_id,
            used_at: new.used_at,
            outcome: new.outcome,
            result: new.result,
        }
    }

    /// Applies the one permitted mutation.
    ///
    /// Fails if the record is already answered.
    pub fn answer(&mut self, result: ExposureResult) -> Result<(), ValidationError> {
        if self.outcome == ExposureOutcome::Answered {
            return Err(ValidationError::invalid_format(
                "outcome",
                format!(
                    "exposure for item {} in instance {} is already answered",
                    self.item_id, self.instance_id
                ),
            ));
        }
        self.outcome = ExposureOutcome::Answered;
        self.result = result;
        Ok(())
    }
}

/// Cross-candidate usage statistics for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ItemExposureStats {
    /// Most recent exposure to any candidate.
    pub last_exposed_at: Option<Timestamp>,
    /// Total exposures across all candidates and organizations.
    pub total_exposures: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewed_record() -> ExposureRecord {
        ExposureRecord::from_new(
            ExposureId::new(),
            NewExposure::viewed(
                ItemId::new("q1").unwrap(),
                CandidateId::new("c1").unwrap(),
                InstanceId::new(),
                OrganizationId::new("org").unwrap(),
                Timestamp::now(),
            ),
        )
    }

    #[test]
    fn viewed_entry_has_no_result() {
        let record = viewed_record();
        assert_eq!(record.outcome, ExposureOutcome::Viewed);
        assert_eq!(record.result, ExposureResult::None);
    }

    #[test]
    fn answer_mutates_once() {
        let mut record = viewed_record();
        record.answer(ExposureResult::Correct).unwrap();
        assert_eq!(record.outcome, ExposureOutcome::Answered);
        assert_eq!(record.result, ExposureResult::Correct);

        assert!(record.answer(ExposureResult::Incorrect).is_err());
        assert_eq!(record.result, ExposureResult::Correct);
    }

    #[test]
    fn outcome_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&ExposureOutcome::Answered).unwrap(),
            "\"answered\""
        );
    }
}
