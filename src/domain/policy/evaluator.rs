//! Policy Evaluator - pure eligibility predicate.
//!
//! Predicates run in a fixed precedence and short-circuit on the first
//! failure so that shortage reports are reproducible:
//!
//! 1. item status is published
//! 2. global cooldown (most recent exposure to anyone)
//! 3. candidate cooldown vs. lifetime exposure cap
//! 4. organization rotation depth
//! 5. frozen (total usage threshold)
//!
//! The evaluator holds no state beyond the policy and the evaluation
//! instant; identical inputs always produce identical verdicts.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::exposure::{ExposureRecord, ItemExposureStats};
use crate::domain::foundation::{ItemId, Timestamp};
use crate::domain::item::ItemStatus;

use super::repetition::RepetitionPolicy;

/// Machine-readable reason an item was not selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibilityReason {
    NotPublished,
    GlobalCooldown,
    CandidateCooldown,
    MaxExposuresReached,
    OrgRotationDepthReached,
    Frozen,
    /// Already assigned to an earlier section of the same instance.
    DuplicateInInstance,
    /// Claimed by a concurrent selection in the same collision scope.
    ReservedElsewhere,
}

impl IneligibilityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IneligibilityReason::NotPublished => "not_published",
            IneligibilityReason::GlobalCooldown => "global_cooldown",
            IneligibilityReason::CandidateCooldown => "candidate_cooldown",
            IneligibilityReason::MaxExposuresReached => "max_exposures_reached",
            IneligibilityReason::OrgRotationDepthReached => "org_rotation_depth_reached",
            IneligibilityReason::Frozen => "frozen",
            IneligibilityReason::DuplicateInInstance => "duplicate_in_instance",
            IneligibilityReason::ReservedElsewhere => "reserved_elsewhere",
        }
    }

    /// Human-facing explanation used in shortage reports and logs.
    pub fn describe(&self) -> &'static str {
        match self {
            IneligibilityReason::NotPublished => "item is not published",
            IneligibilityReason::GlobalCooldown => "item was shown to another candidate too recently",
            IneligibilityReason::CandidateCooldown => "candidate saw this item inside the cooldown window",
            IneligibilityReason::MaxExposuresReached => "candidate exhausted the exposure budget for this item",
            IneligibilityReason::OrgRotationDepthReached => "item rotated out of this organization",
            IneligibilityReason::Frozen => "item reached its lifetime usage threshold",
            IneligibilityReason::DuplicateInInstance => "item already assigned to another section",
            IneligibilityReason::ReservedElsewhere => "item claimed by a concurrent selection",
        }
    }
}

impl fmt::Display for IneligibilityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Verdict for one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Eligibility {
    Eligible,
    /// Inside candidate cooldown, admitted by the explicit override flag.
    EligibleByOverride,
    Ineligible(IneligibilityReason),
}

impl Eligibility {
    pub fn is_eligible(&self) -> bool {
        !matches!(self, Eligibility::Ineligible(_))
    }

    pub fn reason(&self) -> Option<IneligibilityReason> {
        match self {
            Eligibility::Ineligible(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Exposure facts relevant to one (candidate, organization, item) triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExposureSlice {
    /// Exposures of this item to the requesting candidate.
    pub candidate_exposures: u32,
    /// Most recent exposure of this item to the requesting candidate.
    pub candidate_last_exposed_at: Option<Timestamp>,
    /// Usage of this item across every candidate.
    pub item_stats: ItemExposureStats,
    /// Distinct candidates of the organization exposed inside the rotation window.
    pub org_distinct_candidates: u32,
}

impl ExposureSlice {
    /// Builds the candidate part of the slice from ledger history.
    ///
    /// `history` may contain other items; only `item_id` entries count.
    pub fn from_candidate_history(item_id: &ItemId, history: &[ExposureRecord]) -> Self {
        let mut slice = Self::default();
        for record in history.iter().filter(|r| &r.item_id == item_id) {
            slice.candidate_exposures += 1;
            slice.candidate_last_exposed_at = match slice.candidate_last_exposed_at {
                Some(last) if last >= record.used_at => Some(last),
                _ => Some(record.used_at),
            };
        }
        slice
    }

    pub fn with_item_stats(mut self, stats: ItemExposureStats) -> Self {
        self.item_stats = stats;
        self
    }

    pub fn with_org_distinct_candidates(mut self, count: u32) -> Self {
        self.org_distinct_candidates = count;
        self
    }
}

/// Pure evaluator bound to one policy and one evaluation instant.
#[derive(Debug, Clone)]
pub struct PolicyEvaluator<'a> {
    policy: &'a RepetitionPolicy,
    now: Timestamp,
}

impl<'a> PolicyEvaluator<'a> {
    pub fn new(policy: &'a RepetitionPolicy, now: Timestamp) -> Self {
        Self { policy, now }
    }

    pub fn evaluate(&self, status: ItemStatus, slice: &ExposureSlice) -> Eligibility {
        // 1. Status
        if !status.is_selectable() {
            return Eligibility::Ineligible(IneligibilityReason::NotPublished);
        }

        // 2. Global cooldown
        if let (Some(days), Some(last)) =
            (self.policy.global_cooldown_days, slice.item_stats.last_exposed_at)
        {
            if last.is_within_days_of(&self.now, days) {
                return Eligibility::Ineligible(IneligibilityReason::GlobalCooldown);
            }
        }

        // 3. Candidate cooldown vs. exposure budget
        let budget_left = self
            .policy
            .max_exposures_per_candidate
            .map_or(true, |max| slice.candidate_exposures < max);
        let mut verdict = Eligibility::Eligible;

        let in_cooldown = slice
            .candidate_last_exposed_at
            .is_some_and(|last| last.is_within_days_of(&self.now, self.policy.cooldown_days_per_candidate));
        if in_cooldown {
            if self.policy.allow_reserve_within_cooldown && budget_left {
                verdict = Eligibility::EligibleByOverride;
            } else {
                return Eligibility::Ineligible(IneligibilityReason::CandidateCooldown);
            }
        }
        if !budget_left {
            return Eligibility::Ineligible(IneligibilityReason::MaxExposuresReached);
        }

        // 4. Organization rotation depth
        if let Some(depth) = self.policy.rotation_depth() {
            if slice.org_distinct_candidates >= depth {
                return Eligibility::Ineligible(IneligibilityReason::OrgRotationDepthReached);
            }
        }

        // 5. Frozen
        if let Some(threshold) = self.policy.freeze_after_exposures {
            if slice.item_stats.total_exposures >= threshold {
                return Eligibility::Ineligible(IneligibilityReason::Frozen);
            }
        }

        verdict
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::{CandidateId, ExposureId, InstanceId, OrganizationId};
    use crate::domain::exposure::NewExposure;
    use proptest::prelude::*;

    fn now() -> Timestamp {
        Timestamp::from_unix_secs(1_760_000_000)
    }

    fn exposure(item: &str, days_ago: i64) -> ExposureRecord {
        ExposureRecord::from_new(
            ExposureId::new(),
            NewExposure::viewed(
                ItemId::new(item).unwrap(),
                CandidateId::new("c1").unwrap(),
                InstanceId::new(),
                OrganizationId::new("org").unwrap(),
                now().minus_days(days_ago),
            ),
        )
    }

    fn cooldown_policy() -> RepetitionPolicy {
        RepetitionPolicy {
            cooldown_days_per_candidate: 90,
            max_exposures_per_candidate: Some(3),
            ..Default::default()
        }
    }

    #[test]
    fn unpublished_item_is_rejected_first() {
        let policy = RepetitionPolicy {
            global_cooldown_days: Some(10),
            ..Default::default()
        };
        let slice = ExposureSlice::default().with_item_stats(ItemExposureStats {
            last_exposed_at: Some(now()),
            total_exposures: 1,
        });
        let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Retired, &slice);
        assert_eq!(verdict, Eligibility::Ineligible(IneligibilityReason::NotPublished));
    }

    #[test]
    fn cooldown_binds_despite_remaining_budget() {
        let history = vec![exposure("q", 45)];
        let slice = ExposureSlice::from_candidate_history(&ItemId::new("q").unwrap(), &history);
        let policy = cooldown_policy();

        let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
        assert_eq!(verdict, Eligibility::Ineligible(IneligibilityReason::CandidateCooldown));
    }

    #[test]
    fn cooldown_expires_on_day_ninety() {
        let history = vec![exposure("q", 90)];
        let slice = ExposureSlice::from_candidate_history(&ItemId::new("q").unwrap(), &history);
        let policy = cooldown_policy();

        let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
        assert_eq!(verdict, Eligibility::Eligible);
    }

    #[test]
    fn override_flag_admits_inside_cooldown_while_budget_remains() {
        let history = vec![exposure("q", 45)];
        let slice = ExposureSlice::from_candidate_history(&ItemId::new("q").unwrap(), &history);
        let policy = RepetitionPolicy {
            allow_reserve_within_cooldown: true,
            ..cooldown_policy()
        };

        let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
        assert_eq!(verdict, Eligibility::EligibleByOverride);
    }

    #[test]
    fn override_flag_does_not_bypass_exhausted_budget() {
        let history = vec![exposure("q", 200), exposure("q", 100), exposure("q", 10)];
        let slice = ExposureSlice::from_candidate_history(&ItemId::new("q").unwrap(), &history);
        let policy = RepetitionPolicy {
            allow_reserve_within_cooldown: true,
            ..cooldown_policy()
        };

        let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
        assert_eq!(verdict, Eligibility::Ineligible(IneligibilityReason::CandidateCooldown));
    }

    #[test]
    fn exhausted_budget_outside_cooldown_is_rejected() {
        let history = vec![exposure("q", 400), exposure("q", 300), exposure("q", 200)];
        let slice = ExposureSlice::from_candidate_history(&ItemId::new("q").unwrap(), &history);
        let policy = cooldown_policy();

        let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
        assert_eq!(verdict, Eligibility::Ineligible(IneligibilityReason::MaxExposuresReached));
    }

    #[test]
    fn history_for_other_items_is_ignored() {
        let history = vec![exposure("other", 1)];
        let slice = ExposureSlice::from_candidate_history(&ItemId::new("q").unwrap(), &history);
        assert_eq!(slice.candidate_exposures, 0);
        assert!(slice.candidate_last_exposed_at.is_none());
    }

    #[test]
    fn global_cooldown_precedes_candidate_checks() {
        let history = vec![exposure("q", 1)];
        let slice = ExposureSlice::from_candidate_history(&ItemId::new("q").unwrap(), &history)
            .with_item_stats(ItemExposureStats {
                last_exposed_at: Some(now().minus_days(1)),
                total_exposures: 1,
            });
        let policy = RepetitionPolicy {
            global_cooldown_days: Some(7),
            ..cooldown_policy()
        };

        let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
        assert_eq!(verdict, Eligibility::Ineligible(IneligibilityReason::GlobalCooldown));
    }

    #[test]
    fn rotation_depth_excludes_at_threshold() {
        let policy = RepetitionPolicy {
            org_rotation_depth: Some(20),
            ..Default::default()
        };
        let evaluator = PolicyEvaluator::new(&policy, now());

        let below = ExposureSlice::default().with_org_distinct_candidates(19);
        let at = ExposureSlice::default().with_org_distinct_candidates(20);

        assert_eq!(evaluator.evaluate(ItemStatus::Published, &below), Eligibility::Eligible);
        assert_eq!(
            evaluator.evaluate(ItemStatus::Published, &at),
            Eligibility::Ineligible(IneligibilityReason::OrgRotationDepthReached)
        );
    }

    #[test]
    fn frozen_item_is_rejected_last() {
        let policy = RepetitionPolicy {
            freeze_after_exposures: Some(500),
            ..Default::default()
        };
        let slice = ExposureSlice::default().with_item_stats(ItemExposureStats {
            last_exposed_at: None,
            total_exposures: 500,
        });
        let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
        assert_eq!(verdict, Eligibility::Ineligible(IneligibilityReason::Frozen));
    }

    #[test]
    fn reason_serializes_snake_case() {
        let json = serde_json::to_string(&IneligibilityReason::OrgRotationDepthReached).unwrap();
        assert_eq!(json, "\"org_rotation_depth_reached\"");
    }

    proptest! {
        #[test]
        fn evaluation_is_deterministic(
            cooldown in 0u32..200,
            max in proptest::option::of(1u32..10),
            exposures in 0u32..12,
            days_ago in 0i64..400,
            depth in proptest::option::of(0u32..30),
            distinct in 0u32..40,
        ) {
            let policy = RepetitionPolicy {
                cooldown_days_per_candidate: cooldown,
                max_exposures_per_candidate: max,
                org_rotation_depth: depth,
                ..Default::default()
            };
            let slice = ExposureSlice {
                candidate_exposures: exposures,
                candidate_last_exposed_at: (exposures > 0).then(|| now().minus_days(days_ago)),
                item_stats: ItemExposureStats::default(),
                org_distinct_candidates: distinct,
            };
            let evaluator = PolicyEvaluator::new(&policy, now());
            prop_assert_eq!(
                evaluator.evaluate(ItemStatus::Published, &slice),
                evaluator.evaluate(ItemStatus::Published, &slice)
            );
        }

        #[test]
        fn cooldown_is_strict_without_override(
            cooldown in 1u32..365,
            days_ago in 0i64..365,
            max in proptest::option::of(1u32..10),
        ) {
            let policy = RepetitionPolicy {
                cooldown_days_per_candidate: cooldown,
                max_exposures_per_candidate: max,
                ..Default::default()
            };
            let slice = ExposureSlice {
                candidate_exposures: 1,
                candidate_last_exposed_at: Some(now().minus_days(days_ago)),
                ..Default::default()
            };
            let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
            if days_ago < i64::from(cooldown) {
                prop_assert_eq!(verdict, Eligibility::Ineligible(IneligibilityReason::CandidateCooldown));
            } else {
                prop_assert!(verdict != Eligibility::Ineligible(IneligibilityReason::CandidateCooldown));
            }
        }

        #[test]
        fn rotation_never_admits_at_or_above_depth(depth in 1u32..50, extra in 0u32..50) {
            let policy = RepetitionPolicy {
                org_rotation_depth: Some(depth),
                ..Default::default()
            };
            let slice = ExposureSlice::default().with_org_distinct_candidates(depth + extra);
            let verdict = PolicyEvaluator::new(&policy, now()).evaluate(ItemStatus::Published, &slice);
            prop_assert!(!verdict.is_eligible());
        }
    }
}
