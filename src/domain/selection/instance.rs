//! Test instance - the finalized, immutable result of a selection.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::foundation::{
    CandidateId, InstanceId, ItemId, OrganizationId, SectionId, Timestamp, ValidationError,
};

use super::shortage::SectionShortage;
use super::template::TemplateSnapshot;

/// An item pinned at the version that was selected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedItem {
    pub item_id: ItemId,
    pub version: u32,
}

/// Ordered items assigned to one section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionAssignment {
    pub section_id: SectionId,
    pub required: u32,
    pub items: Vec<PinnedItem>,
    /// Present only for practice instances that could not be filled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shortfall: Option<SectionShortage>,
}

impl SectionAssignment {
    pub fn is_under_filled(&self) -> bool {
        (self.items.len() as u32) < self.required
    }
}

/// A finalized test instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestInstance {
    id: InstanceId,
    template: TemplateSnapshot,
    candidate_id: CandidateId,
    organization_id: OrganizationId,
    sections: Vec<SectionAssignment>,
    seed: u64,
    created_at: Timestamp,
}

impl TestInstance {
    /// Assembles an instance, enforcing that no item appears twice.
    pub fn assemble(
        id: InstanceId,
        template: TemplateSnapshot,
        candidate_id: CandidateId,
        organization_id: OrganizationId,
        sections: Vec<SectionAssignment>,
        seed: u64,
        created_at: Timestamp,
    ) -> Result<Self, ValidationError> {
        let mut seen = HashSet::new();
        for item in sections.iter().flat_map(|s| s.items.iter()) {
            if !seen.insert(&item.item_id) {
                return Err(ValidationError::invalid_format(
                    "sections",
                    format!("item '{}' assigned more than once", item.item_id),
                ));
            }
        }
        Ok(Self {
            id,
            template,
            candidate_id,
            organization_id,
            sections,
            seed,
            created_at,
        })
    }

    pub fn id(&self) -> &InstanceId {
        &self.id
    }

    pub fn template(&self) -> &TemplateSnapshot {
        &self.template
    }

    pub fn candidate_id(&self) -> &CandidateId {
        &self.candidate_id
    }

    pub fn organization_id(&self) -> &OrganizationId {
        &self.organization_id
    }

    pub fn sections(&self) -> &[SectionAssignment] {
        &self.sections
    }

    pub fn section(&self, id: &SectionId) -> Option<&SectionAssignment> {
        self.sections.iter().find(|s| &s.section_id == id)
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn created_at(&self) -> &Timestamp {
        &self.created_at
    }

    /// Every assigned item id, in section order.
    pub fn item_ids(&self) -> impl Iterator<Item = &ItemId> {
        self.sections
            .iter()
            .flat_map(|s| s.items.iter().map(|i| &i.item_id))
    }

    pub fn is_under_filled(&self) -> bool {
        self.sections.iter().any(SectionAssignment::is_under_filled)
    }
}
