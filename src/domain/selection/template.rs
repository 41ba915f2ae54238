//! Template snapshot - the immutable input to one selection request.
//!
//! The snapshot pins the repetition policy with a SHA-256 digest. The engine
//! verifies the digest when the request starts and again right before
//! commit, so a policy that drifted from its recorded digest can never
//! drive a selection.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

use crate::domain::foundation::{SectionId, TemplateId, ValidationError};
use crate::domain::item::TaxonomyFilter;
use crate::domain::policy::RepetitionPolicy;

/// Whether the caller is delivering a high- or low-stakes test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stakes {
    /// Shortage fails the whole request.
    Assessment,
    /// Shortage degrades to an under-filled, annotated instance.
    Practice,
}

impl Stakes {
    pub fn tolerates_shortage(&self) -> bool {
        matches!(self, Stakes::Practice)
    }
}

impl fmt::Display for Stakes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stakes::Assessment => "assessment",
            Stakes::Practice => "practice",
        };
        write!(f, "{}", s)
    }
}

/// One section of a template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionRequirement {
    pub id: SectionId,
    /// Collision-scope topic; defaults to the section id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
    pub filter: TaxonomyFilter,
    pub count: u32,
}

impl SectionRequirement {
    pub fn new(id: SectionId, filter: TaxonomyFilter, count: u32) -> Self {
        Self {
            id,
            topic: None,
            filter,
            count,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Topic used for the reservation scope.
    pub fn scope_topic(&self) -> &str {
        self.topic.as_deref().unwrap_or_else(|| self.id.as_str())
    }
}

/// Frozen copy of a template, embedded verbatim in every instance.
///
/// Deserializing runs the same structural checks as [`TemplateSnapshot::freeze`];
/// the policy digest is left to the engine so drift surfaces as a stale policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawTemplateSnapshot")]
pub struct TemplateSnapshot {
    template_id: TemplateId,
    version: u32,
    stakes: Stakes,
    policy: RepetitionPolicy,
    sections: Vec<SectionRequirement>,
    policy_digest: String,
}

impl TemplateSnapshot {
    /// Validates the template and pins its policy digest.
    pub fn freeze(
        template_id: TemplateId,
        version: u32,
        stakes: Stakes,
        policy: RepetitionPolicy,
        sections: Vec<SectionRequirement>,
    ) -> Result<Self, ValidationError> {
        validate_parts(&policy, &sections)?;
        let policy_digest = digest_policy(&policy);
        Ok(Self {
            template_id,
            version,
            stakes,
            policy,
            sections,
            policy_digest,
        })
    }

    pub fn template_id(&self) -> &TemplateId {
        &self.template_id
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    pub fn stakes(&self) -> Stakes {
        self.stakes
    }

    pub fn policy(&self) -> &RepetitionPolicy {
        &self.policy
    }

    pub fn sections(&self) -> &[SectionRequirement] {
        &self.sections
    }

    pub fn policy_digest(&self) -> &str {
        &self.policy_digest
    }

    /// Recomputes the digest of the embedded policy.
    pub fn current_policy_digest(&self) -> String {
        digest_policy(&self.policy)
    }

    /// True if the embedded policy still matches the pinned digest.
    pub fn verify_policy(&self) -> bool {
        self.current_policy_digest() == self.policy_digest
    }

    /// Total number of items requested across all sections.
    pub fn total_required(&self) -> u32 {
        self.sections.iter().map(|s| s.count).sum()
    }
}

/// Wire shape of a snapshot before validation.
#[derive(Deserialize)]
struct RawTemplateSnapshot {
    template_id: TemplateId,
    version: u32,
    stakes: Stakes,
    policy: RepetitionPolicy,
    sections: Vec<SectionRequirement>,
    policy_digest: String,
}

impl TryFrom<RawTemplateSnapshot> for TemplateSnapshot {
    type Error = ValidationError;

    fn try_from(raw: RawTemplateSnapshot) -> Result<Self, Self::Error> {
        validate_parts(&raw.policy, &raw.sections)?;
        if raw.policy_digest.is_empty() {
            return Err(ValidationError::empty_field("policy_digest"));
        }
        Ok(Self {
            template_id: raw.template_id,
            version: raw.version,
            stakes: raw.stakes,
            policy: raw.policy,
            sections: raw.sections,
            policy_digest: raw.policy_digest,
        })
    }
}

fn validate_parts(
    policy: &RepetitionPolicy,
    sections: &[SectionRequirement],
) -> Result<(), ValidationError> {
    policy.validate()?;
    if sections.is_empty() {
        return Err(ValidationError::empty_field("sections"));
    }
    let mut seen = HashSet::new();
    for section in sections {
        if !seen.insert(&section.id) {
            return Err(ValidationError::invalid_format(
                "sections",
                format!("duplicate section id '{}'", section.id),
            ));
        }
        section.filter.validate()?;
    }
    Ok(())
}

fn digest_policy(policy: &RepetitionPolicy) -> String {
    let digest = Sha256::digest(policy.canonical_form().as_bytes());
    format!("sha256:{:x}", digest)
}
