//! Structured shortage reports.
//!
//! A shortage is a content-availability fact: it never changes within the
//! lifetime of a request and is the only failure content operations act on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::foundation::{SectionId, TemplateId};
use crate::domain::policy::IneligibilityReason;

use super::template::Stakes;

/// Count of excluded items per reason.
pub type ReasonHistogram = BTreeMap<IneligibilityReason, u32>;

/// Shortage details for one under-filled section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionShortage {
    pub section: SectionId,
    pub available: u32,
    pub required: u32,
    /// `required` scaled by the pre-flight safety margin.
    #[serde(default)]
    pub preflight_required: u32,
    pub reason_histogram: ReasonHistogram,
}

impl SectionShortage {
    pub fn missing(&self) -> u32 {
        self.required.saturating_sub(self.available)
    }
}

/// Report returned when one or more sections cannot be filled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortageReport {
    pub template_id: TemplateId,
    pub stakes: Stakes,
    pub sections: Vec<SectionShortage>,
}

impl ShortageReport {
    pub fn section(&self, id: &SectionId) -> Option<&SectionShortage> {
        self.sections.iter().find(|s| &s.section == id)
    }

    /// Human-facing summary for content operations.
    pub fn summary(&self) -> String {
        self.sections
            .iter()
            .map(|s| {
                let margin = if s.preflight_required > s.required {
                    format!(", {} needed with safety margin", s.preflight_required)
                } else {
                    String::new()
                };
                let reasons: Vec<String> = s
                    .reason_histogram
                    .iter()
                    .map(|(reason, count)| format!("{} {}", count, reason.describe()))
                    .collect();
                if reasons.is_empty() {
                    format!(
                        "section {}: {}/{} available{}",
                        s.section, s.available, s.required, margin
                    )
                } else {
                    format!(
                        "section {}: {}/{} available{} ({})",
                        s.section,
                        s.available,
                        s.required,
                        margin,
                        reasons.join("; ")
                    )
                }
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> ShortageReport {
        let mut histogram = ReasonHistogram::new();
        histogram.insert(IneligibilityReason::CandidateCooldown, 3);
        ShortageReport {
            template_id: TemplateId::new("tpl").unwrap(),
            stakes: Stakes::Assessment,
            sections: vec![SectionShortage {
                section: SectionId::new("dsa").unwrap(),
                available: 12,
                required: 20,
                preflight_required: 30,
                reason_histogram: histogram,
            }],
        }
    }

    #[test]
    fn missing_is_the_gap() {
        assert_eq!(report().sections[0].missing(), 8);
    }

    #[test]
    fn histogram_serializes_with_reason_keys() {
        let json = serde_json::to_value(report()).unwrap();
        assert_eq!(
            json["sections"][0]["reason_histogram"]["candidate_cooldown"],
            serde_json::json!(3)
        );
        assert_eq!(json["stakes"], serde_json::json!("assessment"));
    }

    #[test]
    fn summary_names_every_section() {
        let summary = report().summary();
        assert!(summary.contains("section dsa: 12/20 available, 30 needed with safety margin"));
        assert!(summary.contains("cooldown"));
    }
}
