//! HTTP DTOs for selection and answer endpoints.

use serde::{Deserialize, Serialize};

use crate::domain::exposure::ExposureResult;
use crate::domain::selection::TemplateSnapshot;

// ════════════════════════════════════════════════════════════════════════════════
// Request DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Request to assemble a test instance.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectQuestionsRequest {
    /// Template frozen by the authoring side, including its policy digest.
    pub template: TemplateSnapshot,
    pub candidate_id: String,
    pub organization_id: String,
    /// Fixed seed for reproducible ordering; generated when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// Request to record the result of an answered item.
#[derive(Debug, Clone, Deserialize)]
pub struct RecordAnswerRequest {
    pub item_id: String,
    pub instance_id: String,
    pub result: ExposureResult,
}

// ════════════════════════════════════════════════════════════════════════════════
// Response DTOs
// ════════════════════════════════════════════════════════════════════════════════

/// Liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}
