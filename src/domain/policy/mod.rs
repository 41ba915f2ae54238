//! Policy module - repetition policy and the pure eligibility evaluator.

mod evaluator;
mod repetition;

pub use evaluator::{Eligibility, ExposureSlice, IneligibilityReason, PolicyEvaluator};
pub use repetition::RepetitionPolicy;
