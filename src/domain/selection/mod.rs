//! Selection module - templates, ranking, shortage reports and instances.
//!
//! Everything here is pure; the orchestration that touches ports lives in
//! `application::handlers::selection`.

mod errors;
mod instance;
mod ranking;
mod shortage;
mod state;
mod template;

pub use errors::SelectionError;
pub use instance::{PinnedItem, SectionAssignment, TestInstance};
pub use ranking::{tie_break_key, DiversityRanker, RankedItem};
pub use shortage::{ReasonHistogram, SectionShortage, ShortageReport};
pub use state::SelectionState;
pub use template::{SectionRequirement, Stakes, TemplateSnapshot};
