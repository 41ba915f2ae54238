//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, and error types that form the
//! vocabulary of the selection domain.

mod errors;
mod ids;
mod state_machine;
mod timestamp;

pub use errors::{ErrorCode, ValidationError};
pub use ids::{
    CandidateId, ExposureId, HolderId, InstanceId, ItemId, OrganizationId, SectionId, TemplateId,
};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
