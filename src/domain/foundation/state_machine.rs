//! Lifecycle enums with a checked transition table.

use super::ValidationError;

/// A status enum whose legal moves are declared up front.
///
/// ```ignore
/// let mut state = SelectionState::Resolving;
/// state.advance(SelectionState::PreflightChecked)?;
/// ```
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    fn can_transition_to(&self, target: &Self) -> bool;

    /// Every state reachable in one step, in declaration order.
    fn valid_transitions(&self) -> Vec<Self>;

    fn transition_to(&self, target: Self) -> Result<Self, ValidationError> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(ValidationError::invalid_format(
                "state_transition",
                format!("{:?} cannot move to {:?}", self, target),
            ))
        }
    }

    /// In-place form of [`StateMachine::transition_to`]; `self` is unchanged on error.
    fn advance(&mut self, target: Self) -> Result<(), ValidationError> {
        *self = self.transition_to(target)?;
        Ok(())
    }

    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
