//! Lifecycle of a single selection request.
//!
//! ```text
//! Resolving -> PreflightChecked -> Reserving -> Committed
//!                     |                |   \
//!                     v                |    -> ShortageFailed
//!               ShortageFailed         v
//!                                PartiallyReserved -> Backfilling -> Committed
//!                                                         |   \
//!                                                         |    -> Reserving (next section)
//!                                                         v
//!                                                   ShortageFailed
//! ```
//!
//! Any non-terminal state may move to `Aborted` (cancellation, coordinator
//! timeout, infrastructure failure). There is no retry loop inside the
//! engine.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::StateMachine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionState {
    Resolving,
    PreflightChecked,
    Reserving,
    PartiallyReserved,
    Backfilling,
    Committed,
    ShortageFailed,
    Aborted,
}

impl StateMachine for SelectionState {
    fn can_transition_to(&self, target: &Self) -> bool {
        use SelectionState::*;
        matches!(
            (self, target),
            (Resolving, PreflightChecked)
                | (PreflightChecked, Reserving)
                | (PreflightChecked, ShortageFailed)
                | (Reserving, Reserving)
                | (Reserving, Committed)
                | (Reserving, PartiallyReserved)
                | (Reserving, ShortageFailed)
                | (PartiallyReserved, Backfilling)
                | (Backfilling, Backfilling)
                | (Backfilling, Reserving)
                | (Backfilling, Committed)
                | (Backfilling, ShortageFailed)
                | (Resolving, Aborted)
                | (PreflightChecked, Aborted)
                | (Reserving, Aborted)
                | (PartiallyReserved, Aborted)
                | (Backfilling, Aborted)
        )
    }

    fn valid_transitions(&self) -> Vec<Self> {
        use SelectionState::*;
        match self {
            Resolving => vec![PreflightChecked, Aborted],
            PreflightChecked => vec![Reserving, ShortageFailed, Aborted],
            Reserving => vec![Reserving, Committed, PartiallyReserved, ShortageFailed, Aborted],
            PartiallyReserved => vec![Backfilling, Aborted],
            Backfilling => vec![Backfilling, Reserving, Committed, ShortageFailed, Aborted],
            Committed | ShortageFailed | Aborted => vec![],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SelectionState::*;

    const ALL: [SelectionState; 8] = [
        Resolving,
        PreflightChecked,
        Reserving,
        PartiallyReserved,
        Backfilling,
        Committed,
        ShortageFailed,
        Aborted,
    ];

    #[test]
    fn terminal_states_have_no_exits() {
        assert!(Committed.is_terminal());
        assert!(ShortageFailed.is_terminal());
        assert!(Aborted.is_terminal());
        assert!(!Backfilling.is_terminal());
    }

    #[test]
    fn preflight_must_precede_reservation() {
        assert!(Resolving.transition_to(Reserving).is_err());
        assert_eq!(Resolving.transition_to(PreflightChecked), Ok(PreflightChecked));
    }

    #[test]
    fn partial_reservation_always_backfills() {
        assert_eq!(PartiallyReserved.valid_transitions(), vec![Backfilling, Aborted]);
        assert!(PartiallyReserved.transition_to(Committed).is_err());
    }

    #[test]
    fn can_transition_to_is_consistent_with_valid_transitions() {
        for from in ALL {
            for to in ALL {
                assert_eq!(
                    from.can_transition_to(&to),
                    from.valid_transitions().contains(&to),
                    "{:?} -> {:?}",
                    from,
                    to
                );
            }
        }
    }
}
