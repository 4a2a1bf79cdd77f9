use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of one avatar session.
///
/// `Errored` is terminal: recovery requires a fresh user-initiated start on a
/// new adapter state, never an automatic retry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionState {
    Idle,
    Starting,
    Active,
    Stopping,
    Errored,
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("invalid session transition from {from:?} to {to:?}")]
pub struct InvalidTransition {
    pub from: SessionState,
    pub to: SessionState,
}

impl SessionState {
    pub fn can_transition_to(self, next: SessionState) -> bool {
        matches!(
            (self, next),
            (Self::Idle, Self::Starting)
                | (Self::Starting, Self::Active)
                | (Self::Starting, Self::Errored)
                | (Self::Active, Self::Stopping)
                | (Self::Active, Self::Errored)
                | (Self::Stopping, Self::Idle)
        )
    }

    pub fn transition_to(&mut self, next: SessionState) -> Result<(), InvalidTransition> {
        if self.can_transition_to(next) {
            *self = next;
            return Ok(());
        }

        Err(InvalidTransition { from: *self, to: next })
    }
}

#[cfg(test)]
mod tests {
    use super::SessionState;

    #[test]
    fn allows_the_full_lifecycle() {
        let mut state = SessionState::Idle;
        state.transition_to(SessionState::Starting).expect("idle -> starting");
        state.transition_to(SessionState::Active).expect("starting -> active");
        state.transition_to(SessionState::Stopping).expect("active -> stopping");
        state.transition_to(SessionState::Idle).expect("stopping -> idle");
    }

    #[test]
    fn errored_is_reachable_from_starting_and_active() {
        assert!(SessionState::Starting.can_transition_to(SessionState::Errored));
        assert!(SessionState::Active.can_transition_to(SessionState::Errored));
    }

    #[test]
    fn errored_is_terminal() {
        for next in [
            SessionState::Idle,
            SessionState::Starting,
            SessionState::Active,
            SessionState::Stopping,
        ] {
            assert!(!SessionState::Errored.can_transition_to(next));
        }
    }

    #[test]
    fn idle_cannot_jump_straight_to_active() {
        let mut state = SessionState::Idle;
        let error = state
            .transition_to(SessionState::Active)
            .expect_err("idle -> active must be rejected");
        assert_eq!(error.from, SessionState::Idle);
        assert_eq!(error.to, SessionState::Active);
    }
}
