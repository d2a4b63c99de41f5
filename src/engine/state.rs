//! Generation session state machine
//!
//! Deterministic finite state machine driving one model's generation session:
//!
//! ```text
//! Idle → Streaming → {AwaitingToolResult ⇄ Streaming} → Finished
//! ```
//!
//! Any state can transition to `Errored` on a stream-level failure. Reaching
//! the step budget is a normal path to `Finished`, not an error.

use crate::errors::{EngineError, Result};
use serde::{Deserialize, Serialize};

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    /// Session created, generation not yet dispatched
    Idle,

    /// Model is producing text fragments
    Streaming,

    /// Tool calls from the current step are executing
    AwaitingToolResult,

    /// Session complete (terminal)
    Finished,

    /// Stream-level failure surfaced to the caller (terminal)
    Errored,
}

/// Events that trigger session transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// Generation request dispatched to the model capability
    Dispatch,

    /// The model requested one or more tool calls this step
    ToolCallsRequested,

    /// Tool outputs fed back; generation resumes
    ToolResultsReady,

    /// Model signaled completion with no further tool calls
    Completion,

    /// Configured step budget reached; normal completion
    BudgetExhausted,

    /// Stream-level failure from the model capability
    StreamFailure,
}

impl SessionState {
    /// Check if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Finished | SessionState::Errored)
    }

    /// Attempt a transition, rejecting invalid edges.
    pub fn transition(&self, event: SessionEvent) -> Result<SessionState> {
        use SessionEvent::*;
        use SessionState::*;

        // Stream failure can occur from any non-terminal state
        if event == StreamFailure && !self.is_terminal() {
            return Ok(Errored);
        }

        let next = match (self, event) {
            (Idle, Dispatch) => Streaming,

            (Streaming, ToolCallsRequested) => AwaitingToolResult,
            (Streaming, Completion) => Finished,
            (Streaming, BudgetExhausted) => Finished,

            (AwaitingToolResult, ToolResultsReady) => Streaming,
            (AwaitingToolResult, BudgetExhausted) => Finished,

            (from, event) => {
                return Err(EngineError::InvalidTransition {
                    from: format!("{from:?}"),
                    to: format!("(via {event:?})"),
                    reason: format!("No valid transition from {from:?} on {event:?}"),
                });
            }
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = SessionState::Idle;
        let state = state.transition(SessionEvent::Dispatch).unwrap();
        assert_eq!(state, SessionState::Streaming);

        let state = state.transition(SessionEvent::ToolCallsRequested).unwrap();
        assert_eq!(state, SessionState::AwaitingToolResult);

        let state = state.transition(SessionEvent::ToolResultsReady).unwrap();
        assert_eq!(state, SessionState::Streaming);

        let state = state.transition(SessionEvent::Completion).unwrap();
        assert_eq!(state, SessionState::Finished);
        assert!(state.is_terminal());
    }

    #[test]
    fn test_budget_exhaustion_is_finished_not_errored() {
        let state = SessionState::Streaming
            .transition(SessionEvent::BudgetExhausted)
            .unwrap();
        assert_eq!(state, SessionState::Finished);

        let state = SessionState::AwaitingToolResult
            .transition(SessionEvent::BudgetExhausted)
            .unwrap();
        assert_eq!(state, SessionState::Finished);
    }

    #[test]
    fn test_stream_failure_from_any_active_state() {
        for state in [
            SessionState::Idle,
            SessionState::Streaming,
            SessionState::AwaitingToolResult,
        ] {
            assert_eq!(
                state.transition(SessionEvent::StreamFailure).unwrap(),
                SessionState::Errored
            );
        }
    }

    #[test]
    fn test_terminal_states_reject_events() {
        assert!(SessionState::Finished
            .transition(SessionEvent::Dispatch)
            .is_err());
        assert!(SessionState::Errored
            .transition(SessionEvent::StreamFailure)
            .is_err());
    }

    #[test]
    fn test_invalid_transitions() {
        assert!(SessionState::Idle
            .transition(SessionEvent::Completion)
            .is_err());
        assert!(SessionState::AwaitingToolResult
            .transition(SessionEvent::Completion)
            .is_err());
    }

    #[test]
    fn test_determinism() {
        let a = SessionState::Streaming.transition(SessionEvent::ToolCallsRequested);
        let b = SessionState::Streaming.transition(SessionEvent::ToolCallsRequested);
        assert_eq!(a.unwrap(), b.unwrap());
    }
}
