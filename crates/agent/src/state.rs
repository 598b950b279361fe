//! Session state machine
//!
//! ```text
//! Connecting ──▶ Active ◀──▶ ToolDispatch
//!     │            │             │
//!     └────────────┴─────────────┴──▶ Terminating ──▶ Closed
//! ```
//!
//! `Terminating` is only entered after a terminal tool succeeded, the caller
//! disconnected or the transport failed. Nothing leaves it except `Closed`.

use serde::Serialize;
use std::fmt;

use crate::AgentError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// Resolving identity and configuring the model
    Connecting,
    /// Conversation running, waiting for the next event
    Active,
    /// A tool call is executing
    ToolDispatch,
    /// Releasing the room and the model session
    Terminating,
    /// Usage flushed, nothing more happens
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Active => "active",
            Self::ToolDispatch => "tool_dispatch",
            Self::Terminating => "terminating",
            Self::Closed => "closed",
        }
    }

    pub fn can_transition_to(&self, next: SessionState) -> bool {
        use SessionState::*;
        matches!(
            (self, next),
            (Connecting, Active)
                | (Connecting, Terminating)
                | (Active, ToolDispatch)
                | (Active, Terminating)
                | (ToolDispatch, Active)
                | (ToolDispatch, Terminating)
                | (Terminating, Closed)
        )
    }

    /// Checked transition
    pub fn transition(self, next: SessionState) -> Result<SessionState, AgentError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(AgentError::InvalidTransition {
                from: self,
                to: next,
            })
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminating | Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path() {
        let state = SessionState::Connecting
            .transition(SessionState::Active)
            .and_then(|s| s.transition(SessionState::ToolDispatch))
            .and_then(|s| s.transition(SessionState::Active))
            .and_then(|s| s.transition(SessionState::ToolDispatch))
            .and_then(|s| s.transition(SessionState::Terminating))
            .and_then(|s| s.transition(SessionState::Closed))
            .unwrap();
        assert_eq!(state, SessionState::Closed);
    }

    #[test]
    fn test_no_way_back_from_terminating() {
        for next in [
            SessionState::Connecting,
            SessionState::Active,
            SessionState::ToolDispatch,
        ] {
            assert!(!SessionState::Terminating.can_transition_to(next));
        }
        assert!(SessionState::Closed.transition(SessionState::Active).is_err());
    }

    #[test]
    fn test_closed_only_via_terminating() {
        assert!(!SessionState::Active.can_transition_to(SessionState::Closed));
        assert!(!SessionState::ToolDispatch.can_transition_to(SessionState::Closed));
        assert!(!SessionState::Connecting.can_transition_to(SessionState::Closed));
    }

    #[test]
    fn test_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(SessionState::ToolDispatch).unwrap(),
            serde_json::json!("tool_dispatch")
        );
    }
}
