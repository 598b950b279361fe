//! Call Session Controller
//!
//! Features:
//! - Session state machine (`Connecting → Active → ToolDispatch* → Terminating → Closed`)
//! - Tenant, profile and caller resolution from the session start message
//! - Sequenced tool dispatch through the profile's registry
//! - Per-turn knowledge context injection
//! - Usage accounting flushed once per call

pub mod controller;
pub mod events;
pub mod metadata;
pub mod services;
pub mod state;
pub mod telemetry;

pub use controller::{CallController, CloseReason, SessionOutcome};
pub use events::SessionEvent;
pub use metadata::{JobMetadata, SessionStart};
pub use services::AgentServices;
pub use state::SessionState;
pub use telemetry::TracingUsageSink;

use thiserror::Error;

use call_agent_core::TransportError;
use call_agent_tools::RegistryError;

/// Agent errors
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition {
        from: SessionState,
        to: SessionState,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Initialization error: {0}")]
    Initialization(String),
}

impl From<AgentError> for call_agent_core::Error {
    fn from(err: AgentError) -> Self {
        match err {
            AgentError::Transport(e) => call_agent_core::Error::Transport(e),
            other => call_agent_core::Error::Session(other.to_string()),
        }
    }
}
