//! Error types shared across the call agent crates

use thiserror::Error;

/// Result alias using the core error type
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error type
///
/// Crate-specific errors convert into this at crate boundaries.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Tool error: {0}")]
    Tool(String),

    #[error("Retrieval error: {0}")]
    Rag(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Session error: {0}")]
    Session(String),
}

/// Errors raised at the room / conversational model boundary
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The far side of the call is gone
    #[error("Disconnected")]
    Disconnected,

    /// A command was not acknowledged in time
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// The far side acknowledged the command with a failure
    #[error("Rejected: {0}")]
    Rejected(String),

    /// Network or protocol failure
    #[error("I/O error: {0}")]
    Io(String),
}
