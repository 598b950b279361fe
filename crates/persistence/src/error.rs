//! Persistence error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse {path}: {message}")]
    Parse { path: String, message: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out after {0}ms")]
    Timeout(u64),

    #[error("Notification failed: {0}")]
    Notification(String),
}

impl PersistenceError {
    pub(crate) fn parse(path: &std::path::Path, err: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    /// Worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Timeout(_) | Self::Notification(_))
    }
}

impl From<PersistenceError> for call_agent_core::Error {
    fn from(err: PersistenceError) -> Self {
        call_agent_core::Error::Persistence(err.to_string())
    }
}
