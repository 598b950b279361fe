//! Call Agent Server
//!
//! Accepts one gateway WebSocket per call, drives the session controller
//! over it, and serves health, call listing and metrics over HTTP.

pub mod calls;
pub mod gateway;
pub mod http;
pub mod metrics;
pub mod protocol;
pub mod room_service;
pub mod state;
pub mod websocket;

pub use calls::{CallGuard, CallInfo, CallRegistry};
pub use gateway::{GatewayLink, GatewayRoom};
pub use http::create_router;
pub use crate::metrics::init_metrics;
pub use protocol::{GatewayMessage, ServerCommand};
pub use room_service::{LiveKitRoomService, RoomService};
pub use state::AppState;

use thiserror::Error;

use call_agent_agent::AgentError;
use call_agent_config::ConfigError;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Session error: {0}")]
    Session(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ServerError> for axum::http::StatusCode {
    fn from(err: ServerError) -> Self {
        match err {
            ServerError::Session(_) => axum::http::StatusCode::NOT_FOUND,
            ServerError::WebSocket(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::InvalidRequest(_) => axum::http::StatusCode::BAD_REQUEST,
            ServerError::Conflict(_) => axum::http::StatusCode::CONFLICT,
            ServerError::Unavailable(_) => axum::http::StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Config(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
            ServerError::Internal(_) => axum::http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<AgentError> for ServerError {
    fn from(err: AgentError) -> Self {
        ServerError::Session(err.to_string())
    }
}

impl From<ConfigError> for ServerError {
    fn from(err: ConfigError) -> Self {
        ServerError::Config(err.to_string())
    }
}
