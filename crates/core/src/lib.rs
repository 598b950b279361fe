//! Core traits and types for the call agent
//!
//! This crate provides foundational types used across all other crates:
//! - Tenant and caller identity types
//! - The user record shared by the directory and the tools
//! - Core traits for the external boundaries (conversational model, room,
//!   knowledge retrieval, usage telemetry)
//! - The MCP-style tool interface
//! - Usage accounting and retry policy
//! - Error types

pub mod error;
pub mod identity;
pub mod retry;
pub mod session;
pub mod traits;
pub mod usage;
pub mod user;

pub use error::{Error, Result, TransportError};
pub use identity::{CallerIdentity, TenantId, TenantIdError};
pub use retry::RetryPolicy;
pub use session::CallContext;
pub use usage::{ToolCounts, UsageCollector, UsageMetrics, UsageSummary};
pub use user::UserRecord;

pub use traits::{
    args, optional_str, required_str, validate_property, ContentBlock, ContextRetriever,
    ConversationModel, ErrorCode, InputSchema, PropertySchema, RoomControl, SideEffect, Tool,
    ToolError, ToolOutput, ToolSchema, UsageSink, DEFAULT_TOOL_TIMEOUT_SECS,
};
