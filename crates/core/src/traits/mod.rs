//! Core traits for the call agent
//!
//! Every external boundary of a call is a trait so sessions can be driven
//! by the live gateway in production and by scripted fakes in tests.
//!
//! ```text
//! Conversation:
//!   - ConversationModel: instructions, replies, context and tool results
//!
//! Room:
//!   - RoomControl: speech output, playout drain, teardown and transfer
//!
//! Tools:
//!   - Tool: MCP-compatible tool interface
//!
//! Retrieval:
//!   - ContextRetriever: tenant-scoped knowledge context
//!
//! Telemetry:
//!   - UsageSink: receives the usage summary when a call closes
//! ```

mod model;
mod retriever;
mod room;
mod telemetry;
mod tool;

pub use model::ConversationModel;
pub use retriever::ContextRetriever;
pub use room::RoomControl;
pub use telemetry::UsageSink;
pub use tool::{
    args, optional_str, required_str, validate_property, ContentBlock, ErrorCode, InputSchema,
    PropertySchema, SideEffect, Tool, ToolError, ToolOutput, ToolSchema, DEFAULT_TOOL_TIMEOUT_SECS,
};
