//! Conversational model boundary

use async_trait::async_trait;

use super::{ToolOutput, ToolSchema};
use crate::TransportError;

/// The realtime language model driving the conversation
///
/// Calls resolve once the far side has acknowledged the command.
/// `generate_reply` resolves only after the reply has been spoken.
#[async_trait]
pub trait ConversationModel: Send + Sync {
    /// Set the system instructions and the callable tools
    async fn configure(&self, instructions: &str, tools: &[ToolSchema]) -> Result<(), TransportError>;

    /// Ask the model to speak, guided by `instructions`
    async fn generate_reply(&self, instructions: &str) -> Result<(), TransportError>;

    /// Add retrieved context ahead of the model's next reply
    async fn add_context(&self, content: &str) -> Result<(), TransportError>;

    /// Return a tool result as the continuation of the conversation
    async fn submit_tool_result(&self, call_id: &str, output: &ToolOutput) -> Result<(), TransportError>;

    /// Close the model session without touching the room
    async fn close(&self) -> Result<(), TransportError>;
}
