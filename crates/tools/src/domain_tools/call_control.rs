//! Terminal tools: transfer and hang up
//!
//! Ordering matters here. A transfer is announced and the announcement has
//! finished playing before the transfer request goes out. Hanging up drains
//! playout and speaks the closing line before the room is deleted.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::future::Future;
use std::time::Duration;

use call_agent_config::CallConfig;
use call_agent_core::{
    CallContext, InputSchema, SideEffect, Tool, ToolError, ToolOutput, ToolSchema, TransportError,
};

/// Text handed to the model when a transfer fails
pub const TRANSFER_FAILED: &str = "could not transfer call";

/// Whole seconds covering `windows` teardown windows, rounded up
fn teardown_budget_secs(call: &CallConfig, windows: u64) -> u64 {
    (windows * call.teardown_timeout_ms).div_ceil(1000)
}

async fn bounded<F>(limit: Duration, step: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    tokio::time::timeout(limit, step)
        .await
        .unwrap_or(Err(TransportError::Timeout(limit.as_millis() as u64)))
}

/// Hand the caller over to a human
pub struct TransferCallTool {
    call: CallConfig,
}

impl TransferCallTool {
    pub fn new(call: CallConfig) -> Self {
        Self { call }
    }

    /// Gateway-reported identity, then the configured one, then the caller's number
    fn participant_identity(&self, ctx: &CallContext) -> Option<String> {
        ctx.participant_identity
            .clone()
            .or_else(|| self.call.transfer_participant_identity.clone())
            .or_else(|| ctx.caller.phone().map(String::from))
    }
}

#[async_trait]
impl Tool for TransferCallTool {
    fn name(&self) -> &str {
        "transfer_call"
    }

    fn description(&self) -> &str {
        "Transfer the call to a human agent, called after confirming with the user"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object(),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Terminal
    }

    async fn execute(&self, ctx: &CallContext, _input: Value) -> Result<ToolOutput, ToolError> {
        let Some(identity) = self.participant_identity(ctx) else {
            tracing::error!(room = %ctx.room_name, "No participant identity to transfer");
            return Ok(ToolOutput::text_error(TRANSFER_FAILED));
        };

        // Let the message play fully before transferring
        let announced = match ctx.model.generate_reply(&self.call.transfer_announcement).await {
            Ok(()) => ctx.room.wait_for_playout().await,
            Err(e) => Err(e),
        };
        if let Err(e) = announced {
            tracing::error!(room = %ctx.room_name, error = %e, "Transfer announcement failed, not transferring");
            return Ok(ToolOutput::text_error(TRANSFER_FAILED));
        }

        let transfer_to = self.call.transfer_uri();
        let result = bounded(
            self.call.teardown_timeout(),
            ctx.room
                .transfer_participant(&ctx.room_name, &identity, &transfer_to),
        )
        .await;

        match result {
            Ok(()) => {
                tracing::info!(room = %ctx.room_name, transfer_to = %transfer_to, "Call transferred");
                Ok(ToolOutput::json(json!({
                    "transferred": true,
                    "transfer_to": transfer_to,
                })))
            }
            Err(e) => {
                tracing::error!(room = %ctx.room_name, error = %e, "error transferring call");
                Ok(ToolOutput::text_error(TRANSFER_FAILED))
            }
        }
    }

    fn timeout_secs(&self) -> Option<u64> {
        Some(self.call.tool_timeout_secs + teardown_budget_secs(&self.call, 1) + 1)
    }
}

/// Say goodbye and tear the room down
///
/// Always ends the call. When any step fails the model session is closed
/// instead of deleting the room.
pub struct EndCallTool {
    call: CallConfig,
}

impl EndCallTool {
    pub fn new(call: CallConfig) -> Self {
        Self { call }
    }

    async fn hang_up(&self, ctx: &CallContext) -> Result<(), TransportError> {
        let limit = self.call.teardown_timeout();

        // 1. Let the agent finish speaking its current response
        bounded(limit, ctx.room.wait_for_playout()).await?;
        tracing::info!(room = %ctx.room_name, "Agent finished speaking");

        // 2. Say goodbye
        bounded(limit, ctx.room.say(&self.call.closing_line, false)).await?;

        // 3. Tear down the room
        tracing::info!(room = %ctx.room_name, "Attempting to delete room");
        bounded(limit, ctx.room.delete_room(&ctx.room_name)).await?;
        tracing::info!(room = %ctx.room_name, "Successfully deleted room");
        Ok(())
    }
}

#[async_trait]
impl Tool for EndCallTool {
    fn name(&self) -> &str {
        "end_call"
    }

    fn description(&self) -> &str {
        "Use this tool when the task has been completed and the call should end"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object(),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Terminal
    }

    async fn execute(&self, ctx: &CallContext, _input: Value) -> Result<ToolOutput, ToolError> {
        match self.hang_up(ctx).await {
            Ok(()) => Ok(ToolOutput::json(json!({ "ended": true, "room_deleted": true }))),
            Err(e) => {
                tracing::error!(room = %ctx.room_name, error = %e, "Error during end_call");

                match bounded(self.call.teardown_timeout(), ctx.model.close()).await {
                    Ok(()) => tracing::info!(room = %ctx.room_name, "Fallback session close completed"),
                    Err(close_error) => tracing::error!(
                        room = %ctx.room_name,
                        error = %close_error,
                        "Fallback session close failed"
                    ),
                }

                Ok(ToolOutput::json(json!({ "ended": true, "room_deleted": false })))
            }
        }
    }

    /// Every step is bounded, so the whole sequence fits in four teardown windows
    fn timeout_secs(&self) -> Option<u64> {
        Some(teardown_budget_secs(&self.call, 4) + 1)
    }
}
