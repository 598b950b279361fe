//! Events driving a call session

use serde_json::Value;

use call_agent_core::UsageMetrics;

/// Input to the controller, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The model elected to call a tool
    ToolCall {
        call_id: String,
        name: String,
        arguments: Value,
    },
    /// The caller finished speaking
    UserTurnCompleted { text: String },
    /// Usage delta reported by the gateway
    Usage(UsageMetrics),
    /// The caller hung up or the gateway went away
    CallerDisconnected,
}

impl SessionEvent {
    pub fn tool_call(call_id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self::ToolCall {
            call_id: call_id.into(),
            name: name.into(),
            arguments,
        }
    }

    pub fn user_turn(text: impl Into<String>) -> Self {
        Self::UserTurnCompleted { text: text.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ToolCall { .. } => "tool_call",
            Self::UserTurnCompleted { .. } => "user_turn",
            Self::Usage(_) => "usage",
            Self::CallerDisconnected => "disconnected",
        }
    }
}
