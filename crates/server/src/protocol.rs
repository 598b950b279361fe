//! Gateway wire protocol
//!
//! JSON text frames tagged by `type`. The gateway owns the audio and the
//! model connection; the server only drives the conversation.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use call_agent_agent::SessionEvent;
use call_agent_core::{ToolSchema, UsageMetrics};

/// Gateway → server
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    SessionStarted {
        #[serde(default)]
        metadata: Option<Value>,
        #[serde(default)]
        participant_identity: Option<String>,
    },
    ToolCall {
        call_id: String,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
    UserTurn {
        text: String,
    },
    Usage(UsageMetrics),
    Ack {
        request_id: String,
        ok: bool,
        #[serde(default)]
        error: Option<String>,
    },
    Disconnected,
}

impl GatewayMessage {
    /// Session event carried by this message, if any
    pub fn into_event(self) -> Option<SessionEvent> {
        match self {
            Self::ToolCall {
                call_id,
                name,
                arguments,
            } => Some(SessionEvent::tool_call(call_id, name, normalize_arguments(arguments))),
            Self::UserTurn { text } => Some(SessionEvent::user_turn(text)),
            Self::Usage(metrics) => Some(SessionEvent::Usage(metrics)),
            Self::Disconnected => Some(SessionEvent::CallerDisconnected),
            Self::SessionStarted { .. } | Self::Ack { .. } => None,
        }
    }
}

/// Realtime models send arguments as a JSON-encoded string
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::Null => Value::Object(Default::default()),
        Value::String(raw) if raw.trim().is_empty() => Value::Object(Default::default()),
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        other => other,
    }
}

/// Server → gateway; every command is acknowledged by `request_id`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerCommand {
    Configure {
        request_id: String,
        instructions: String,
        tools: Vec<ToolSchema>,
    },
    GenerateReply {
        request_id: String,
        instructions: String,
    },
    AddContext {
        request_id: String,
        content: String,
    },
    Say {
        request_id: String,
        text: String,
        allow_interruptions: bool,
    },
    WaitForPlayout {
        request_id: String,
    },
    ToolResult {
        request_id: String,
        call_id: String,
        output: Value,
        is_error: bool,
    },
    Close {
        request_id: String,
    },
}

impl ServerCommand {
    pub fn request_id(&self) -> &str {
        match self {
            Self::Configure { request_id, .. }
            | Self::GenerateReply { request_id, .. }
            | Self::AddContext { request_id, .. }
            | Self::Say { request_id, .. }
            | Self::WaitForPlayout { request_id }
            | Self::ToolResult { request_id, .. }
            | Self::Close { request_id } => request_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_gateway_messages() {
        let msg: GatewayMessage = serde_json::from_value(json!({
            "type": "session_started",
            "metadata": "{\"tenant_id\": \"acme\"}",
        }))
        .unwrap();
        assert!(matches!(msg, GatewayMessage::SessionStarted { participant_identity: None, .. }));

        let msg: GatewayMessage =
            serde_json::from_value(json!({"type": "usage", "llm_prompt_tokens": 12})).unwrap();
        assert_eq!(
            msg.into_event(),
            Some(SessionEvent::Usage(UsageMetrics {
                llm_prompt_tokens: 12,
                ..Default::default()
            }))
        );

        let msg: GatewayMessage =
            serde_json::from_value(json!({"type": "ack", "request_id": "r1", "ok": true})).unwrap();
        assert!(msg.into_event().is_none());

        let msg: GatewayMessage = serde_json::from_value(json!({"type": "disconnected"})).unwrap();
        assert_eq!(msg.into_event(), Some(SessionEvent::CallerDisconnected));
    }

    #[test]
    fn test_tool_call_arguments_normalized() {
        let msg: GatewayMessage = serde_json::from_value(json!({
            "type": "tool_call",
            "call_id": "c1",
            "name": "process_payment",
            "arguments": "{\"invoice_id\": \"INV-001\", \"payment_amount\": 50}",
        }))
        .unwrap();
        assert_eq!(
            msg.into_event(),
            Some(SessionEvent::tool_call(
                "c1",
                "process_payment",
                json!({"invoice_id": "INV-001", "payment_amount": 50})
            ))
        );

        let msg: GatewayMessage =
            serde_json::from_value(json!({"type": "tool_call", "call_id": "c2", "name": "end_call"}))
                .unwrap();
        assert_eq!(
            msg.into_event(),
            Some(SessionEvent::tool_call("c2", "end_call", json!({})))
        );
    }

    #[test]
    fn test_command_shape() {
        let cmd = ServerCommand::Say {
            request_id: "r1".into(),
            text: "Goodbye".into(),
            allow_interruptions: false,
        };
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            json!({"type": "say", "request_id": "r1", "text": "Goodbye", "allow_interruptions": false})
        );
        assert_eq!(cmd.request_id(), "r1");
    }
}
