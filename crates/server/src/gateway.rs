//! Gateway-backed model and room
//!
//! Commands go out over the gateway socket and are correlated with their
//! `ack` by request id. Every wait is bounded; a closed link fails pending
//! and future commands with `Disconnected`.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use call_agent_core::{ConversationModel, RoomControl, ToolOutput, ToolSchema, TransportError};

use crate::protocol::ServerCommand;
use crate::room_service::RoomService;

type Ack = Result<(), TransportError>;

/// One gateway connection
pub struct GatewayLink {
    outbound: mpsc::Sender<ServerCommand>,
    /// request_id → waiting command
    pending: Mutex<HashMap<String, oneshot::Sender<Ack>>>,
    timeout: Duration,
    closed: AtomicBool,
}

impl GatewayLink {
    pub fn new(outbound: mpsc::Sender<ServerCommand>, timeout: Duration) -> Self {
        Self {
            outbound,
            pending: Mutex::new(HashMap::new()),
            timeout,
            closed: AtomicBool::new(false),
        }
    }

    /// Send a command and wait for its acknowledgement
    async fn request<F>(&self, build: F) -> Result<(), TransportError>
    where
        F: FnOnce(String) -> ServerCommand,
    {
        if self.closed.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }

        let request_id = uuid::Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.lock().insert(request_id.clone(), tx);

        if self.outbound.send(build(request_id.clone())).await.is_err() {
            self.pending.lock().remove(&request_id);
            return Err(TransportError::Disconnected);
        }

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(ack)) => ack,
            // Sender dropped: the link closed while waiting
            Ok(Err(_)) => Err(TransportError::Disconnected),
            Err(_) => {
                self.pending.lock().remove(&request_id);
                tracing::warn!(request_id = %request_id, "Gateway command timed out");
                Err(TransportError::Timeout(self.timeout.as_millis() as u64))
            }
        }
    }

    /// Resolve a pending command from an `ack`
    pub fn complete(&self, request_id: &str, ok: bool, error: Option<String>) {
        let Some(tx) = self.pending.lock().remove(request_id) else {
            tracing::debug!(request_id = %request_id, "Ack for unknown or expired request");
            return;
        };

        let ack = if ok {
            Ok(())
        } else {
            Err(TransportError::Rejected(
                error.unwrap_or_else(|| "rejected by gateway".to_string()),
            ))
        };
        let _ = tx.send(ack);
    }

    /// Fail everything pending and refuse new commands
    pub fn shutdown(&self) {
        self.closed.store(true, Ordering::SeqCst);
        self.pending.lock().clear();
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

#[async_trait]
impl ConversationModel for GatewayLink {
    async fn configure(&self, instructions: &str, tools: &[ToolSchema]) -> Result<(), TransportError> {
        self.request(|request_id| ServerCommand::Configure {
            request_id,
            instructions: instructions.to_string(),
            tools: tools.to_vec(),
        })
        .await
    }

    async fn generate_reply(&self, instructions: &str) -> Result<(), TransportError> {
        self.request(|request_id| ServerCommand::GenerateReply {
            request_id,
            instructions: instructions.to_string(),
        })
        .await
    }

    async fn add_context(&self, content: &str) -> Result<(), TransportError> {
        self.request(|request_id| ServerCommand::AddContext {
            request_id,
            content: content.to_string(),
        })
        .await
    }

    async fn submit_tool_result(&self, call_id: &str, output: &ToolOutput) -> Result<(), TransportError> {
        self.request(|request_id| ServerCommand::ToolResult {
            request_id,
            call_id: call_id.to_string(),
            output: output.to_value(),
            is_error: output.is_error,
        })
        .await
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.request(|request_id| ServerCommand::Close { request_id })
            .await
    }
}

/// Speech goes through the gateway, room administration through the room service
pub struct GatewayRoom {
    link: Arc<GatewayLink>,
    service: Arc<dyn RoomService>,
}

impl GatewayRoom {
    pub fn new(link: Arc<GatewayLink>, service: Arc<dyn RoomService>) -> Self {
        Self { link, service }
    }
}

#[async_trait]
impl RoomControl for GatewayRoom {
    async fn say(&self, text: &str, allow_interruptions: bool) -> Result<(), TransportError> {
        self.link
            .request(|request_id| ServerCommand::Say {
                request_id,
                text: text.to_string(),
                allow_interruptions,
            })
            .await
    }

    async fn wait_for_playout(&self) -> Result<(), TransportError> {
        self.link
            .request(|request_id| ServerCommand::WaitForPlayout { request_id })
            .await
    }

    async fn delete_room(&self, room_name: &str) -> Result<(), TransportError> {
        self.service.delete_room(room_name).await
    }

    async fn transfer_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
        transfer_to: &str,
    ) -> Result<(), TransportError> {
        self.service
            .transfer_participant(room_name, participant_identity, transfer_to)
            .await
    }
}
