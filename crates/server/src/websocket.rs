//! Gateway WebSocket
//!
//! One socket per call. The first frame must be `session_started`; after
//! that, acks resolve pending commands directly and everything else is fed
//! to the call controller as session events.
//!
//! The reader never waits on the controller. Events go through an unbounded
//! hop to a forwarder task, so a controller blocked on a command can still
//! receive the ack that unblocks it.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    http::StatusCode,
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use call_agent_agent::{CallController, JobMetadata, SessionEvent, SessionStart};

use crate::gateway::{GatewayLink, GatewayRoom};
use crate::protocol::{GatewayMessage, ServerCommand};
use crate::state::AppState;
use crate::ServerError;

/// How long the gateway has to announce the session after connecting
const SESSION_START_TIMEOUT: Duration = Duration::from_secs(10);
const EVENT_BUFFER: usize = 64;
const COMMAND_BUFFER: usize = 32;

/// `GET /calls/:room/ws`
pub async fn call_ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Path(room): Path<String>,
) -> Result<Response, StatusCode> {
    let room_name = room.trim().to_string();
    if room_name.is_empty() {
        return Err(ServerError::InvalidRequest("room name is empty".into()).into());
    }
    if state.calls.contains(&room_name) {
        tracing::warn!(room = %room_name, "Rejected second connection for active room");
        return Err(StatusCode::CONFLICT);
    }
    if state.calls.is_full() {
        tracing::warn!(room = %room_name, active = state.calls.count(), "Call capacity reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, room_name)))
}

async fn handle_socket(socket: WebSocket, state: AppState, room_name: String) {
    let (sink, mut stream) = socket.split();

    let Some(start) = await_session_start(&mut stream, &room_name).await else {
        return;
    };

    let (cmd_tx, cmd_rx) = mpsc::channel::<ServerCommand>(COMMAND_BUFFER);
    let writer = tokio::spawn(write_commands(sink, cmd_rx));

    let link = Arc::new(GatewayLink::new(cmd_tx, state.settings.call.command_timeout()));
    let room = Arc::new(GatewayRoom::new(link.clone(), state.room_service.clone()));
    let controller = CallController::new(state.services.clone(), start, link.clone(), room);

    let _guard = match state.calls.register(&room_name, controller.subscribe()) {
        Ok(guard) => guard,
        Err(e) => {
            tracing::warn!(room = %room_name, error = %e, "Could not register call");
            drop(controller);
            drop(link);
            let _ = writer.await;
            return;
        }
    };

    let (event_tx, event_rx) = mpsc::channel::<SessionEvent>(EVENT_BUFFER);
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let forwarder = tokio::spawn(forward_events(inbound_rx, event_tx));
    let mut session = tokio::spawn(controller.run(event_rx));

    let result = loop {
        tokio::select! {
            result = &mut session => break result,
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    route_frame(&link, &inbound_tx, &text, &room_name);
                }
                Some(Ok(Message::Close(_))) | None => {
                    tracing::info!(room = %room_name, "Gateway socket closed");
                    break disconnect(&link, inbound_tx, session).await;
                }
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::warn!(room = %room_name, error = %e, "Gateway socket error");
                    break disconnect(&link, inbound_tx, session).await;
                }
            }
        }
    };

    match result {
        Ok(outcome) => tracing::info!(
            room = %room_name,
            tenant = %outcome.tenant,
            profile = %outcome.profile.as_str(),
            reason = outcome.reason.as_str(),
            tool_calls = outcome.summary.total_tool_calls(),
            "Call finished"
        ),
        Err(e) => tracing::error!(room = %room_name, error = %e, "Call session task failed"),
    }

    forwarder.abort();
    drop(link);
    let _ = writer.await;
}

/// Resolve an ack or queue the frame's session event; never waits
fn route_frame(
    link: &GatewayLink,
    inbound: &mpsc::UnboundedSender<SessionEvent>,
    text: &str,
    room_name: &str,
) {
    match serde_json::from_str::<GatewayMessage>(text) {
        Ok(GatewayMessage::Ack { request_id, ok, error }) => {
            link.complete(&request_id, ok, error);
        }
        Ok(message) => {
            if let Some(event) = message.into_event() {
                if inbound.send(event).is_err() {
                    tracing::debug!(room = %room_name, "Session no longer accepting events");
                }
            }
        }
        Err(e) => {
            tracing::warn!(room = %room_name, error = %e, "Unparseable gateway frame");
        }
    }
}

/// Move queued events into the controller's channel in arrival order
async fn forward_events(
    mut inbound: mpsc::UnboundedReceiver<SessionEvent>,
    events: mpsc::Sender<SessionEvent>,
) {
    while let Some(event) = inbound.recv().await {
        if events.send(event).await.is_err() {
            break;
        }
    }
}

/// Wait for the gateway's `session_started` frame
async fn await_session_start(
    stream: &mut SplitStream<WebSocket>,
    room_name: &str,
) -> Option<SessionStart> {
    let first = tokio::time::timeout(SESSION_START_TIMEOUT, async {
        while let Some(frame) = stream.next().await {
            let Ok(Message::Text(text)) = frame else {
                continue;
            };
            match serde_json::from_str::<GatewayMessage>(&text) {
                Ok(GatewayMessage::SessionStarted {
                    metadata,
                    participant_identity,
                }) => return Some((metadata, participant_identity)),
                Ok(_) => {
                    tracing::debug!(room = %room_name, "Ignoring frame before session_started");
                }
                Err(e) => {
                    tracing::warn!(room = %room_name, error = %e, "Unparseable gateway frame");
                }
            }
        }
        None
    })
    .await;

    match first {
        Ok(Some((metadata, participant_identity))) => Some(
            SessionStart::new(room_name)
                .with_metadata(JobMetadata::from_value(metadata.as_ref()))
                .with_participant_identity(participant_identity),
        ),
        Ok(None) => {
            tracing::info!(room = %room_name, "Gateway closed before session_started");
            None
        }
        Err(_) => {
            tracing::warn!(room = %room_name, "Gateway never sent session_started");
            None
        }
    }
}

/// Fail pending commands, tell the controller, and wait for it to close
async fn disconnect(
    link: &GatewayLink,
    inbound: mpsc::UnboundedSender<SessionEvent>,
    session: tokio::task::JoinHandle<call_agent_agent::SessionOutcome>,
) -> Result<call_agent_agent::SessionOutcome, tokio::task::JoinError> {
    link.shutdown();
    // The forwarder closes the controller's channel once this is drained
    let _ = inbound.send(SessionEvent::CallerDisconnected);
    drop(inbound);
    session.await
}

async fn write_commands(
    mut sink: SplitSink<WebSocket, Message>,
    mut commands: mpsc::Receiver<ServerCommand>,
) {
    while let Some(command) = commands.recv().await {
        let text = match serde_json::to_string(&command) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode gateway command");
                continue;
            }
        };
        if sink.send(Message::Text(text)).await.is_err() {
            break;
        }
    }
    let _ = sink.send(Message::Close(None)).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use call_agent_core::ConversationModel;

    #[tokio::test]
    async fn test_ack_routed_while_controller_is_not_reading() {
        let (cmd_tx, mut cmd_rx) = mpsc::channel(8);
        let link = Arc::new(GatewayLink::new(cmd_tx, Duration::from_millis(500)));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_BUFFER);
        let forwarder = tokio::spawn(forward_events(inbound_rx, event_tx));

        let pending = {
            let link = link.clone();
            tokio::spawn(async move { link.generate_reply("Greet the user").await })
        };
        let command = cmd_rx.recv().await.unwrap();

        // More usage frames than the controller's buffer holds, none consumed
        for n in 0..(EVENT_BUFFER * 2) {
            let frame = format!(r#"{{"type":"usage","llm_prompt_tokens":{}}}"#, n);
            route_frame(&link, &inbound_tx, &frame, "Call-1");
        }
        let ack = format!(r#"{{"type":"ack","request_id":"{}","ok":true}}"#, command.request_id());
        route_frame(&link, &inbound_tx, &ack, "Call-1");

        assert_eq!(pending.await.unwrap(), Ok(()));
        assert_eq!(link.pending_count(), 0);

        // Nothing was dropped and order held
        for n in 0..(EVENT_BUFFER * 2) {
            match event_rx.recv().await {
                Some(SessionEvent::Usage(metrics)) => assert_eq!(metrics.llm_prompt_tokens, n as u64),
                other => panic!("unexpected event: {:?}", other),
            }
        }
        forwarder.abort();
    }

    #[tokio::test]
    async fn test_forwarder_closes_controller_channel_after_draining() {
        let (cmd_tx, _cmd_rx) = mpsc::channel(8);
        let link = GatewayLink::new(cmd_tx, Duration::from_millis(100));
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        let (event_tx, mut event_rx) = mpsc::channel(EVENT_BUFFER);
        let forwarder = tokio::spawn(forward_events(inbound_rx, event_tx));

        route_frame(&link, &inbound_tx, r#"{"type":"user_turn","text":"hi"}"#, "Call-1");
        route_frame(&link, &inbound_tx, "not json", "Call-1");
        route_frame(&link, &inbound_tx, r#"{"type":"disconnected"}"#, "Call-1");
        drop(inbound_tx);

        let mut seen = Vec::new();
        while let Some(event) = event_rx.recv().await {
            seen.push(event.kind());
        }
        assert_eq!(seen, vec!["user_turn", "disconnected"]);
        forwarder.await.unwrap();
    }
}
