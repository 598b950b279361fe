//! Call Session Controller
//!
//! Drives one call from the session start message to teardown. Events are
//! handled one at a time so the model's turns, tool calls and speech stay in
//! conversational order.
//!
//! ## Event flow
//!
//! ```text
//!   gateway ──SessionEvent──▶ mpsc ──▶ CallController ──▶ ToolExecutor
//!                                          │    ▲               │
//!                                          ▼    └──ToolOutput───┘
//!                                 ConversationModel / RoomControl
//! ```
//!
//! While a tool runs the channel is still polled: usage is accumulated at
//! once, further tool calls and user turns wait for the tool to finish, and a
//! disconnect cancels the tool.

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, watch};
use tracing::Instrument;

use call_agent_config::AgentProfile;
use call_agent_core::{
    CallContext, ConversationModel, RoomControl, TenantId, ToolError, ToolOutput,
    TransportError, UsageCollector, UsageSummary,
};
use call_agent_tools::{ToolExecutor, ToolName};

use crate::telemetry::{record_session_closed, record_session_started, record_tool_call};
use crate::{AgentServices, SessionEvent, SessionStart, SessionState};

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// `end_call` completed
    EndCall,
    /// `transfer_call` completed
    Transferred,
    /// Caller hung up, or the event channel closed
    CallerDisconnected,
    /// The model or room stopped answering
    TransportFailed,
    /// No tool set for the resolved profile
    SetupFailed,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EndCall => "end_call",
            Self::Transferred => "transferred",
            Self::CallerDisconnected => "caller_disconnected",
            Self::TransportFailed => "transport_failed",
            Self::SetupFailed => "setup_failed",
        }
    }
}

/// Result of a finished session
#[derive(Debug, Clone)]
pub struct SessionOutcome {
    pub tenant: TenantId,
    pub profile: AgentProfile,
    pub reason: CloseReason,
    pub summary: UsageSummary,
}

async fn bounded<F>(limit: Duration, step: F) -> Result<(), TransportError>
where
    F: Future<Output = Result<(), TransportError>>,
{
    tokio::time::timeout(limit, step)
        .await
        .unwrap_or(Err(TransportError::Timeout(limit.as_millis() as u64)))
}

fn close_reason_for(err: &TransportError) -> CloseReason {
    match err {
        TransportError::Disconnected => CloseReason::CallerDisconnected,
        _ => CloseReason::TransportFailed,
    }
}

/// Controller for a single call
pub struct CallController {
    services: Arc<AgentServices>,
    start: SessionStart,
    model: Arc<dyn ConversationModel>,
    room: Arc<dyn RoomControl>,
    state_tx: watch::Sender<SessionState>,
}

impl CallController {
    pub fn new(
        services: Arc<AgentServices>,
        start: SessionStart,
        model: Arc<dyn ConversationModel>,
        room: Arc<dyn RoomControl>,
    ) -> Self {
        let (state_tx, _) = watch::channel(SessionState::Connecting);
        Self {
            services,
            start,
            model,
            room,
            state_tx,
        }
    }

    /// Observe state changes from outside the session
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Run the session to completion
    ///
    /// Always reaches `Closed` and flushes usage exactly once, whatever
    /// happens on the model or room side.
    pub async fn run(self, events: mpsc::Receiver<SessionEvent>) -> SessionOutcome {
        let span = tracing::info_span!(
            "call",
            room = %self.start.room_name,
            tenant = tracing::field::Empty,
            profile = tracing::field::Empty,
        );
        self.run_session(events).instrument(span).await
    }

    async fn run_session(self, mut events: mpsc::Receiver<SessionEvent>) -> SessionOutcome {
        let CallController {
            services,
            start,
            model,
            room,
            state_tx,
        } = self;

        let tenant = start.metadata.resolve_tenant(&services.default_tenant);
        let profile = start.metadata.resolve_profile(services.default_profile);
        let span = tracing::Span::current();
        span.record("tenant", tenant.as_str());
        span.record("profile", profile.as_str());
        record_session_started(profile.as_str());

        // Identity is fixed for the rest of the call
        let ctx = CallContext::new(&start.room_name, tenant.clone(), model, room);
        let user = services.directory.lookup_user(&ctx.tenant, &ctx.caller).await;
        let ctx = ctx
            .with_user(user)
            .with_participant_identity(start.participant_identity())
            .with_user_name(start.metadata.user_name.clone());

        tracing::info!(
            caller = ?ctx.caller,
            known_caller = !ctx.user.is_anonymous(),
            "Call session connecting"
        );

        let mut session = Session {
            services,
            ctx,
            profile,
            state: SessionState::Connecting,
            state_tx,
            usage: UsageCollector::new(),
            deferred: VecDeque::new(),
        };

        let reason = match session.services.executor(profile) {
            Some(executor) => match session.connect(executor.as_ref()).await {
                Ok(()) => session.converse(executor, &mut events).await,
                Err(e) => {
                    tracing::error!(error = %e, "Session setup failed");
                    close_reason_for(&e)
                }
            },
            None => {
                tracing::error!("No tool registry for profile");
                CloseReason::SetupFailed
            }
        };

        let summary = session.terminate(reason, &mut events).await;
        SessionOutcome {
            tenant,
            profile,
            reason,
            summary,
        }
    }
}

struct Session {
    services: Arc<AgentServices>,
    ctx: CallContext,
    profile: AgentProfile,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    usage: UsageCollector,
    deferred: VecDeque<SessionEvent>,
}

impl Session {
    fn set_state(&mut self, next: SessionState) {
        match self.state.transition(next) {
            Ok(state) => {
                tracing::debug!(from = %self.state, to = %state, "Session state change");
                self.state = state;
                self.state_tx.send_replace(state);
            }
            Err(e) => tracing::error!(error = %e, "Rejected session state change"),
        }
    }

    /// Connecting → Active: instructions, tools, then the greeting
    async fn connect(&mut self, executor: &dyn ToolExecutor) -> Result<(), TransportError> {
        let instructions = self.services.renderer.instructions(self.profile, Utc::now());
        let tools = executor.list_tools();
        self.ctx.model.configure(&instructions, &tools).await?;

        let name = self.ctx.user_name.clone().or_else(|| {
            (!self.ctx.user.is_anonymous()).then(|| self.ctx.user.name.clone())
        });
        let greeting = self.services.renderer.greeting(self.profile, name.as_deref());

        self.set_state(SessionState::Active);
        tracing::info!(tool_count = tools.len(), "Call session active");
        self.ctx.model.generate_reply(&greeting).await
    }

    /// Active loop; returns once the session must terminate
    async fn converse(
        &mut self,
        executor: Arc<dyn ToolExecutor>,
        events: &mut mpsc::Receiver<SessionEvent>,
    ) -> CloseReason {
        loop {
            let event = match self.deferred.pop_front() {
                Some(event) => event,
                None => match events.recv().await {
                    Some(event) => event,
                    None => {
                        tracing::info!("Event channel closed");
                        return CloseReason::CallerDisconnected;
                    }
                },
            };

            match event {
                SessionEvent::ToolCall {
                    call_id,
                    name,
                    arguments,
                } => {
                    if let Some(reason) = self
                        .dispatch(executor.clone(), call_id, name, arguments, events)
                        .await
                    {
                        return reason;
                    }
                }
                SessionEvent::UserTurnCompleted { text } => {
                    if let Err(TransportError::Disconnected) = self.user_turn(&text).await {
                        return CloseReason::CallerDisconnected;
                    }
                }
                SessionEvent::Usage(metrics) => self.usage.collect(&metrics),
                SessionEvent::CallerDisconnected => {
                    tracing::info!("Caller disconnected");
                    return CloseReason::CallerDisconnected;
                }
            }
        }
    }

    /// Inject knowledge context for what the caller just said
    async fn user_turn(&mut self, text: &str) -> Result<(), TransportError> {
        self.usage.record_user_turn();

        let query = text.trim();
        if !self.services.call.auto_retrieve_context || query.is_empty() {
            return Ok(());
        }

        let context = self
            .services
            .retriever
            .retrieve_context(&self.ctx.tenant, query, self.services.knowledge_limit)
            .await;
        if context.is_empty() {
            return Ok(());
        }

        let message = self.services.renderer.retrieved_context(&context, query);
        match self.ctx.model.add_context(&message).await {
            Ok(()) => {
                tracing::debug!(context_len = context.len(), "Injected knowledge context");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to inject knowledge context");
                Err(e)
            }
        }
    }

    /// One tool call; `Some` when the session must terminate
    async fn dispatch(
        &mut self,
        executor: Arc<dyn ToolExecutor>,
        call_id: String,
        name: String,
        arguments: Value,
        events: &mut mpsc::Receiver<SessionEvent>,
    ) -> Option<CloseReason> {
        let Some(side_effect) = executor.side_effect(&name) else {
            tracing::warn!(tool = %name, call_id = %call_id, "Model called an unknown tool");
            self.usage.record_tool(&name, false);
            record_tool_call(&name, false, "unknown", 0.0);
            let output = ToolError::not_found(format!("Unknown tool: {}", name)).to_output();
            return self.submit(&call_id, &output).await;
        };

        self.set_state(SessionState::ToolDispatch);
        tracing::info!(tool = %name, call_id = %call_id, side_effect = side_effect.as_str(), "Dispatching tool");

        let started = Instant::now();
        let ctx = self.ctx.clone();
        let execution = executor.execute(&ctx, &name, arguments);
        tokio::pin!(execution);

        let result = loop {
            tokio::select! {
                biased;
                result = &mut execution => break Some(result),
                event = events.recv() => match event {
                    Some(SessionEvent::Usage(metrics)) => self.usage.collect(&metrics),
                    Some(SessionEvent::CallerDisconnected) | None => break None,
                    Some(other) => {
                        tracing::debug!(event = other.kind(), "Deferring event until tool completes");
                        self.deferred.push_back(other);
                    }
                },
            }
        };
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        let Some(result) = result else {
            tracing::warn!(tool = %name, call_id = %call_id, "Caller disconnected during tool execution, cancelling");
            self.usage.record_tool(&name, false);
            record_tool_call(&name, true, "cancelled", latency_ms);
            return Some(CloseReason::CallerDisconnected);
        };

        let output = result.unwrap_or_else(|e| {
            tracing::warn!(tool = %name, call_id = %call_id, code = ?e.code, error = %e.message, "Tool failed");
            e.to_output()
        });
        let success = !output.is_error;
        self.usage.record_tool(&name, success);
        record_tool_call(
            &name,
            true,
            if success { "success" } else { "error" },
            latency_ms,
        );

        // end_call ends the session even when its teardown failed or timed out
        if matches!(name.parse::<ToolName>(), Ok(ToolName::EndCall)) {
            if !success {
                tracing::warn!(call_id = %call_id, "end_call did not finish cleanly, closing session");
                let limit = self.services.call.teardown_timeout();
                if let Err(e) = bounded(limit, self.ctx.model.close()).await {
                    tracing::warn!(error = %e, "Failed to close model session after end_call");
                }
            }
            return Some(CloseReason::EndCall);
        }

        if side_effect.is_terminal() && success {
            tracing::info!(tool = %name, call_id = %call_id, "Terminal tool completed");
            return Some(CloseReason::Transferred);
        }

        self.set_state(SessionState::Active);
        self.submit(&call_id, &output).await
    }

    async fn submit(&self, call_id: &str, output: &ToolOutput) -> Option<CloseReason> {
        match self.ctx.model.submit_tool_result(call_id, output).await {
            Ok(()) => None,
            Err(TransportError::Disconnected) => Some(CloseReason::CallerDisconnected),
            Err(e) => {
                tracing::error!(call_id = %call_id, error = %e, "Failed to submit tool result");
                None
            }
        }
    }

    /// Terminating → Closed: drop pending work, release resources, flush usage
    async fn terminate(
        &mut self,
        reason: CloseReason,
        events: &mut mpsc::Receiver<SessionEvent>,
    ) -> UsageSummary {
        self.set_state(SessionState::Terminating);
        tracing::info!(reason = reason.as_str(), "Call session terminating");

        events.close();
        while let Ok(event) = events.try_recv() {
            self.deferred.push_back(event);
        }
        for event in self.deferred.drain(..) {
            match event {
                SessionEvent::ToolCall { call_id, name, .. } => {
                    tracing::info!(tool = %name, call_id = %call_id, "Dropping tool call after session end");
                    record_tool_call(&name, name.parse::<ToolName>().is_ok(), "dropped", 0.0);
                }
                SessionEvent::Usage(metrics) => self.usage.collect(&metrics),
                _ => {}
            }
        }

        let limit = self.services.call.teardown_timeout();
        match reason {
            // end_call already tore the room down or closed the session
            CloseReason::EndCall => {}
            CloseReason::Transferred => {
                if let Err(e) = bounded(limit, self.ctx.model.close()).await {
                    tracing::warn!(error = %e, "Failed to close model session after transfer");
                }
            }
            CloseReason::CallerDisconnected
            | CloseReason::TransportFailed
            | CloseReason::SetupFailed => {
                match bounded(limit, self.ctx.room.delete_room(&self.ctx.room_name)).await {
                    Ok(()) => tracing::info!("Room released"),
                    Err(e) => tracing::warn!(error = %e, "Room teardown failed, closing anyway"),
                }
            }
        }

        self.set_state(SessionState::Closed);
        record_session_closed(reason.as_str());

        let summary = self.usage.summary();
        self.services
            .usage_sink
            .record(&self.ctx.room_name, &summary);
        summary
    }
}
