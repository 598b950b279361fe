//! Full call sessions driven against scripted model and room fakes

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use tokio::sync::mpsc;

use call_agent_agent::{
    AgentServices, CallController, CloseReason, JobMetadata, SessionEvent, SessionOutcome,
    SessionStart, SessionState,
};
use call_agent_config::{AgentProfile, Settings};
use call_agent_core::{
    CallContext, ConversationModel, InputSchema, RetryPolicy, RoomControl, SideEffect, ToolError,
    ToolOutput, ToolSchema, TransportError, UsageMetrics, UsageSink, UsageSummary,
};
use call_agent_rag::{InMemoryKnowledgeBackend, KnowledgeDocument, TenantKnowledgeRetriever};
use call_agent_tools::ToolExecutor;

const ROOM: &str = "Call-5551234567";

type Log = Arc<Mutex<Vec<String>>>;

#[derive(Default)]
struct ScriptedModel {
    log: Log,
    results: Mutex<Vec<(String, ToolOutput)>>,
    contexts: Mutex<Vec<String>>,
    hang_close: AtomicBool,
}

#[async_trait]
impl ConversationModel for ScriptedModel {
    async fn configure(&self, _instructions: &str, tools: &[ToolSchema]) -> Result<(), TransportError> {
        self.log.lock().push(format!("configure:{}", tools.len()));
        Ok(())
    }

    async fn generate_reply(&self, instructions: &str) -> Result<(), TransportError> {
        self.log.lock().push(format!("generate_reply:{}", instructions));
        Ok(())
    }

    async fn add_context(&self, content: &str) -> Result<(), TransportError> {
        self.log.lock().push("add_context".into());
        self.contexts.lock().push(content.to_string());
        Ok(())
    }

    async fn submit_tool_result(&self, call_id: &str, output: &ToolOutput) -> Result<(), TransportError> {
        self.log.lock().push(format!("tool_result:{}", call_id));
        self.results.lock().push((call_id.to_string(), output.clone()));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.log.lock().push("close".into());
        if self.hang_close.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }
}

#[derive(Default)]
struct ScriptedRoom {
    log: Log,
    fail_transfer: AtomicBool,
    hang_delete: AtomicBool,
    /// Delay on each playout and speech step
    speech_ms: AtomicU64,
}

impl ScriptedRoom {
    async fn speak(&self) {
        let ms = self.speech_ms.load(Ordering::SeqCst);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}

#[async_trait]
impl RoomControl for ScriptedRoom {
    async fn say(&self, text: &str, allow_interruptions: bool) -> Result<(), TransportError> {
        self.log.lock().push(format!("say:{}:{}", text, allow_interruptions));
        self.speak().await;
        Ok(())
    }

    async fn wait_for_playout(&self) -> Result<(), TransportError> {
        self.log.lock().push("wait_for_playout".into());
        self.speak().await;
        Ok(())
    }

    async fn delete_room(&self, room_name: &str) -> Result<(), TransportError> {
        self.log.lock().push(format!("delete_room:{}", room_name));
        if self.hang_delete.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn transfer_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
        transfer_to: &str,
    ) -> Result<(), TransportError> {
        self.log.lock().push(format!(
            "transfer:{}:{}:{}",
            room_name, participant_identity, transfer_to
        ));
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("SIP transfer failed".into()));
        }
        Ok(())
    }
}

#[derive(Default)]
struct CountingSink {
    records: Mutex<Vec<(String, UsageSummary)>>,
}

impl UsageSink for CountingSink {
    fn record(&self, room_name: &str, summary: &UsageSummary) {
        self.records.lock().push((room_name.to_string(), summary.clone()));
    }
}

/// Executor whose only tool never finishes
struct HangingExecutor;

#[async_trait]
impl ToolExecutor for HangingExecutor {
    async fn execute(
        &self,
        _ctx: &CallContext,
        _name: &str,
        _arguments: Value,
    ) -> Result<ToolOutput, ToolError> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(ToolOutput::text("never"))
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "send_email".into(),
            description: "Hangs".into(),
            input_schema: InputSchema::object(),
        }]
    }

    fn side_effect(&self, name: &str) -> Option<SideEffect> {
        (name == "send_email").then_some(SideEffect::Mutating)
    }
}

/// Executor whose hang-up always reports a timeout
struct TimedOutEndCall;

#[async_trait]
impl ToolExecutor for TimedOutEndCall {
    async fn execute(
        &self,
        _ctx: &CallContext,
        name: &str,
        _arguments: Value,
    ) -> Result<ToolOutput, ToolError> {
        Err(ToolError::timeout(name, 1))
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "end_call".into(),
            description: "Times out".into(),
            input_schema: InputSchema::object(),
        }]
    }

    fn side_effect(&self, name: &str) -> Option<SideEffect> {
        (name == "end_call").then_some(SideEffect::Terminal)
    }
}

struct Harness {
    _data: TempDir,
    services: AgentServices,
    knowledge: Arc<InMemoryKnowledgeBackend>,
    sink: Arc<CountingSink>,
    model: Arc<ScriptedModel>,
    room: Arc<ScriptedRoom>,
}

fn harness() -> Harness {
    harness_with_teardown(200)
}

fn harness_with_teardown(teardown_timeout_ms: u64) -> Harness {
    let data = tempfile::tempdir().unwrap();
    let tenant_dir = data.path().join("acme");
    std::fs::create_dir_all(&tenant_dir).unwrap();
    std::fs::write(
        tenant_dir.join("users.csv"),
        "id,phone_number,name,email,pin\n1,5551234567,Ada,ada@example.com,1234\n",
    )
    .unwrap();
    std::fs::write(tenant_dir.join("invoices.json"), "[]").unwrap();

    let mut settings = Settings::default();
    settings.directory.data_dir = data.path().to_string_lossy().into_owned();
    settings.call.teardown_timeout_ms = teardown_timeout_ms;

    let knowledge = Arc::new(InMemoryKnowledgeBackend::new());
    knowledge.insert(
        "Documents_acme",
        KnowledgeDocument::new(
            "Opening hours",
            "hours.md",
            "The practice is open weekdays from 8 to 17 hours.",
        ),
    );
    knowledge.insert(
        "Documents_globex",
        KnowledgeDocument::new("Globex secret", "secret.md", "Globex pricing formula."),
    );
    let retriever = Arc::new(TenantKnowledgeRetriever::new(
        knowledge.clone(),
        "Documents_",
        Duration::from_secs(1),
        RetryPolicy::new(0, Duration::from_millis(1)),
    ));

    let persistence = call_agent_persistence::init(&settings);
    let sink = Arc::new(CountingSink::default());
    let services = AgentServices::new(&settings, &persistence, retriever, sink.clone()).unwrap();

    let log: Log = Arc::default();
    Harness {
        _data: data,
        services,
        knowledge,
        sink,
        model: Arc::new(ScriptedModel {
            log: log.clone(),
            ..Default::default()
        }),
        room: Arc::new(ScriptedRoom {
            log,
            ..Default::default()
        }),
    }
}

fn acme(profile: &str) -> SessionStart {
    SessionStart::new(ROOM).with_metadata(JobMetadata {
        tenant_id: Some("acme".into()),
        agent: Some(profile.into()),
        ..Default::default()
    })
}

async fn run_session(
    h: Harness,
    start: SessionStart,
    script: Vec<SessionEvent>,
) -> (SessionOutcome, Harness, SessionState) {
    let (tx, rx) = mpsc::channel(32);
    for event in script {
        tx.send(event).await.unwrap();
    }
    drop(tx);

    let services = Arc::new(h.services);
    let controller = CallController::new(
        services.clone(),
        start,
        h.model.clone(),
        h.room.clone(),
    );
    let state = controller.subscribe();
    let outcome = tokio::time::timeout(Duration::from_secs(5), controller.run(rx))
        .await
        .expect("session did not finish");

    let final_state = *state.borrow();
    let services = Arc::try_unwrap(services).ok().expect("services still shared");
    (
        outcome,
        Harness {
            services,
            ..h
        },
        final_state,
    )
}

fn log_of(h: &Harness) -> Vec<String> {
    h.model.log.lock().clone()
}

#[tokio::test]
async fn test_greets_then_end_call_tears_down_in_order() {
    let h = harness();
    let (outcome, h, state) = run_session(
        h,
        acme("receptionist"),
        vec![SessionEvent::tool_call("c1", "end_call", json!({}))],
    )
    .await;

    assert_eq!(outcome.reason, CloseReason::EndCall);
    assert_eq!(outcome.tenant.as_str(), "acme");
    assert_eq!(state, SessionState::Closed);

    let log = log_of(&h);
    assert_eq!(log[0], "configure:8");
    assert!(log[1].starts_with("generate_reply:Greet the user"));
    assert!(log[1].contains("The caller's name is Ada."));
    assert_eq!(
        &log[2..],
        &[
            "wait_for_playout".to_string(),
            "say:Thank you for calling! Goodbye!:false".to_string(),
            format!("delete_room:{}", ROOM),
        ]
    );
    assert_eq!(h.sink.records.lock().len(), 1);
}

#[tokio::test]
async fn test_end_call_closes_session_despite_stalled_teardown() {
    let h = harness_with_teardown(300);
    h.room.speech_ms.store(280, Ordering::SeqCst);
    h.room.hang_delete.store(true, Ordering::SeqCst);
    h.model.hang_close.store(true, Ordering::SeqCst);

    let started = Instant::now();
    let (outcome, h, state) = run_session(
        h,
        acme("receptionist"),
        vec![
            SessionEvent::tool_call("c1", "end_call", json!({})),
            SessionEvent::tool_call("c2", "lookup_user", json!({})),
        ],
    )
    .await;

    assert_eq!(outcome.reason, CloseReason::EndCall);
    assert_eq!(state, SessionState::Closed);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(h.model.results.lock().is_empty());
    assert_eq!(outcome.summary.tools["end_call"].succeeded, 1);

    let log = log_of(&h);
    assert!(log.contains(&format!("delete_room:{}", ROOM)));
    assert_eq!(log.last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_end_call_error_still_ends_session() {
    let h = harness();
    let services = h.services;
    let h = Harness {
        services: services.with_executor(AgentProfile::Receptionist, Arc::new(TimedOutEndCall)),
        ..h
    };

    let (outcome, h, state) = run_session(
        h,
        acme("receptionist"),
        vec![
            SessionEvent::tool_call("c1", "end_call", json!({})),
            SessionEvent::user_turn("hello?"),
        ],
    )
    .await;

    assert_eq!(outcome.reason, CloseReason::EndCall);
    assert_eq!(state, SessionState::Closed);
    assert!(h.model.results.lock().is_empty());
    assert_eq!(outcome.summary.tools["end_call"].failed, 1);
    assert_eq!(log_of(&h).last().map(String::as_str), Some("close"));
    assert_eq!(h.sink.records.lock().len(), 1);
}

#[tokio::test]
async fn test_failed_transfer_keeps_session_active() {
    let h = harness();
    h.room.fail_transfer.store(true, Ordering::SeqCst);

    let (outcome, h, _) = run_session(
        h,
        acme("billing"),
        vec![
            SessionEvent::tool_call("c1", "transfer_call", json!({})),
            SessionEvent::tool_call("c2", "lookup_user", json!({})),
            SessionEvent::CallerDisconnected,
        ],
    )
    .await;

    assert_eq!(outcome.reason, CloseReason::CallerDisconnected);

    let results = h.model.results.lock().clone();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "c1");
    assert!(results[0].1.is_error);
    assert_eq!(results[0].1.to_value(), json!("could not transfer call"));
    assert_eq!(results[1].1.to_value()["name"], "Ada");

    let log = log_of(&h);
    let announce = log.iter().position(|e| e.starts_with("generate_reply:Inform")).unwrap();
    let transfer = log.iter().position(|e| e.starts_with("transfer:")).unwrap();
    assert!(announce < transfer);
    assert_eq!(log.last().unwrap(), &format!("delete_room:{}", ROOM));

    let summary = &outcome.summary;
    assert_eq!(summary.tools["transfer_call"].failed, 1);
    assert_eq!(summary.tools["lookup_user"].succeeded, 1);
}

#[tokio::test]
async fn test_successful_transfer_terminates() {
    let h = harness();
    let (outcome, h, state) = run_session(
        h,
        acme("receptionist"),
        vec![
            SessionEvent::tool_call("c1", "transfer_call", json!({})),
            SessionEvent::tool_call("c2", "lookup_user", json!({})),
        ],
    )
    .await;

    assert_eq!(outcome.reason, CloseReason::Transferred);
    assert_eq!(state, SessionState::Closed);
    assert!(h.model.results.lock().is_empty());
    let log = log_of(&h);
    assert!(log.contains(&format!("transfer:{}:5551234567:tel:+15105550123", ROOM)));
    assert_eq!(log.last().map(String::as_str), Some("close"));
}

#[tokio::test]
async fn test_calls_after_terminal_tool_are_dropped() {
    let h = harness();
    let (outcome, h, _) = run_session(
        h,
        acme("receptionist"),
        vec![
            SessionEvent::tool_call("c1", "end_call", json!({})),
            SessionEvent::tool_call("c2", "lookup_user", json!({})),
            SessionEvent::tool_call("c3", "book_appointment", json!({"date": "2099-01-01", "time": "10:00", "summary": "x"})),
        ],
    )
    .await;

    assert_eq!(outcome.reason, CloseReason::EndCall);
    assert!(h.model.results.lock().is_empty());
    assert_eq!(outcome.summary.total_tool_calls(), 1);
    assert!(!outcome.summary.tools.contains_key("lookup_user"));
}

#[tokio::test]
async fn test_disconnect_cancels_running_tool() {
    let h = harness();
    let services = h.services;
    let h = Harness {
        services: services.with_executor(AgentProfile::Receptionist, Arc::new(HangingExecutor)),
        ..h
    };

    let (outcome, h, state) = run_session(
        h,
        acme("receptionist"),
        vec![
            SessionEvent::tool_call("c1", "send_email", json!({})),
            SessionEvent::Usage(UsageMetrics {
                llm_prompt_tokens: 42,
                ..Default::default()
            }),
            SessionEvent::user_turn("are you there"),
            SessionEvent::CallerDisconnected,
        ],
    )
    .await;

    assert_eq!(outcome.reason, CloseReason::CallerDisconnected);
    assert_eq!(state, SessionState::Closed);
    assert_eq!(outcome.summary.metrics.llm_prompt_tokens, 42);
    assert_eq!(outcome.summary.tools["send_email"].failed, 1);
    assert!(h.model.results.lock().is_empty());
    assert_eq!(log_of(&h).last().unwrap(), &format!("delete_room:{}", ROOM));
    assert_eq!(h.sink.records.lock().len(), 1);
}

#[tokio::test]
async fn test_tool_errors_are_structured() {
    let h = harness();
    let (_, h, _) = run_session(
        h,
        acme("billing"),
        vec![
            SessionEvent::tool_call("c1", "fly_to_moon", json!({})),
            SessionEvent::tool_call("c2", "process_payment", json!({"invoice_id": "INV-1"})),
            SessionEvent::tool_call("c3", "book_appointment", json!({})),
        ],
    )
    .await;

    let results = h.model.results.lock().clone();
    assert_eq!(results.len(), 3);
    for (_, output) in &results {
        assert!(output.is_error);
        assert!(output.to_value()["error"].is_string());
    }
    // booking is not in the billing tool set
    assert!(results[2].1.to_value()["error"]
        .as_str()
        .unwrap()
        .contains("book_appointment"));
}

#[tokio::test]
async fn test_usage_flushed_once_with_totals() {
    let h = harness();
    let usage = UsageMetrics {
        llm_prompt_tokens: 100,
        llm_completion_tokens: 10,
        tts_characters: 30,
        stt_audio_duration_secs: 2.0,
    };
    let (outcome, h, _) = run_session(
        h,
        acme("receptionist"),
        vec![
            SessionEvent::Usage(usage),
            SessionEvent::user_turn("hello"),
            SessionEvent::Usage(usage),
            SessionEvent::tool_call("c1", "lookup_user", json!({})),
            SessionEvent::tool_call("c2", "end_call", json!({})),
            SessionEvent::Usage(usage),
        ],
    )
    .await;

    let records = h.sink.records.lock().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, ROOM);
    assert_eq!(records[0].1, outcome.summary);
    assert_eq!(outcome.summary.metrics.llm_prompt_tokens, 300);
    assert_eq!(outcome.summary.user_turns, 1);
    assert_eq!(outcome.summary.total_tool_calls(), 2);
}

#[tokio::test]
async fn test_user_turn_injects_tenant_context_only() {
    let h = harness();
    let (_, h, _) = run_session(
        h,
        acme("receptionist"),
        vec![
            SessionEvent::user_turn("What are your opening hours?"),
            SessionEvent::user_turn("Globex pricing formula"),
            SessionEvent::user_turn("   "),
        ],
    )
    .await;

    let contexts = h.model.contexts.lock().clone();
    assert_eq!(contexts.len(), 1);
    assert!(contexts[0].starts_with("Relevant context from knowledge base:"));
    assert!(contexts[0].contains("Document: Opening hours (hours.md)"));
    assert!(!contexts.iter().any(|c| c.contains("Globex")));
}

#[tokio::test]
async fn test_empty_tenant_collection_injects_nothing() {
    let h = harness();
    h.knowledge.create_collection("Documents_initech");
    let start = SessionStart::new(ROOM).with_metadata(JobMetadata {
        tenant_id: Some("initech".into()),
        ..Default::default()
    });

    let (outcome, h, _) = run_session(h, start, vec![SessionEvent::user_turn("opening hours")]).await;

    assert_eq!(outcome.tenant.as_str(), "initech");
    assert!(h.model.contexts.lock().is_empty());
    // no directory for this tenant, so the greeting carries no name
    assert!(!log_of(&h)[1].contains("The caller's name is"));
}

#[tokio::test]
async fn test_invalid_metadata_falls_back_to_defaults() {
    let h = harness();
    let start = SessionStart::new("anonymous").with_metadata(JobMetadata::from_value(Some(
        &json!("{not json"),
    )));

    let (outcome, h, _) = run_session(h, start, vec![]).await;

    assert_eq!(outcome.tenant.as_str(), "default");
    assert_eq!(outcome.profile, AgentProfile::Receptionist);
    assert_eq!(outcome.reason, CloseReason::CallerDisconnected);
    assert_eq!(log_of(&h).last().unwrap(), "delete_room:anonymous");
}
