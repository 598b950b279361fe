//! Recording fakes and fixtures shared by the tool tests

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use call_agent_core::{
    CallContext, ConversationModel, RoomControl, TenantId, ToolOutput, ToolSchema, TransportError,
    UserRecord,
};
use call_agent_persistence::{CsvUserDirectory, InvoiceLedger};

pub(crate) const TENANT: &str = "acme";

pub(crate) const USERS: &str = "id,phone_number,name,email,pin\n\
                                1,5551234567,Ada,ada@example.com,1234\n\
                                2,5559876543,Grace,grace@example.com,\n";

pub(crate) const INVOICES: &str = r#"[
    {"invoice_id": "INV-001", "customer_phone": "5551234567", "amount": 150.0,
     "due_date": "2025-01-01", "status": "overdue", "description": "Dental cleaning and checkup"},
    {"invoice_id": "INV-002", "customer_phone": "5551234567", "amount": 75.0,
     "due_date": "2025-02-01", "status": "pending", "description": "X-ray services"},
    {"invoice_id": "INV-003", "customer_phone": "5551234567", "amount": 40.0,
     "due_date": "2024-12-01", "status": "paid"}
]"#;

pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

/// Room fake recording every call into a shared log
#[derive(Default)]
pub(crate) struct RecordingRoom {
    pub events: EventLog,
    pub fail_delete: AtomicBool,
    pub fail_transfer: AtomicBool,
    pub hang_delete: AtomicBool,
}

#[async_trait]
impl RoomControl for RecordingRoom {
    async fn say(&self, text: &str, allow_interruptions: bool) -> Result<(), TransportError> {
        self.events
            .lock()
            .push(format!("say:{}:{}", text, allow_interruptions));
        Ok(())
    }

    async fn wait_for_playout(&self) -> Result<(), TransportError> {
        self.events.lock().push("wait_for_playout".into());
        Ok(())
    }

    async fn delete_room(&self, room_name: &str) -> Result<(), TransportError> {
        self.events.lock().push(format!("delete_room:{}", room_name));
        if self.hang_delete.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(30)).await;
        }
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("room service unavailable".into()));
        }
        Ok(())
    }

    async fn transfer_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
        transfer_to: &str,
    ) -> Result<(), TransportError> {
        self.events.lock().push(format!(
            "transfer:{}:{}:{}",
            room_name, participant_identity, transfer_to
        ));
        if self.fail_transfer.load(Ordering::SeqCst) {
            return Err(TransportError::Rejected("SIP transfer failed".into()));
        }
        Ok(())
    }
}

/// Model fake recording every call into a shared log
#[derive(Default)]
pub(crate) struct RecordingModel {
    pub events: EventLog,
    pub fail_reply: AtomicBool,
}

#[async_trait]
impl ConversationModel for RecordingModel {
    async fn configure(&self, _instructions: &str, tools: &[ToolSchema]) -> Result<(), TransportError> {
        self.events.lock().push(format!("configure:{}", tools.len()));
        Ok(())
    }

    async fn generate_reply(&self, instructions: &str) -> Result<(), TransportError> {
        self.events.lock().push(format!("generate_reply:{}", instructions));
        if self.fail_reply.load(Ordering::SeqCst) {
            return Err(TransportError::Disconnected);
        }
        Ok(())
    }

    async fn add_context(&self, _content: &str) -> Result<(), TransportError> {
        self.events.lock().push("add_context".into());
        Ok(())
    }

    async fn submit_tool_result(&self, call_id: &str, _output: &ToolOutput) -> Result<(), TransportError> {
        self.events.lock().push(format!("tool_result:{}", call_id));
        Ok(())
    }

    async fn close(&self) -> Result<(), TransportError> {
        self.events.lock().push("close".into());
        Ok(())
    }
}

pub(crate) fn tenant() -> TenantId {
    TenantId::parse(TENANT).unwrap()
}

/// Context for `room_name` under the test tenant, model and room sharing one log
pub(crate) fn call_context(room_name: &str) -> (CallContext, Arc<RecordingModel>, Arc<RecordingRoom>) {
    let events: EventLog = Arc::default();
    let model = Arc::new(RecordingModel {
        events: events.clone(),
        ..Default::default()
    });
    let room = Arc::new(RecordingRoom {
        events,
        ..Default::default()
    });
    let ctx = CallContext::new(room_name, tenant(), model.clone(), room.clone());
    (ctx, model, room)
}

/// Context for a known caller with their directory record attached
pub(crate) fn known_caller() -> (CallContext, Arc<RecordingModel>, Arc<RecordingRoom>) {
    let (ctx, model, room) = call_context("Call-5551234567");
    let user = UserRecord {
        id: Some("1".into()),
        phone_number: Some("5551234567".into()),
        name: "Ada".into(),
        email: "ada@example.com".into(),
        pin: Some("1234".into()),
        extra: Default::default(),
    };
    (ctx.with_user(user), model, room)
}

/// Tenant data directory holding the fixture users and invoices
pub(crate) fn tenant_data() -> (TempDir, Arc<CsvUserDirectory>, Arc<InvoiceLedger>) {
    let dir = tempfile::tempdir().unwrap();
    let tenant_dir = dir.path().join(TENANT);
    std::fs::create_dir_all(&tenant_dir).unwrap();
    std::fs::write(tenant_dir.join("users.csv"), USERS).unwrap();
    std::fs::write(tenant_dir.join("invoices.json"), INVOICES).unwrap();

    let timeout = Duration::from_secs(2);
    let directory = Arc::new(CsvUserDirectory::new(dir.path(), "users.csv", timeout));
    let ledger = Arc::new(InvoiceLedger::new(dir.path(), "invoices.json", timeout));
    (dir, directory, ledger)
}

pub(crate) fn events(log: &EventLog) -> Vec<String> {
    log.lock().clone()
}
