//! Profile Tool Factory
//!
//! Builds the tool registry for an agent profile from the process-wide
//! services. Registration errors surface at startup, never mid-call.
//!
//! # Example
//!
//! ```ignore
//! use call_agent_tools::factory::{create_registry, ToolDeps};
//!
//! let deps = ToolDeps::new(&settings, &persistence, retriever);
//! let registry = create_registry(AgentProfile::Billing, &deps)?;
//! ```

use std::sync::Arc;

use call_agent_config::{AgentProfile, BusinessConfig, CallConfig, Settings};
use call_agent_core::{ContextRetriever, Tool};
use call_agent_persistence::{
    AppointmentStore, EmailService, InvoiceLedger, PersistenceLayer, UserDirectory,
};

use crate::domain_tools::{
    BookAppointmentTool, CheckAvailabilityTool, EndCallTool, LookupOutstandingInvoicesTool,
    LookupUserTool, ProcessPaymentTool, SearchKnowledgeBaseTool, SendEmailTool,
    SendPaymentReminderTool, TransferCallTool, UpdateContactEmailTool, UpdateInvoiceStatusTool,
};
use crate::registry::{RegistryError, ToolName, ToolRegistry};

/// Services and settings the tools are built from
#[derive(Clone)]
pub struct ToolDeps {
    pub directory: Arc<dyn UserDirectory>,
    pub invoices: Arc<InvoiceLedger>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub email: Arc<dyn EmailService>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub business: BusinessConfig,
    pub call: CallConfig,
    pub knowledge_limit: usize,
}

impl ToolDeps {
    pub fn new(
        settings: &Settings,
        persistence: &PersistenceLayer,
        retriever: Arc<dyn ContextRetriever>,
    ) -> Self {
        Self {
            directory: persistence.directory.clone(),
            invoices: persistence.invoices.clone(),
            appointments: persistence.appointments.clone(),
            email: persistence.email.clone(),
            retriever,
            business: settings.business.clone(),
            call: settings.call.clone(),
            knowledge_limit: settings.rag.default_limit,
        }
    }
}

/// Tools offered to each profile; the registry lists them in catalog order
pub fn profile_tools(profile: AgentProfile) -> &'static [ToolName] {
    match profile {
        AgentProfile::Receptionist => &[
            ToolName::LookupUser,
            ToolName::UpdateContactEmail,
            ToolName::CheckAvailability,
            ToolName::BookAppointment,
            ToolName::SendEmail,
            ToolName::SearchKnowledgeBase,
            ToolName::TransferCall,
            ToolName::EndCall,
        ],
        AgentProfile::Billing => &[
            ToolName::LookupUser,
            ToolName::LookupOutstandingInvoices,
            ToolName::SendPaymentReminder,
            ToolName::ProcessPayment,
            ToolName::UpdateInvoiceStatus,
            ToolName::SendEmail,
            ToolName::SearchKnowledgeBase,
            ToolName::TransferCall,
            ToolName::EndCall,
        ],
    }
}

/// Instantiate one tool
pub fn create_tool(name: ToolName, deps: &ToolDeps) -> Arc<dyn Tool> {
    match name {
        ToolName::LookupUser => Arc::new(LookupUserTool::new(deps.directory.clone())),
        ToolName::UpdateContactEmail => Arc::new(UpdateContactEmailTool::new(deps.directory.clone())),
        ToolName::LookupOutstandingInvoices => Arc::new(LookupOutstandingInvoicesTool::new(
            deps.directory.clone(),
            deps.invoices.clone(),
        )),
        ToolName::SendPaymentReminder => Arc::new(SendPaymentReminderTool::new(
            deps.directory.clone(),
            deps.invoices.clone(),
            deps.email.clone(),
            deps.business.name.clone(),
        )),
        ToolName::ProcessPayment => Arc::new(ProcessPaymentTool::new(deps.invoices.clone())),
        ToolName::UpdateInvoiceStatus => Arc::new(UpdateInvoiceStatusTool::new(deps.invoices.clone())),
        ToolName::CheckAvailability => Arc::new(CheckAvailabilityTool::new(
            deps.appointments.clone(),
            deps.business.clone(),
        )),
        ToolName::BookAppointment => Arc::new(BookAppointmentTool::new(
            deps.appointments.clone(),
            deps.business.clone(),
        )),
        ToolName::SendEmail => Arc::new(SendEmailTool::new(deps.email.clone(), deps.directory.clone())),
        ToolName::SearchKnowledgeBase => Arc::new(SearchKnowledgeBaseTool::new(
            deps.retriever.clone(),
            deps.knowledge_limit,
        )),
        ToolName::TransferCall => Arc::new(TransferCallTool::new(deps.call.clone())),
        ToolName::EndCall => Arc::new(EndCallTool::new(deps.call.clone())),
    }
}

/// Create the registry for a profile
pub fn create_registry(profile: AgentProfile, deps: &ToolDeps) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new().with_default_timeout(deps.call.tool_timeout_secs);

    for name in profile_tools(profile) {
        registry.register_boxed(create_tool(*name, deps))?;
    }

    tracing::info!(
        profile = %profile,
        tool_count = registry.len(),
        "Created tool registry for profile"
    );

    Ok(registry)
}
