//! Action tools for the call agent
//!
//! Implements MCP (Model Context Protocol) compatible tools over the
//! tenant's directory, ledger, calendar, mail and knowledge base, plus the
//! terminal call-control tools. The catalog is closed (`ToolName`) and each
//! agent profile gets a fixed subset of it.

pub mod domain_tools;
pub mod factory;
pub mod registry;

#[cfg(test)]
mod test_support;

pub use domain_tools::{
    BookAppointmentTool, CheckAvailabilityTool, EndCallTool, LookupOutstandingInvoicesTool,
    LookupUserTool, ProcessPaymentTool, SearchKnowledgeBaseTool, SendEmailTool,
    SendPaymentReminderTool, TransferCallTool, UpdateContactEmailTool, UpdateInvoiceStatusTool,
    TRANSFER_FAILED,
};
pub use factory::{create_registry, create_tool, profile_tools, ToolDeps};
pub use registry::{RegistryError, ToolExecutor, ToolName, ToolRegistry};
