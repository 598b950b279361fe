//! Tool implementations
//!
//! Grouped by what they act on:
//! - directory: caller lookup and contact changes
//! - billing: invoices, reminders, payments
//! - calendar: availability and booking
//! - email: confirmation emails
//! - knowledge: tenant document search
//! - call_control: transfer and hang-up (terminal)

pub mod billing;
pub mod calendar;
pub mod call_control;
pub mod directory;
pub mod email;
pub mod knowledge;
pub mod utils;

pub use billing::{
    LookupOutstandingInvoicesTool, ProcessPaymentTool, SendPaymentReminderTool,
    UpdateInvoiceStatusTool,
};
pub use calendar::{BookAppointmentTool, CheckAvailabilityTool};
pub use call_control::{EndCallTool, TransferCallTool, TRANSFER_FAILED};
pub use directory::{LookupUserTool, UpdateContactEmailTool};
pub use email::SendEmailTool;
pub use knowledge::SearchKnowledgeBaseTool;
