//! Tenant data for the call agent
//!
//! Provides storage for:
//! - User directories (CSV snapshots per tenant)
//! - Invoices (JSON-seeded ledger per tenant)
//! - Appointments (in-memory calendar per tenant)
//! - Outbound email (simulated, recorded for audit)
//!
//! Every store is keyed by `TenantId`; nothing is shared across tenants.

pub mod appointments;
pub mod directory;
pub mod error;
pub mod invoices;
pub mod notifications;

pub use appointments::{Appointment, AppointmentStatus, AppointmentStore, InMemoryAppointmentStore};
pub use directory::{is_valid_email, CsvUserDirectory, UserDirectory};
pub use error::PersistenceError;
pub use invoices::{Invoice, InvoiceLedger, InvoiceStatus, LedgerError, PaymentReceipt, StatusChange};
pub use notifications::{
    EmailMessage, EmailService, EmailStatus, EmailType, OutboundEmail, RetryingEmailService,
    SendResult, SimulatedEmailService,
};

use std::sync::Arc;

use call_agent_config::Settings;

/// Combined persistence layer with all services
pub struct PersistenceLayer {
    pub directory: Arc<dyn UserDirectory>,
    pub invoices: Arc<InvoiceLedger>,
    pub appointments: Arc<dyn AppointmentStore>,
    pub email: Arc<dyn EmailService>,
}

/// Initialize the persistence layer from settings
pub fn init(settings: &Settings) -> PersistenceLayer {
    let simulated: Arc<dyn EmailService> =
        Arc::new(SimulatedEmailService::new(&settings.notifications.sender));

    PersistenceLayer {
        directory: Arc::new(CsvUserDirectory::from_config(&settings.directory)),
        invoices: Arc::new(InvoiceLedger::from_config(&settings.directory)),
        appointments: Arc::new(InMemoryAppointmentStore::new()),
        email: Arc::new(RetryingEmailService::from_config(simulated, &settings.notifications)),
    }
}
