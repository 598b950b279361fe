//! Invoice ledger
//!
//! Seeded per tenant from `{data_dir}/{tenant}/invoices.json` (an array of
//! invoices) on first use and kept in memory afterwards. Every mutation is
//! checked completely before anything changes, so a rejected payment or
//! status update leaves the ledger untouched.

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use call_agent_config::DirectoryConfig;
use call_agent_core::TenantId;

use crate::PersistenceError;

/// Balances closer than this are equal
const CENT: f64 = 0.005;

/// Invoice status, a closed set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
    Overdue,
    Cancelled,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [
        InvoiceStatus::Pending,
        InvoiceStatus::Paid,
        InvoiceStatus::Overdue,
        InvoiceStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
            Self::Cancelled => "cancelled",
        }
    }

    /// Still owed by the customer
    pub fn is_outstanding(&self) -> bool {
        matches!(self, Self::Pending | Self::Overdue)
    }

    /// `"pending, paid, overdue, cancelled"`
    pub fn allowed_values() -> String {
        Self::ALL.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InvoiceStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .find(|status| status.as_str() == s)
            .copied()
            .ok_or(LedgerError::InvalidStatus)
    }
}

/// One invoice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub invoice_id: String,
    pub customer_phone: String,
    /// Invoiced amount
    pub amount: f64,
    /// Amount still owed, defaults to `amount`
    #[serde(default)]
    pub balance: Option<f64>,
    pub due_date: NaiveDate,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub description: String,
}

impl Invoice {
    pub fn balance(&self) -> f64 {
        match self.status {
            InvoiceStatus::Paid | InvoiceStatus::Cancelled => 0.0,
            _ => self.balance.unwrap_or(self.amount),
        }
    }
}

/// Rejections; none of them change the ledger
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("invalid amount")]
    InvalidAmount,

    #[error("invoice not found")]
    InvoiceNotFound,

    #[error("amount exceeds outstanding balance")]
    ExceedsBalance,

    #[error("Invalid status. Must be one of: {}", InvoiceStatus::allowed_values())]
    InvalidStatus,

    #[error("ledger unavailable: {0}")]
    Unavailable(String),
}

impl From<PersistenceError> for LedgerError {
    fn from(err: PersistenceError) -> Self {
        LedgerError::Unavailable(err.to_string())
    }
}

/// A recorded payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub payment_id: String,
    pub invoice_id: String,
    pub amount: f64,
    pub method: String,
    pub timestamp: DateTime<Utc>,
    pub confirmation_number: String,
    pub remaining_balance: f64,
    pub status: InvoiceStatus,
}

/// Result of a status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusChange {
    pub invoice_id: String,
    pub old_status: InvoiceStatus,
    pub new_status: InvoiceStatus,
    pub updated_at: DateTime<Utc>,
}

type TenantInvoices = Arc<RwLock<Vec<Invoice>>>;

/// Per-tenant in-memory invoice ledger
pub struct InvoiceLedger {
    data_dir: PathBuf,
    invoices_file: String,
    load_timeout: Duration,
    tenants: RwLock<HashMap<TenantId, TenantInvoices>>,
}

impl InvoiceLedger {
    pub fn new(data_dir: impl Into<PathBuf>, invoices_file: impl Into<String>, load_timeout: Duration) -> Self {
        Self {
            data_dir: data_dir.into(),
            invoices_file: invoices_file.into(),
            load_timeout,
            tenants: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self::new(&config.data_dir, &config.invoices_file, config.load_timeout())
    }

    async fn tenant(&self, tenant: &TenantId) -> Result<TenantInvoices, PersistenceError> {
        if let Some(invoices) = self.tenants.read().get(tenant) {
            return Ok(invoices.clone());
        }

        let loaded = Arc::new(RwLock::new(self.load(tenant).await?));
        let mut tenants = self.tenants.write();
        Ok(tenants.entry(tenant.clone()).or_insert(loaded).clone())
    }

    async fn load(&self, tenant: &TenantId) -> Result<Vec<Invoice>, PersistenceError> {
        let path = self.data_dir.join(tenant.as_str()).join(&self.invoices_file);
        let timeout_ms = self.load_timeout.as_millis() as u64;

        let read = tokio::time::timeout(self.load_timeout, tokio::fs::read(&path))
            .await
            .map_err(|_| PersistenceError::Timeout(timeout_ms))?;

        match read {
            Ok(bytes) => {
                let invoices: Vec<Invoice> =
                    serde_json::from_slice(&bytes).map_err(|e| PersistenceError::parse(&path, e))?;
                tracing::info!(tenant = %tenant, invoices = invoices.len(), "Loaded invoice ledger");
                Ok(invoices)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(tenant = %tenant, path = %path.display(), "Invoice file not found, tenant has no invoices");
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Outstanding (pending or overdue) invoices of one customer
    pub async fn outstanding_for(&self, tenant: &TenantId, phone: &str) -> Result<Vec<Invoice>, PersistenceError> {
        let invoices = self.tenant(tenant).await?;
        let phone = phone.trim();
        let outstanding = invoices
            .read()
            .iter()
            .filter(|inv| inv.customer_phone == phone && inv.status.is_outstanding())
            .cloned()
            .collect();
        Ok(outstanding)
    }

    pub async fn get(&self, tenant: &TenantId, invoice_id: &str) -> Result<Option<Invoice>, PersistenceError> {
        let invoices = self.tenant(tenant).await?;
        let found = invoices
            .read()
            .iter()
            .find(|inv| inv.invoice_id == invoice_id)
            .cloned();
        Ok(found)
    }

    /// Apply a payment; a zero balance marks the invoice paid
    pub async fn apply_payment(
        &self,
        tenant: &TenantId,
        invoice_id: &str,
        amount: f64,
        method: &str,
    ) -> Result<PaymentReceipt, LedgerError> {
        if !amount.is_finite() || amount <= 0.0 {
            return Err(LedgerError::InvalidAmount);
        }

        let invoices = self.tenant(tenant).await?;
        let mut invoices = invoices.write();
        let invoice = invoices
            .iter_mut()
            .find(|inv| inv.invoice_id == invoice_id)
            .ok_or(LedgerError::InvoiceNotFound)?;

        let balance = invoice.balance();
        if amount > balance + CENT {
            return Err(LedgerError::ExceedsBalance);
        }

        let remaining = round_cents(balance - amount);
        invoice.balance = Some(remaining);
        if remaining < CENT {
            invoice.balance = Some(0.0);
            invoice.status = InvoiceStatus::Paid;
        }

        let now = Utc::now();
        let payment_id = format!("PAY-{}", now.format("%Y%m%d%H%M%S"));
        let receipt = PaymentReceipt {
            confirmation_number: format!("CONF-{}", payment_id),
            payment_id,
            invoice_id: invoice.invoice_id.clone(),
            amount,
            method: method.to_string(),
            timestamp: now,
            remaining_balance: invoice.balance(),
            status: invoice.status,
        };

        tracing::info!(
            tenant = %tenant,
            invoice_id = %receipt.invoice_id,
            payment_id = %receipt.payment_id,
            amount = amount,
            status = %receipt.status,
            "Payment applied"
        );

        Ok(receipt)
    }

    pub async fn update_status(
        &self,
        tenant: &TenantId,
        invoice_id: &str,
        new_status: &str,
    ) -> Result<StatusChange, LedgerError> {
        let new_status: InvoiceStatus = new_status.trim().parse()?;

        let invoices = self.tenant(tenant).await?;
        let mut invoices = invoices.write();
        let invoice = invoices
            .iter_mut()
            .find(|inv| inv.invoice_id == invoice_id)
            .ok_or(LedgerError::InvoiceNotFound)?;

        let old_status = invoice.status;
        invoice.status = new_status;

        tracing::info!(
            tenant = %tenant,
            invoice_id = %invoice_id,
            old_status = %old_status,
            new_status = %new_status,
            "Invoice status updated"
        );

        Ok(StatusChange {
            invoice_id: invoice.invoice_id.clone(),
            old_status,
            new_status,
            updated_at: Utc::now(),
        })
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
