//! Invoice and payment tools
//!
//! All rejections come back as `{"error": ...}` payloads and leave the
//! ledger untouched. Backend failures surface as `ToolError`.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;

use call_agent_core::{
    optional_str, required_str, CallContext, InputSchema, PropertySchema, SideEffect, Tool,
    ToolError, ToolOutput, ToolSchema,
};
use call_agent_persistence::{
    EmailService, EmailType, Invoice, InvoiceLedger, LedgerError, OutboundEmail, UserDirectory,
};

/// Reminder tiers
const REMINDER_TYPES: [&str; 3] = ["gentle", "urgent", "final"];

fn reminder_message(reminder_type: &str, invoice_id: &str) -> String {
    match reminder_type {
        "urgent" => format!(
            "URGENT: Your invoice {} is overdue. Please make payment immediately.",
            invoice_id
        ),
        "final" => format!(
            "FINAL NOTICE: Your invoice {} is significantly overdue. Please contact us immediately.",
            invoice_id
        ),
        _ => format!(
            "This is a friendly reminder that your invoice {} is due for payment.",
            invoice_id
        ),
    }
}

fn invoice_json(invoice: &Invoice) -> Value {
    json!({
        "invoice_id": invoice.invoice_id,
        "amount": invoice.amount,
        "balance": invoice.balance(),
        "due_date": invoice.due_date.format("%Y-%m-%d").to_string(),
        "status": invoice.status.as_str(),
        "description": invoice.description,
    })
}

/// Ledger rejections go to the model, backend failures are tool errors
fn ledger_rejection(err: LedgerError) -> Result<ToolOutput, ToolError> {
    match err {
        LedgerError::Unavailable(msg) => Err(ToolError::internal(format!("Ledger unavailable: {}", msg))),
        rejection => Ok(ToolOutput::error(rejection.to_string())),
    }
}

/// List the caller's outstanding invoices
pub struct LookupOutstandingInvoicesTool {
    directory: Arc<dyn UserDirectory>,
    invoices: Arc<InvoiceLedger>,
}

impl LookupOutstandingInvoicesTool {
    pub fn new(directory: Arc<dyn UserDirectory>, invoices: Arc<InvoiceLedger>) -> Self {
        Self {
            directory,
            invoices,
        }
    }
}

#[async_trait]
impl Tool for LookupOutstandingInvoicesTool {
    fn name(&self) -> &str {
        "lookup_outstanding_invoices"
    }

    fn description(&self) -> &str {
        "Look up outstanding invoices for a customer by phone number"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object().property(
                "customer_phone",
                PropertySchema::string("Customer phone number, defaults to the caller"),
                false,
            ),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::ReadOnly
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let Some(phone) = optional_str(&input, "customer_phone").or(ctx.caller.phone()) else {
            let mut fields = Map::new();
            fields.insert("phone".into(), Value::Null);
            return Ok(ToolOutput::error_with("not found", fields));
        };

        let customer = self
            .directory
            .find_by_phone(&ctx.tenant, phone)
            .await
            .map_err(|e| ToolError::internal(format!("Directory unavailable: {}", e)))?;

        let Some(customer) = customer else {
            let mut fields = Map::new();
            fields.insert("phone".into(), json!(phone));
            return Ok(ToolOutput::error_with("not found", fields));
        };

        let outstanding = self
            .invoices
            .outstanding_for(&ctx.tenant, phone)
            .await
            .map_err(|e| ToolError::internal(format!("Ledger unavailable: {}", e)))?;

        let total: f64 = outstanding.iter().map(Invoice::balance).sum();

        Ok(ToolOutput::json(json!({
            "customer": customer.to_json(),
            "outstanding_invoices": outstanding.iter().map(invoice_json).collect::<Vec<_>>(),
            "total_outstanding": (total * 100.0).round() / 100.0,
        })))
    }
}

/// Email a payment reminder for one invoice
pub struct SendPaymentReminderTool {
    directory: Arc<dyn UserDirectory>,
    invoices: Arc<InvoiceLedger>,
    email: Arc<dyn EmailService>,
    company: String,
}

impl SendPaymentReminderTool {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        invoices: Arc<InvoiceLedger>,
        email: Arc<dyn EmailService>,
        company: impl Into<String>,
    ) -> Self {
        Self {
            directory,
            invoices,
            email,
            company: company.into(),
        }
    }
}

#[async_trait]
impl Tool for SendPaymentReminderTool {
    fn name(&self) -> &str {
        "send_payment_reminder"
    }

    fn description(&self) -> &str {
        "Send a payment reminder for a specific invoice"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property("invoice_id", PropertySchema::string("Invoice ID"), true)
                .property(
                    "reminder_type",
                    PropertySchema::enum_type(
                        "How firm the reminder is",
                        REMINDER_TYPES.iter().map(|t| t.to_string()).collect(),
                    )
                    .with_default(json!("gentle")),
                    false,
                ),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Mutating
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let invoice_id = required_str(&input, "invoice_id")?;
        let reminder_type = optional_str(&input, "reminder_type").unwrap_or("gentle");

        let invoice = self
            .invoices
            .get(&ctx.tenant, invoice_id)
            .await
            .map_err(|e| ToolError::internal(format!("Ledger unavailable: {}", e)))?;
        if invoice.is_none() {
            return Ok(ToolOutput::error("invoice not found"));
        }

        let user = self.directory.lookup_user(&ctx.tenant, &ctx.caller).await;
        let message = reminder_message(reminder_type, invoice_id);

        self.email
            .send_email(&OutboundEmail {
                to: user.email.clone(),
                subject: format!("Payment reminder - {}", self.company),
                body: message.clone(),
                email_type: EmailType::PaymentReminder,
                room_name: Some(ctx.room_name.clone()),
            })
            .await
            .map_err(|e| ToolError::internal(format!("Failed to send reminder: {}", e)))?;

        tracing::info!(
            tenant = %ctx.tenant,
            invoice_id = %invoice_id,
            reminder_type = reminder_type,
            "Payment reminder sent"
        );

        Ok(ToolOutput::json(json!({
            "success": true,
            "invoice_id": invoice_id,
            "reminder_type": reminder_type,
            "message_sent": message,
            "timestamp": Utc::now().to_rfc3339(),
        })))
    }
}

/// Take a payment against an invoice
pub struct ProcessPaymentTool {
    invoices: Arc<InvoiceLedger>,
}

impl ProcessPaymentTool {
    pub fn new(invoices: Arc<InvoiceLedger>) -> Self {
        Self { invoices }
    }
}

#[async_trait]
impl Tool for ProcessPaymentTool {
    fn name(&self) -> &str {
        "process_payment"
    }

    fn description(&self) -> &str {
        "Process a payment for a specific invoice. Confirm the amount with the caller first."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property("invoice_id", PropertySchema::string("Invoice ID"), true)
                .property(
                    "payment_amount",
                    PropertySchema::number("Amount to pay, greater than zero"),
                    true,
                )
                .property(
                    "payment_method",
                    PropertySchema::string("Payment method").with_default(json!("credit_card")),
                    false,
                ),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Mutating
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let invoice_id = required_str(&input, "invoice_id")?;
        let amount = input
            .get("payment_amount")
            .and_then(Value::as_f64)
            .ok_or_else(|| ToolError::invalid_params("payment_amount is required"))?;
        let method = optional_str(&input, "payment_method").unwrap_or("credit_card");

        match self
            .invoices
            .apply_payment(&ctx.tenant, invoice_id, amount, method)
            .await
        {
            Ok(receipt) => Ok(ToolOutput::json(json!({
                "success": true,
                "payment_id": receipt.payment_id,
                "invoice_id": receipt.invoice_id,
                "amount": receipt.amount,
                "method": receipt.method,
                "timestamp": receipt.timestamp.to_rfc3339(),
                "confirmation_number": receipt.confirmation_number,
                "remaining_balance": receipt.remaining_balance,
                "status": receipt.status.as_str(),
            }))),
            Err(e) => ledger_rejection(e),
        }
    }
}

/// Move an invoice to another status
pub struct UpdateInvoiceStatusTool {
    invoices: Arc<InvoiceLedger>,
}

impl UpdateInvoiceStatusTool {
    pub fn new(invoices: Arc<InvoiceLedger>) -> Self {
        Self { invoices }
    }
}

#[async_trait]
impl Tool for UpdateInvoiceStatusTool {
    fn name(&self) -> &str {
        "update_invoice_status"
    }

    fn description(&self) -> &str {
        "Update the status of an invoice"
    }

    fn schema(&self) -> ToolSchema {
        // Plain string so out-of-set values reach the ledger's own rejection
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property("invoice_id", PropertySchema::string("Invoice ID"), true)
                .property(
                    "new_status",
                    PropertySchema::string("One of: pending, paid, overdue, cancelled"),
                    true,
                ),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Mutating
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let invoice_id = required_str(&input, "invoice_id")?;
        let new_status = required_str(&input, "new_status")?;

        match self
            .invoices
            .update_status(&ctx.tenant, invoice_id, new_status)
            .await
        {
            Ok(change) => Ok(ToolOutput::json(json!({
                "success": true,
                "invoice_id": change.invoice_id,
                "old_status": change.old_status.as_str(),
                "new_status": change.new_status.as_str(),
                "updated_at": change.updated_at.to_rfc3339(),
            }))),
            Err(e) => ledger_rejection(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{call_context, known_caller, tenant, tenant_data};
    use call_agent_core::args;
    use call_agent_persistence::{InvoiceStatus, SimulatedEmailService};

    #[tokio::test]
    async fn test_lookup_outstanding_invoices() {
        let (_dir, directory, ledger) = tenant_data();
        let tool = LookupOutstandingInvoicesTool::new(directory, ledger);

        let (ctx, _, _) = known_caller();
        let out = tool.execute(&ctx, Value::Null).await.unwrap().to_value();
        assert_eq!(out["customer"]["name"], "Ada");
        assert_eq!(out["outstanding_invoices"].as_array().unwrap().len(), 2);
        assert_eq!(out["total_outstanding"], 225.0);

        let (ctx, _, _) = call_context("Call-0000000000");
        let out = tool.execute(&ctx, Value::Null).await.unwrap();
        assert!(out.is_error);
        assert_eq!(out.to_value(), json!({"error": "not found", "phone": "0000000000"}));

        let (ctx, _, _) = call_context("anonymous");
        let out = tool
            .execute(&ctx, args(&[("customer_phone", json!("5551234567"))]))
            .await
            .unwrap();
        assert!(!out.is_error);
    }

    #[tokio::test]
    async fn test_send_payment_reminder() {
        let (_dir, directory, ledger) = tenant_data();
        let email = Arc::new(SimulatedEmailService::new("billing@example.com"));
        let tool = SendPaymentReminderTool::new(directory, ledger, email.clone(), "Jacks' Dental Practice");
        let (ctx, _, _) = known_caller();

        let out = tool
            .execute(&ctx, args(&[("invoice_id", json!("INV-001")), ("reminder_type", json!("urgent"))]))
            .await
            .unwrap()
            .to_value();
        assert_eq!(out["success"], true);
        assert_eq!(
            out["message_sent"],
            "URGENT: Your invoice INV-001 is overdue. Please make payment immediately."
        );

        let sent = email.messages_for("ada@example.com");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].email.email_type, EmailType::PaymentReminder);

        let out = tool
            .execute(&ctx, args(&[("invoice_id", json!("INV-404"))]))
            .await
            .unwrap();
        assert_eq!(out.error_message().as_deref(), Some("invoice not found"));
        assert_eq!(email.messages_for("ada@example.com").len(), 1);
    }

    #[tokio::test]
    async fn test_process_payment_rejects_without_mutation() {
        let (_dir, _, ledger) = tenant_data();
        let tool = ProcessPaymentTool::new(ledger.clone());
        let (ctx, _, _) = known_caller();

        for (amount, expected) in [
            (json!(0), "invalid amount"),
            (json!(-10.5), "invalid amount"),
            (json!(1000.0), "amount exceeds outstanding balance"),
        ] {
            let out = tool
                .execute(&ctx, args(&[("invoice_id", json!("INV-001")), ("payment_amount", amount)]))
                .await
                .unwrap();
            assert_eq!(out.error_message().as_deref(), Some(expected));
        }

        let out = tool
            .execute(&ctx, args(&[("invoice_id", json!("INV-404")), ("payment_amount", json!(5))]))
            .await
            .unwrap();
        assert_eq!(out.error_message().as_deref(), Some("invoice not found"));

        let invoice = ledger.get(&tenant(), "INV-001").await.unwrap().unwrap();
        assert_eq!(invoice.balance(), 150.0);
        assert_eq!(invoice.status, InvoiceStatus::Overdue);
    }

    #[tokio::test]
    async fn test_process_full_payment_marks_paid() {
        let (_dir, _, ledger) = tenant_data();
        let tool = ProcessPaymentTool::new(ledger.clone());
        let (ctx, _, _) = known_caller();

        let out = tool
            .execute(&ctx, args(&[("invoice_id", json!("INV-002")), ("payment_amount", json!(75))]))
            .await
            .unwrap()
            .to_value();
        assert_eq!(out["success"], true);
        assert_eq!(out["method"], "credit_card");
        assert!(out["confirmation_number"].as_str().unwrap().starts_with("CONF-PAY-"));

        let invoice = ledger.get(&tenant(), "INV-002").await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Paid);
    }

    #[tokio::test]
    async fn test_update_invoice_status_closed_set() {
        let (_dir, _, ledger) = tenant_data();
        let tool = UpdateInvoiceStatusTool::new(ledger.clone());
        let (ctx, _, _) = known_caller();

        let out = tool
            .execute(&ctx, args(&[("invoice_id", json!("INV-002")), ("new_status", json!("refunded"))]))
            .await
            .unwrap();
        assert_eq!(
            out.error_message().as_deref(),
            Some("Invalid status. Must be one of: pending, paid, overdue, cancelled")
        );
        let invoice = ledger.get(&tenant(), "INV-002").await.unwrap().unwrap();
        assert_eq!(invoice.status, InvoiceStatus::Pending);

        let out = tool
            .execute(&ctx, args(&[("invoice_id", json!("INV-002")), ("new_status", json!("cancelled"))]))
            .await
            .unwrap()
            .to_value();
        assert_eq!(out["old_status"], "pending");
        assert_eq!(out["new_status"], "cancelled");
    }
}
