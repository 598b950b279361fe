//! Outbound email
//!
//! Messages are NOT actually sent: the simulated service records them and
//! logs the send, which is what reminders and confirmations need for audit
//! and testing. `RetryingEmailService` adds bounded retry around any sender.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use call_agent_config::NotificationConfig;
use call_agent_core::RetryPolicy;

use crate::PersistenceError;

/// Email message types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailType {
    PaymentReminder,
    Confirmation,
}

impl EmailType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PaymentReminder => "payment_reminder",
            Self::Confirmation => "confirmation",
        }
    }
}

/// Delivery status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmailStatus {
    SimulatedSent,
    Delivered,
}

/// Outbound email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEmail {
    pub to: String,
    pub subject: String,
    pub body: String,
    pub email_type: EmailType,
    /// Room the email was sent from
    pub room_name: Option<String>,
}

/// Email record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailMessage {
    pub message_id: Uuid,
    pub from: String,
    #[serde(flatten)]
    pub email: OutboundEmail,
    pub status: EmailStatus,
    pub sent_at: DateTime<Utc>,
}

/// Result of sending an email
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    pub message_id: Uuid,
    pub status: EmailStatus,
    pub sent_at: DateTime<Utc>,
    pub simulated: bool,
}

/// Email service trait
#[async_trait]
pub trait EmailService: Send + Sync {
    async fn send_email(&self, email: &OutboundEmail) -> Result<SendResult, PersistenceError>;
}

/// Simulated email service that records every message
pub struct SimulatedEmailService {
    sender: String,
    sent: RwLock<Vec<EmailMessage>>,
}

impl SimulatedEmailService {
    pub fn new(sender: impl Into<String>) -> Self {
        Self {
            sender: sender.into(),
            sent: RwLock::new(Vec::new()),
        }
    }

    /// Messages sent to `to`, oldest first
    pub fn messages_for(&self, to: &str) -> Vec<EmailMessage> {
        self.sent
            .read()
            .iter()
            .filter(|m| m.email.to.eq_ignore_ascii_case(to))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EmailService for SimulatedEmailService {
    async fn send_email(&self, email: &OutboundEmail) -> Result<SendResult, PersistenceError> {
        let message_id = Uuid::new_v4();
        let now = Utc::now();

        self.sent.write().push(EmailMessage {
            message_id,
            from: self.sender.clone(),
            email: email.clone(),
            status: EmailStatus::SimulatedSent,
            sent_at: now,
        });

        tracing::info!(
            message_id = %message_id,
            email_type = email.email_type.as_str(),
            room = ?email.room_name,
            "Email simulated and recorded"
        );
        tracing::debug!(to = %email.to, subject = %email.subject, "Email content (simulated)");

        Ok(SendResult {
            message_id,
            status: EmailStatus::SimulatedSent,
            sent_at: now,
            simulated: true,
        })
    }
}

/// Retries transient send failures before giving up
pub struct RetryingEmailService {
    inner: Arc<dyn EmailService>,
    policy: RetryPolicy,
}

impl RetryingEmailService {
    pub fn new(inner: Arc<dyn EmailService>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn from_config(inner: Arc<dyn EmailService>, config: &NotificationConfig) -> Self {
        Self::new(inner, RetryPolicy::new(config.max_retries, config.initial_backoff()))
    }
}

#[async_trait]
impl EmailService for RetryingEmailService {
    async fn send_email(&self, email: &OutboundEmail) -> Result<SendResult, PersistenceError> {
        let inner = &self.inner;
        self.policy
            .run(
                "Email send",
                move || async move { inner.send_email(email).await },
                PersistenceError::is_transient,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct FlakySender {
        failures: AtomicU32,
        inner: SimulatedEmailService,
    }

    #[async_trait]
    impl EmailService for FlakySender {
        async fn send_email(&self, email: &OutboundEmail) -> Result<SendResult, PersistenceError> {
            if self.failures.load(Ordering::SeqCst) > 0 {
                self.failures.fetch_sub(1, Ordering::SeqCst);
                return Err(PersistenceError::Notification("smtp unavailable".into()));
            }
            self.inner.send_email(email).await
        }
    }

    fn email(to: &str) -> OutboundEmail {
        OutboundEmail {
            to: to.into(),
            subject: "Payment confirmation".into(),
            body: "Thank you for your payment.".into(),
            email_type: EmailType::Confirmation,
            room_name: Some("Call-5551234567".into()),
        }
    }

    #[tokio::test]
    async fn test_simulated_send_records_message() {
        let service = SimulatedEmailService::new("billing@example.com");
        let result = service.send_email(&email("ada@example.com")).await.unwrap();
        assert!(result.simulated);

        let sent = service.messages_for("ADA@example.com");
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].message_id, result.message_id);
        assert_eq!(sent[0].from, "billing@example.com");
    }

    #[tokio::test]
    async fn test_retry_recovers_transient_failure() {
        let flaky = Arc::new(FlakySender {
            failures: AtomicU32::new(2),
            inner: SimulatedEmailService::new("billing@example.com"),
        });
        let service = RetryingEmailService::new(flaky.clone(), RetryPolicy::new(2, Duration::from_millis(1)));

        assert!(service.send_email(&email("ada@example.com")).await.is_ok());
        assert_eq!(flaky.inner.messages_for("ada@example.com").len(), 1);
    }

    #[tokio::test]
    async fn test_retry_gives_up() {
        let flaky = Arc::new(FlakySender {
            failures: AtomicU32::new(5),
            inner: SimulatedEmailService::new("billing@example.com"),
        });
        let service = RetryingEmailService::new(flaky.clone(), RetryPolicy::new(1, Duration::from_millis(1)));

        assert!(matches!(
            service.send_email(&email("ada@example.com")).await,
            Err(PersistenceError::Notification(_))
        ));
        assert_eq!(flaky.failures.load(Ordering::SeqCst), 3);
    }
}
