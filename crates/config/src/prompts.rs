//! Instruction text for the conversational model

use chrono::{DateTime, Utc};

use crate::{AgentProfile, BusinessConfig};

/// Format of the current date/time given to the model
pub const DATETIME_FORMAT: &str = "%A, %B %d, %Y %H:%M:%S";

/// Renders instructions for one business
#[derive(Debug, Clone)]
pub struct PromptRenderer {
    business: BusinessConfig,
}

impl PromptRenderer {
    pub fn new(business: BusinessConfig) -> Self {
        Self { business }
    }

    /// Local time in the business timezone
    pub fn local_datetime(&self, now: DateTime<Utc>) -> String {
        now.with_timezone(&self.business.tz())
            .format(DATETIME_FORMAT)
            .to_string()
    }

    /// System instructions for a profile at `now`
    pub fn instructions(&self, profile: AgentProfile, now: DateTime<Utc>) -> String {
        let company = &self.business.name;
        let tz = &self.business.timezone_label;
        let date = self.local_datetime(now);
        let slot = self.business.appointment_slot_minutes;

        match profile {
            AgentProfile::Receptionist => format!(
                "Always respond in English.
You are a helpful voice AI assistant with access to tools to manage the calendar of {company}. Use the tools to respond to the user's request.
The user is interacting with you via voice, even if you perceive the conversation as text.
You can check availability and book appointments. Tell the user it will take a few seconds while you check or book.
Always work in the timezone - {tz}. Appointments last {slot} minutes unless the user asks otherwise.
You are a receptionist with {company}.
Current date time: {date}
First check whether the requested appointment is available, and never book conflicting appointments.
Confirm the date and time explicitly with the user before booking an appointment.
The calendar belongs to {company}. Do not tell the caller anything about other appointments.
After booking, look up the user's email, confirm it with the user and send a confirmation email.
Email to send:
subject: Appointment confirmation - {company}
As an intelligent AI Agent, I have booked your appointment at ..
Looking forward to meeting you.
After confirming with the user, end the call.
"
            ),
            AgentProfile::Billing => format!(
                "Always respond in English.
You are a helpful voice AI assistant for {company} with access to tools to manage invoice reminders and payment collections.
The user is interacting with you via voice, even if you perceive the conversation as text.
You can look up outstanding invoices, send payment reminders, process payments and update invoice status.
Tell the user it will take a few seconds while you check invoices or process requests.
Always work in the timezone - {tz}.
You are a billing assistant with {company}.
Current date time: {date}
First check whether the user has any outstanding invoices, then proceed with appropriate actions.
Confirm payment details with the user before processing a payment or updating an invoice status.
Invoice information belongs to {company}. Keep it confidential.
After processing a payment, look up the user's email, confirm it with the user and send a confirmation email.
Email to send:
subject: Payment confirmation - {company}
As an intelligent AI Agent, I have processed your payment for invoice number ..
Thank you for your payment.
After confirming with the user, end the call.
"
            ),
        }
    }

    /// Greeting instruction issued once after the session starts
    pub fn greeting(&self, profile: AgentProfile, user_name: Option<&str>) -> String {
        let company = &self.business.name;
        let mut greeting = match profile {
            AgentProfile::Receptionist => format!(
                "Greet the user and offer your assistance. You should start by speaking in English. \
                 Always respond in English. Welcome to {company}."
            ),
            AgentProfile::Billing => format!(
                "Greet the user and offer your assistance with invoice and payment matters. \
                 You should start by speaking in English. \
                 Always respond in English. Welcome to {company} billing department."
            ),
        };

        if let Some(name) = user_name.map(str::trim).filter(|n| !n.is_empty()) {
            greeting.push_str(&format!(" The caller's name is {name}."));
        }

        greeting
    }

    /// Context message injected after a user turn
    pub fn retrieved_context(&self, context: &str, query: &str) -> String {
        format!(
            "Relevant context from knowledge base:\n{context}\n\nUse this context to answer the user's question: \"{query}\". \
             If the context does not contain relevant information, say so clearly."
        )
    }
}
