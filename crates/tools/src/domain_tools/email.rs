//! Email confirmation tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use call_agent_core::{
    optional_str, required_str, CallContext, InputSchema, PropertySchema, SideEffect, Tool,
    ToolError, ToolOutput, ToolSchema,
};
use call_agent_persistence::{is_valid_email, EmailService, EmailType, OutboundEmail, UserDirectory};

/// Send an email to the caller, or to an address they confirmed
pub struct SendEmailTool {
    email: Arc<dyn EmailService>,
    directory: Arc<dyn UserDirectory>,
}

impl SendEmailTool {
    pub fn new(email: Arc<dyn EmailService>, directory: Arc<dyn UserDirectory>) -> Self {
        Self { email, directory }
    }
}

#[async_trait]
impl Tool for SendEmailTool {
    fn name(&self) -> &str {
        "send_email"
    }

    fn description(&self) -> &str {
        "Send a confirmation email. Confirm the address with the caller before sending."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property("subject", PropertySchema::string("Email subject"), true)
                .property("body", PropertySchema::string("Email body"), true)
                .property(
                    "to",
                    PropertySchema::string("Recipient, defaults to the caller's email"),
                    false,
                ),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Mutating
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let subject = required_str(&input, "subject")?;
        let body = required_str(&input, "body")?;

        let to = match optional_str(&input, "to") {
            Some(to) => to.to_string(),
            None => self.directory.lookup_user(&ctx.tenant, &ctx.caller).await.email,
        };

        if !is_valid_email(&to) {
            return Ok(ToolOutput::error("invalid email"));
        }

        let result = self
            .email
            .send_email(&OutboundEmail {
                to: to.clone(),
                subject: subject.to_string(),
                body: body.to_string(),
                email_type: EmailType::Confirmation,
                room_name: Some(ctx.room_name.clone()),
            })
            .await
            .map_err(|e| ToolError::internal(format!("Failed to send email: {}", e)))?;

        Ok(ToolOutput::json(json!({
            "success": true,
            "message_id": result.message_id.to_string(),
            "to": to,
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{call_context, known_caller, tenant_data};
    use call_agent_core::args;
    use call_agent_persistence::SimulatedEmailService;

    #[tokio::test]
    async fn test_defaults_to_caller_email() {
        let (_dir, directory, _) = tenant_data();
        let email = Arc::new(SimulatedEmailService::new("desk@example.com"));
        let tool = SendEmailTool::new(email.clone(), directory);
        let (ctx, _, _) = known_caller();

        let out = tool
            .execute(&ctx, args(&[("subject", json!("Appointment confirmation")), ("body", json!("See you soon"))]))
            .await
            .unwrap()
            .to_value();
        assert_eq!(out["to"], "ada@example.com");
        assert_eq!(email.messages_for("ada@example.com").len(), 1);
    }

    #[tokio::test]
    async fn test_anonymous_caller_gets_placeholder_and_bad_address_rejected() {
        let (_dir, directory, _) = tenant_data();
        let email = Arc::new(SimulatedEmailService::new("desk@example.com"));
        let tool = SendEmailTool::new(email.clone(), directory);
        let (ctx, _, _) = call_context("anonymous");

        let out = tool
            .execute(&ctx, args(&[("subject", json!("Hi")), ("body", json!("Hello"))]))
            .await
            .unwrap()
            .to_value();
        assert_eq!(out["to"], "john.doe@example.com");

        let out = tool
            .execute(&ctx, args(&[("subject", json!("Hi")), ("body", json!("Hello")), ("to", json!("nobody"))]))
            .await
            .unwrap();
        assert_eq!(out.error_message().as_deref(), Some("invalid email"));
    }
}
