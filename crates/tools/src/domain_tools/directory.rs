//! Caller directory tools

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use call_agent_core::{
    required_str, CallContext, InputSchema, PropertySchema, SideEffect, Tool, ToolError,
    ToolOutput, ToolSchema,
};
use call_agent_persistence::{is_valid_email, PersistenceError, UserDirectory};

/// Look up the caller's directory record
///
/// Never fails: an unknown or unparseable caller gets the anonymous record.
pub struct LookupUserTool {
    directory: Arc<dyn UserDirectory>,
}

impl LookupUserTool {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for LookupUserTool {
    fn name(&self) -> &str {
        "lookup_user"
    }

    fn description(&self) -> &str {
        "Look up the caller's name and email, for example before sending an email"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object(),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::ReadOnly
    }

    async fn execute(&self, ctx: &CallContext, _input: Value) -> Result<ToolOutput, ToolError> {
        let user = self.directory.lookup_user(&ctx.tenant, &ctx.caller).await;
        Ok(ToolOutput::json(user.to_json()))
    }
}

/// Change the caller's email after pin confirmation
pub struct UpdateContactEmailTool {
    directory: Arc<dyn UserDirectory>,
}

impl UpdateContactEmailTool {
    pub fn new(directory: Arc<dyn UserDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl Tool for UpdateContactEmailTool {
    fn name(&self) -> &str {
        "update_contact_email"
    }

    fn description(&self) -> &str {
        "Update the caller's email address. Ask the caller for their confirmation pin first."
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property(
                    "pin",
                    PropertySchema::string("Confirmation pin given by the caller"),
                    true,
                )
                .property(
                    "new_email",
                    PropertySchema::string("New email address"),
                    true,
                ),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::Mutating
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let pin = required_str(&input, "pin")?;
        let new_email = required_str(&input, "new_email")?;

        let Some(phone) = ctx.caller.phone() else {
            return Ok(ToolOutput::error("not found"));
        };

        let record = self
            .directory
            .find_by_phone(&ctx.tenant, phone)
            .await
            .map_err(|e| ToolError::internal(format!("Directory unavailable: {}", e)))?;
        let Some(record) = record else {
            return Ok(ToolOutput::error("not found"));
        };

        if record.pin.as_deref().map(str::trim) != Some(pin) {
            tracing::info!(tenant = %ctx.tenant, room = %ctx.room_name, "Email change confirmation failed");
            return Ok(ToolOutput::error("confirmation failed"));
        }

        if !is_valid_email(new_email) {
            return Ok(ToolOutput::error("invalid email"));
        }

        match self.directory.update_email(&ctx.tenant, phone, new_email).await {
            Ok(before) => Ok(ToolOutput::json(json!({
                "success": true,
                "old_email": before.email,
                "new_email": new_email,
            }))),
            Err(PersistenceError::InvalidData(_)) => Ok(ToolOutput::error("invalid email")),
            Err(PersistenceError::NotFound(_)) => Ok(ToolOutput::error("not found")),
            Err(e) => Err(ToolError::internal(format!("Failed to update email: {}", e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{call_context, known_caller, tenant, tenant_data};
    use call_agent_core::args;

    #[tokio::test]
    async fn test_lookup_known_and_unknown_callers() {
        let (_dir, directory, _) = tenant_data();
        let tool = LookupUserTool::new(directory);

        let (ctx, _, _) = known_caller();
        let out = tool.execute(&ctx, Value::Null).await.unwrap().to_value();
        assert_eq!(out["name"], "Ada");
        assert_eq!(out["email"], "ada@example.com");
        assert!(out.get("pin").is_none());

        for room in ["Call-0000000000", "anonymous", "Call-", ""] {
            let (ctx, _, _) = call_context(room);
            let out = tool.execute(&ctx, Value::Null).await.unwrap().to_value();
            assert_eq!(out, json!({"name": "John Doe", "email": "john.doe@example.com"}));
        }
    }

    #[tokio::test]
    async fn test_update_email_requires_pin() {
        let (_dir, directory, _) = tenant_data();
        let tool = UpdateContactEmailTool::new(directory.clone());
        let (ctx, _, _) = known_caller();

        let out = tool
            .execute(&ctx, args(&[("pin", json!("9999")), ("new_email", json!("ada@new.example"))]))
            .await
            .unwrap();
        assert_eq!(out.error_message().as_deref(), Some("confirmation failed"));
        let user = directory.find_by_phone(&tenant(), "5551234567").await.unwrap().unwrap();
        assert_eq!(user.email, "ada@example.com");

        let out = tool
            .execute(&ctx, args(&[("pin", json!("1234")), ("new_email", json!("not-an-email"))]))
            .await
            .unwrap();
        assert_eq!(out.error_message().as_deref(), Some("invalid email"));

        let out = tool
            .execute(&ctx, args(&[("pin", json!("1234")), ("new_email", json!("ada@new.example"))]))
            .await
            .unwrap()
            .to_value();
        assert_eq!(out["success"], true);
        assert_eq!(out["old_email"], "ada@example.com");
        let user = directory.find_by_phone(&tenant(), "5551234567").await.unwrap().unwrap();
        assert_eq!(user.email, "ada@new.example");
    }

    #[tokio::test]
    async fn test_update_email_unknown_caller_or_missing_pin() {
        let (_dir, directory, _) = tenant_data();
        let tool = UpdateContactEmailTool::new(directory);
        let input = args(&[("pin", json!("1234")), ("new_email", json!("x@example.com"))]);

        let (ctx, _, _) = call_context("Call-0000000000");
        let out = tool.execute(&ctx, input.clone()).await.unwrap();
        assert_eq!(out.error_message().as_deref(), Some("not found"));

        // Grace has no pin on file
        let (ctx, _, _) = call_context("Call-5559876543");
        let out = tool.execute(&ctx, input).await.unwrap();
        assert_eq!(out.error_message().as_deref(), Some("confirmation failed"));
    }
}
