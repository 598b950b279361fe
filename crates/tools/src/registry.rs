//! Tool Registry
//!
//! Manages tool registration, discovery, and execution. The catalog is
//! closed: every tool maps to a `ToolName`, and registration rejects
//! anything the catalog does not know.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use call_agent_core::{
    CallContext, SideEffect, Tool, ToolError, ToolOutput, ToolSchema, DEFAULT_TOOL_TIMEOUT_SECS,
};

/// Every action a model may call
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToolName {
    LookupUser,
    UpdateContactEmail,
    LookupOutstandingInvoices,
    SendPaymentReminder,
    ProcessPayment,
    UpdateInvoiceStatus,
    CheckAvailability,
    BookAppointment,
    SendEmail,
    SearchKnowledgeBase,
    TransferCall,
    EndCall,
}

impl ToolName {
    pub const ALL: [ToolName; 12] = [
        Self::LookupUser,
        Self::UpdateContactEmail,
        Self::LookupOutstandingInvoices,
        Self::SendPaymentReminder,
        Self::ProcessPayment,
        Self::UpdateInvoiceStatus,
        Self::CheckAvailability,
        Self::BookAppointment,
        Self::SendEmail,
        Self::SearchKnowledgeBase,
        Self::TransferCall,
        Self::EndCall,
    ];

    /// Wire name exposed to the model
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LookupUser => "lookup_user",
            Self::UpdateContactEmail => "update_contact_email",
            Self::LookupOutstandingInvoices => "lookup_outstanding_invoices",
            Self::SendPaymentReminder => "send_payment_reminder",
            Self::ProcessPayment => "process_payment",
            Self::UpdateInvoiceStatus => "update_invoice_status",
            Self::CheckAvailability => "check_availability",
            Self::BookAppointment => "book_appointment",
            Self::SendEmail => "send_email",
            Self::SearchKnowledgeBase => "search_knowledge_base",
            Self::TransferCall => "transfer_call",
            Self::EndCall => "end_call",
        }
    }

    pub fn side_effect(&self) -> SideEffect {
        match self {
            Self::LookupUser
            | Self::LookupOutstandingInvoices
            | Self::CheckAvailability
            | Self::SearchKnowledgeBase => SideEffect::ReadOnly,
            Self::UpdateContactEmail
            | Self::SendPaymentReminder
            | Self::ProcessPayment
            | Self::UpdateInvoiceStatus
            | Self::BookAppointment
            | Self::SendEmail => SideEffect::Mutating,
            Self::TransferCall | Self::EndCall => SideEffect::Terminal,
        }
    }
}

impl fmt::Display for ToolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolName {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| RegistryError::UnknownTool(s.to_string()))
    }
}

/// Registration failures, raised at startup
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool already registered: {0}")]
    Duplicate(String),

    #[error("Tool {tool} requires undeclared properties: {fields:?}")]
    UndeclaredRequired { tool: String, fields: Vec<String> },

    #[error("Tool {tool} declares side effect {declared}, expected {expected}")]
    SideEffectMismatch {
        tool: String,
        declared: &'static str,
        expected: &'static str,
    },
}

impl From<RegistryError> for call_agent_core::Error {
    fn from(err: RegistryError) -> Self {
        call_agent_core::Error::Tool(err.to_string())
    }
}

/// Tool executor trait
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool by name for one call
    async fn execute(
        &self,
        ctx: &CallContext,
        name: &str,
        arguments: Value,
    ) -> Result<ToolOutput, ToolError>;

    /// List available tools
    fn list_tools(&self) -> Vec<ToolSchema>;

    /// Side-effect class of a registered tool
    fn side_effect(&self, name: &str) -> Option<SideEffect>;
}

/// Tool registry
pub struct ToolRegistry {
    tools: BTreeMap<ToolName, Arc<dyn Tool>>,
    default_timeout_secs: u64,
}

impl ToolRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
            default_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }

    /// Bound for tools that keep the trait's default timeout
    pub fn with_default_timeout(mut self, secs: u64) -> Self {
        self.default_timeout_secs = secs.max(1);
        self
    }

    /// Register a tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) -> Result<(), RegistryError> {
        self.register_boxed(Arc::new(tool))
    }

    /// Register a shared tool
    pub fn register_boxed(&mut self, tool: Arc<dyn Tool>) -> Result<(), RegistryError> {
        let name: ToolName = tool.name().parse()?;

        if self.tools.contains_key(&name) {
            return Err(RegistryError::Duplicate(name.to_string()));
        }

        let schema = tool.schema();
        let undeclared = schema.input_schema.undeclared_required();
        if !undeclared.is_empty() {
            return Err(RegistryError::UndeclaredRequired {
                tool: name.to_string(),
                fields: undeclared.into_iter().map(String::from).collect(),
            });
        }

        if tool.side_effect() != name.side_effect() {
            return Err(RegistryError::SideEffectMismatch {
                tool: name.to_string(),
                declared: tool.side_effect().as_str(),
                expected: name.side_effect().as_str(),
            });
        }

        self.tools.insert(name, tool);
        Ok(())
    }

    /// Get tool by name
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        name.parse::<ToolName>().ok().and_then(|n| self.tools.get(&n))
    }

    /// Check if tool exists
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Get number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if registry is empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Get all tool names, in catalog order
    pub fn tool_names(&self) -> Vec<ToolName> {
        self.tools.keys().copied().collect()
    }

    fn timeout_for(&self, tool: &dyn Tool) -> u64 {
        tool.timeout_secs().unwrap_or(self.default_timeout_secs)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    /// Validate, then execute with timeout protection
    async fn execute(
        &self,
        ctx: &CallContext,
        name: &str,
        arguments: Value,
    ) -> Result<ToolOutput, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::not_found(format!("Tool not found: {}", name)))?;

        tool.validate(&arguments)?;

        let timeout_secs = self.timeout_for(tool.as_ref());

        tracing::trace!(tool = name, timeout_secs = timeout_secs, "Executing tool with timeout");

        match tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            tool.execute(ctx, arguments),
        )
        .await
        {
            Ok(result) => result,
            Err(_elapsed) => Err(ToolError::timeout(name, timeout_secs)),
        }
    }

    fn list_tools(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }

    fn side_effect(&self, name: &str) -> Option<SideEffect> {
        self.get(name).map(|t| t.side_effect())
    }
}
