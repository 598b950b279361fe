//! Knowledge base search tool

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

use call_agent_core::{
    required_str, CallContext, ContextRetriever, InputSchema, PropertySchema, SideEffect, Tool,
    ToolError, ToolOutput, ToolSchema,
};

const MAX_LIMIT: usize = 10;

/// Search the tenant's documents
///
/// An empty context is a valid answer meaning nothing relevant was found.
pub struct SearchKnowledgeBaseTool {
    retriever: Arc<dyn ContextRetriever>,
    default_limit: usize,
}

impl SearchKnowledgeBaseTool {
    pub fn new(retriever: Arc<dyn ContextRetriever>, default_limit: usize) -> Self {
        Self {
            retriever,
            default_limit: default_limit.clamp(1, MAX_LIMIT),
        }
    }
}

#[async_trait]
impl Tool for SearchKnowledgeBaseTool {
    fn name(&self) -> &str {
        "search_knowledge_base"
    }

    fn description(&self) -> &str {
        "Search the business's documents for information to answer the caller's question"
    }

    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name().to_string(),
            description: self.description().to_string(),
            input_schema: InputSchema::object()
                .property("query", PropertySchema::string("What to look for"), true)
                .property(
                    "limit",
                    PropertySchema::integer("Maximum number of documents")
                        .with_default(json!(self.default_limit))
                        .with_range(1.0, MAX_LIMIT as f64),
                    false,
                ),
        }
    }

    fn side_effect(&self) -> SideEffect {
        SideEffect::ReadOnly
    }

    async fn execute(&self, ctx: &CallContext, input: Value) -> Result<ToolOutput, ToolError> {
        let query = required_str(&input, "query")?;
        let limit = input
            .get("limit")
            .and_then(Value::as_u64)
            .map(|l| l as usize)
            .unwrap_or(self.default_limit);

        let context = self.retriever.retrieve_context(&ctx.tenant, query, limit).await;

        Ok(ToolOutput::json(json!({ "context": context })))
    }
}
