//! Tenant knowledge retriever
//!
//! Resolves the tenant's collection, searches it, and formats the hits into
//! one context string. Never fails: a missing collection, a backend error or
//! a timeout all yield an empty string.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

use call_agent_config::RagConfig;
use call_agent_core::{ContextRetriever, RetryPolicy, TenantId};

use crate::{KnowledgeBackend, KnowledgeHit, RagError};

/// Separator between formatted hits
pub const HIT_SEPARATOR: &str = "\n\n---\n\n";

/// Format hits as `Document: title (filename) (relevance: x)\nContent: ...` blocks
pub fn format_hits(hits: &[KnowledgeHit]) -> String {
    hits.iter()
        .map(|hit| {
            let relevance = hit
                .relevance
                .map(|r| format!(" (relevance: {:.2})", r))
                .unwrap_or_default();
            format!(
                "Document: {} ({}){}\nContent: {}",
                hit.title, hit.filename, relevance, hit.content
            )
        })
        .collect::<Vec<_>>()
        .join(HIT_SEPARATOR)
}

enum Outcome {
    Hits(Vec<KnowledgeHit>),
    MissingCollection,
}

/// Retriever over per-tenant collections named `{prefix}{tenant}`
pub struct TenantKnowledgeRetriever {
    backend: Arc<dyn KnowledgeBackend>,
    collection_prefix: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl TenantKnowledgeRetriever {
    pub fn new(
        backend: Arc<dyn KnowledgeBackend>,
        collection_prefix: impl Into<String>,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            backend,
            collection_prefix: collection_prefix.into(),
            timeout,
            retry,
        }
    }

    pub fn from_config(backend: Arc<dyn KnowledgeBackend>, config: &RagConfig) -> Self {
        Self::new(
            backend,
            config.collection_prefix.clone(),
            config.timeout(),
            RetryPolicy::new(config.max_retries, config.initial_backoff()),
        )
    }

    pub fn collection_for(&self, tenant: &TenantId) -> String {
        tenant.collection_name(&self.collection_prefix)
    }

    async fn search(&self, collection: &str, query: &str, limit: usize) -> Result<Outcome, RagError> {
        let backend = &self.backend;
        self.retry
            .run(
                "Knowledge retrieval",
                move || async move {
                    if !backend.collection_exists(collection).await? {
                        return Ok(Outcome::MissingCollection);
                    }
                    backend.search(collection, query, limit).await.map(Outcome::Hits)
                },
                RagError::is_transient,
            )
            .await
    }
}

#[async_trait]
impl ContextRetriever for TenantKnowledgeRetriever {
    async fn retrieve_context(&self, tenant: &TenantId, query: &str, limit: usize) -> String {
        let query = query.trim();
        if query.is_empty() {
            return String::new();
        }
        let limit = limit.max(1);
        let collection = self.collection_for(tenant);

        let result = match tokio::time::timeout(self.timeout, self.search(&collection, query, limit)).await {
            Ok(result) => result,
            Err(_) => Err(RagError::Timeout(self.timeout.as_millis() as u64)),
        };

        let (outcome, context) = match result {
            Ok(Outcome::MissingCollection) => {
                tracing::warn!(
                    tenant = %tenant,
                    collection = %collection,
                    "Knowledge collection does not exist"
                );
                ("missing_collection", String::new())
            }
            Ok(Outcome::Hits(hits)) if hits.is_empty() => ("empty", String::new()),
            Ok(Outcome::Hits(hits)) => {
                tracing::debug!(tenant = %tenant, hits = hits.len(), "Retrieved knowledge context");
                ("hit", format_hits(&hits))
            }
            Err(e) => {
                tracing::error!(tenant = %tenant, collection = %collection, error = %e, "RAG retrieval error");
                ("error", String::new())
            }
        };

        metrics::counter!("call_agent_retrieval_total", "outcome" => outcome).increment(1);
        context
    }
}
