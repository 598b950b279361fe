//! Tenant knowledge retrieval
//!
//! Features:
//! - One vector collection per tenant (`{prefix}{tenant}`)
//! - Dense search via Qdrant with query embeddings from Ollama
//! - In-memory backend for tests and deployments without a knowledge base
//! - Bounded retry and timeout, degrading to empty context

pub mod embeddings;
pub mod retriever;
pub mod vector_store;

pub use embeddings::{Embedder, OllamaEmbedder, OllamaEmbeddingConfig};
pub use retriever::{format_hits, TenantKnowledgeRetriever};
pub use vector_store::{
    InMemoryKnowledgeBackend, KnowledgeBackend, KnowledgeDocument, KnowledgeHit, QdrantBackend,
};

use thiserror::Error;

/// RAG errors
#[derive(Error, Debug)]
pub enum RagError {
    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Search error: {0}")]
    Search(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Retrieval timed out after {0}ms")]
    Timeout(u64),
}

impl RagError {
    /// Worth another attempt
    pub fn is_transient(&self) -> bool {
        !matches!(self, RagError::NotFound(_))
    }
}

impl From<RagError> for call_agent_core::Error {
    fn from(err: RagError) -> Self {
        call_agent_core::Error::Rag(err.to_string())
    }
}
