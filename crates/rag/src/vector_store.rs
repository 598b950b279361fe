//! Knowledge backends
//!
//! A backend answers two questions about a named collection: does it exist,
//! and which documents are nearest to a query. Collections are never shared
//! between tenants; the retriever picks the name.

use async_trait::async_trait;
use parking_lot::RwLock;
use qdrant_client::{
    qdrant::{value::Kind, SearchPointsBuilder},
    Qdrant,
};
use std::collections::HashMap;
use std::sync::Arc;

use call_agent_config::RagConfig;

use crate::{Embedder, RagError};

/// One search hit
#[derive(Debug, Clone, PartialEq)]
pub struct KnowledgeHit {
    pub title: String,
    pub filename: String,
    pub content: String,
    /// Normalized relevance (1 - distance), when the backend reports one
    pub relevance: Option<f32>,
}

/// Nearest-neighbor search over named collections
#[async_trait]
pub trait KnowledgeBackend: Send + Sync {
    async fn collection_exists(&self, collection: &str) -> Result<bool, RagError>;

    /// At most `limit` hits, best first
    async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, RagError>;
}

/// Qdrant-backed knowledge store
///
/// Points carry `title`, `filename` and `content` payload fields. Collections
/// use cosine distance, so the point score is already `1 - distance`.
pub struct QdrantBackend {
    client: Qdrant,
    embedder: Arc<dyn Embedder>,
}

impl QdrantBackend {
    pub fn new(
        endpoint: &str,
        api_key: Option<&str>,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, RagError> {
        let mut builder = Qdrant::from_url(endpoint);

        if let Some(api_key) = api_key {
            builder = builder.api_key(api_key.to_string());
            tracing::info!("Qdrant connection using API key authentication");
        }

        let client = builder
            .build()
            .map_err(|e| RagError::Connection(e.to_string()))?;

        Ok(Self { client, embedder })
    }

    pub fn from_config(config: &RagConfig, embedder: Arc<dyn Embedder>) -> Result<Self, RagError> {
        Self::new(
            &config.qdrant_endpoint,
            config.qdrant_api_key.as_deref(),
            embedder,
        )
    }
}

#[async_trait]
impl KnowledgeBackend for QdrantBackend {
    async fn collection_exists(&self, collection: &str) -> Result<bool, RagError> {
        self.client
            .collection_exists(collection)
            .await
            .map_err(|e| RagError::VectorStore(e.to_string()))
    }

    async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, RagError> {
        let vector = self.embedder.embed_query(query).await?;
        if vector.len() != self.embedder.dim() {
            return Err(RagError::Embedding(format!(
                "query vector has {} dimensions, expected {}",
                vector.len(),
                self.embedder.dim()
            )));
        }

        let results = self
            .client
            .search_points(
                SearchPointsBuilder::new(collection, vector, limit as u64).with_payload(true),
            )
            .await
            .map_err(|e| RagError::Search(e.to_string()))?;

        let hits = results
            .result
            .into_iter()
            .map(|point| {
                let mut fields: HashMap<String, String> = HashMap::new();
                for (k, v) in point.payload {
                    if let Some(Kind::StringValue(s)) = v.kind {
                        fields.insert(k, s);
                    }
                }

                let content = fields
                    .remove("content")
                    .or_else(|| fields.remove("text"))
                    .unwrap_or_default();

                KnowledgeHit {
                    title: fields.remove("title").unwrap_or_else(|| "N/A".to_string()),
                    filename: fields.remove("filename").unwrap_or_default(),
                    content,
                    relevance: Some(point.score),
                }
            })
            .collect();

        Ok(hits)
    }
}

/// Document held by the in-memory backend
#[derive(Debug, Clone)]
pub struct KnowledgeDocument {
    pub title: String,
    pub filename: String,
    pub content: String,
}

impl KnowledgeDocument {
    pub fn new(
        title: impl Into<String>,
        filename: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            filename: filename.into(),
            content: content.into(),
        }
    }
}

/// In-process backend ranking by query term overlap
///
/// Serves deployments with retrieval disabled (no collections, so every
/// query yields empty context) and tests.
#[derive(Default)]
pub struct InMemoryKnowledgeBackend {
    collections: RwLock<HashMap<String, Vec<KnowledgeDocument>>>,
}

impl InMemoryKnowledgeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty collection
    pub fn create_collection(&self, collection: &str) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default();
    }

    /// Add a document, creating the collection if needed
    pub fn insert(&self, collection: &str, document: KnowledgeDocument) {
        self.collections
            .write()
            .entry(collection.to_string())
            .or_default()
            .push(document);
    }

    fn terms(text: &str) -> Vec<String> {
        text.split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(str::to_lowercase)
            .collect()
    }

    fn score(query_terms: &[String], document: &KnowledgeDocument) -> f32 {
        if query_terms.is_empty() {
            return 0.0;
        }
        let doc_terms = Self::terms(&format!("{} {}", document.title, document.content));
        let matched = query_terms
            .iter()
            .filter(|t| doc_terms.contains(t))
            .count();
        matched as f32 / query_terms.len() as f32
    }
}

#[async_trait]
impl KnowledgeBackend for InMemoryKnowledgeBackend {
    async fn collection_exists(&self, collection: &str) -> Result<bool, RagError> {
        Ok(self.collections.read().contains_key(collection))
    }

    async fn search(
        &self,
        collection: &str,
        query: &str,
        limit: usize,
    ) -> Result<Vec<KnowledgeHit>, RagError> {
        let collections = self.collections.read();
        let documents = collections
            .get(collection)
            .ok_or_else(|| RagError::NotFound(collection.to_string()))?;

        let query_terms = Self::terms(query);
        let mut scored: Vec<(f32, &KnowledgeDocument)> = documents
            .iter()
            .map(|d| (Self::score(&query_terms, d), d))
            .filter(|(score, _)| *score > 0.0)
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(limit)
            .map(|(score, d)| KnowledgeHit {
                title: d.title.clone(),
                filename: d.filename.clone(),
                content: d.content.clone(),
                relevance: Some(score),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> InMemoryKnowledgeBackend {
        let backend = InMemoryKnowledgeBackend::new();
        backend.insert(
            "Documents_acme",
            KnowledgeDocument::new("Opening hours", "hours.txt", "We are open Monday to Friday"),
        );
        backend.insert(
            "Documents_acme",
            KnowledgeDocument::new("Parking", "parking.txt", "Free parking behind the building"),
        );
        backend
    }

    #[tokio::test]
    async fn test_collection_exists() {
        let backend = backend();
        assert!(backend.collection_exists("Documents_acme").await.unwrap());
        assert!(!backend.collection_exists("Documents_other").await.unwrap());

        backend.create_collection("Documents_other");
        assert!(backend.collection_exists("Documents_other").await.unwrap());
    }

    #[tokio::test]
    async fn test_search_ranks_and_limits() {
        let backend = backend();
        let hits = backend
            .search("Documents_acme", "when are you open on monday", 5)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].filename, "hours.txt");

        let hits = backend
            .search("Documents_acme", "parking open", 1)
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
    }

    struct FixedEmbedder {
        vector: Vec<f32>,
        dim: usize,
    }

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed_query(&self, _query: &str) -> Result<Vec<f32>, RagError> {
            Ok(self.vector.clone())
        }

        fn dim(&self) -> usize {
            self.dim
        }
    }

    #[tokio::test]
    async fn test_qdrant_rejects_wrong_dimension_before_searching() {
        let embedder = Arc::new(FixedEmbedder {
            vector: vec![0.1, 0.2, 0.3],
            dim: 768,
        });
        let backend = QdrantBackend::new("http://127.0.0.1:1", None, embedder).unwrap();

        let err = backend.search("Documents_acme", "parking", 3).await.unwrap_err();
        assert!(matches!(err, RagError::Embedding(ref msg) if msg.contains("expected 768")));
    }

    #[tokio::test]
    async fn test_search_unknown_collection() {
        let backend = backend();
        assert!(matches!(
            backend.search("Documents_nope", "parking", 3).await,
            Err(RagError::NotFound(_))
        ));
    }
}
