//! Application State
//!
//! The process-lifetime service object. Everything a call needs is built
//! here once and injected into each session.

use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

use call_agent_agent::{AgentServices, TracingUsageSink};
use call_agent_config::Settings;
use call_agent_core::{ContextRetriever, UsageSink};
use call_agent_rag::{
    Embedder, InMemoryKnowledgeBackend, KnowledgeBackend, OllamaEmbedder, QdrantBackend,
    TenantKnowledgeRetriever,
};

use crate::calls::CallRegistry;
use crate::room_service::{LiveKitRoomService, RoomService};
use crate::ServerError;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub services: Arc<AgentServices>,
    pub room_service: Arc<dyn RoomService>,
    pub calls: Arc<CallRegistry>,
    /// Present when the Prometheus recorder is installed
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(
        settings: Settings,
        services: AgentServices,
        room_service: Arc<dyn RoomService>,
        metrics: Option<PrometheusHandle>,
    ) -> Self {
        let calls = Arc::new(CallRegistry::new(settings.server.max_concurrent_calls));
        Self {
            settings: Arc::new(settings),
            services: Arc::new(services),
            room_service,
            calls,
            metrics,
        }
    }

    /// Build every shared service from settings
    pub fn init(settings: Settings, metrics: Option<PrometheusHandle>) -> Result<Self, ServerError> {
        let persistence = call_agent_persistence::init(&settings);
        let retriever = init_retriever(&settings)?;
        let usage_sink: Arc<dyn UsageSink> = Arc::new(TracingUsageSink);

        let services = AgentServices::new(&settings, &persistence, retriever, usage_sink)
            .map_err(|e| ServerError::Internal(e.to_string()))?;
        let room_service: Arc<dyn RoomService> =
            Arc::new(LiveKitRoomService::new(&settings.room_service)?);

        tracing::info!(
            rag_enabled = settings.rag.enabled,
            data_dir = %settings.directory.data_dir,
            room_service = %settings.room_service.url,
            "Initialized application state"
        );

        Ok(Self::new(settings, services, room_service, metrics))
    }
}

/// Qdrant-backed retriever, or one that knows nothing when RAG is disabled
fn init_retriever(settings: &Settings) -> Result<Arc<dyn ContextRetriever>, ServerError> {
    let backend: Arc<dyn KnowledgeBackend> = if settings.rag.enabled {
        let embedder = OllamaEmbedder::from_config(&settings.rag)
            .map_err(|e| ServerError::Internal(format!("embedder: {}", e)))?;
        tracing::debug!(model = %settings.rag.embedding_model, dim = embedder.dim(), "Query embedder ready");
        let backend = QdrantBackend::from_config(&settings.rag, Arc::new(embedder))
            .map_err(|e| ServerError::Internal(format!("vector store: {}", e)))?;
        tracing::info!(
            endpoint = %settings.rag.qdrant_endpoint,
            prefix = %settings.rag.collection_prefix,
            "Knowledge retrieval enabled"
        );
        Arc::new(backend)
    } else {
        tracing::info!("Knowledge retrieval disabled");
        Arc::new(InMemoryKnowledgeBackend::new())
    };

    Ok(Arc::new(TenantKnowledgeRetriever::from_config(
        backend,
        &settings.rag,
    )))
}
