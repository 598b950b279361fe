//! Process-lifetime services shared by every call
//!
//! Built once at startup and injected into each controller. Sessions only
//! read from here; per-call state lives in the controller.

use std::collections::HashMap;
use std::sync::Arc;

use call_agent_config::{AgentProfile, CallConfig, PromptRenderer, Settings};
use call_agent_core::{ContextRetriever, TenantId, UsageSink};
use call_agent_persistence::{PersistenceLayer, UserDirectory};
use call_agent_tools::{create_registry, ToolDeps, ToolExecutor};

use crate::AgentError;

pub struct AgentServices {
    pub renderer: PromptRenderer,
    pub call: CallConfig,
    pub default_tenant: TenantId,
    pub default_profile: AgentProfile,
    /// Results injected per user turn
    pub knowledge_limit: usize,
    pub directory: Arc<dyn UserDirectory>,
    pub retriever: Arc<dyn ContextRetriever>,
    pub usage_sink: Arc<dyn UsageSink>,
    executors: HashMap<AgentProfile, Arc<dyn ToolExecutor>>,
}

impl AgentServices {
    /// Build the registry of every profile; fails fast on a bad registration
    pub fn new(
        settings: &Settings,
        persistence: &PersistenceLayer,
        retriever: Arc<dyn ContextRetriever>,
        usage_sink: Arc<dyn UsageSink>,
    ) -> Result<Self, AgentError> {
        let default_tenant = TenantId::parse(&settings.business.default_tenant).map_err(|e| {
            AgentError::Initialization(format!("default tenant: {}", e))
        })?;

        let deps = ToolDeps::new(settings, persistence, retriever.clone());
        let mut executors: HashMap<AgentProfile, Arc<dyn ToolExecutor>> = HashMap::new();
        for profile in AgentProfile::all() {
            executors.insert(*profile, Arc::new(create_registry(*profile, &deps)?));
        }

        Ok(Self {
            renderer: PromptRenderer::new(settings.business.clone()),
            call: settings.call.clone(),
            default_tenant,
            default_profile: settings.business.default_profile,
            knowledge_limit: settings.rag.default_limit,
            directory: persistence.directory.clone(),
            retriever,
            usage_sink,
            executors,
        })
    }

    /// Replace the executor of one profile
    pub fn with_executor(mut self, profile: AgentProfile, executor: Arc<dyn ToolExecutor>) -> Self {
        self.executors.insert(profile, executor);
        self
    }

    pub fn executor(&self, profile: AgentProfile) -> Option<Arc<dyn ToolExecutor>> {
        self.executors.get(&profile).cloned()
    }
}
