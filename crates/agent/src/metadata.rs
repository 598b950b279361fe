//! Session start parameters
//!
//! The gateway forwards the dispatch metadata of the call as a JSON object or
//! as a JSON-encoded string. Anything unreadable degrades to empty metadata.

use serde::Deserialize;
use serde_json::Value;

use call_agent_config::AgentProfile;
use call_agent_core::TenantId;

/// Recognised keys of the dispatch metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JobMetadata {
    pub tenant_id: Option<String>,
    pub agent: Option<String>,
    pub user_name: Option<String>,
    pub participant_identity: Option<String>,
}

impl JobMetadata {
    pub fn from_value(raw: Option<&Value>) -> Self {
        let parsed = match raw {
            None | Some(Value::Null) => return Self::default(),
            Some(Value::String(s)) if s.trim().is_empty() => return Self::default(),
            Some(Value::String(s)) => serde_json::from_str::<Self>(s),
            Some(other) => serde_json::from_value::<Self>(other.clone()),
        };

        parsed.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Unparseable job metadata, using defaults");
            Self::default()
        })
    }

    /// Tenant named by the metadata, or `default` when absent or invalid
    pub fn resolve_tenant(&self, default: &TenantId) -> TenantId {
        match self.tenant_id.as_deref().map(TenantId::parse) {
            Some(Ok(tenant)) => tenant,
            Some(Err(e)) => {
                tracing::warn!(error = %e, default = %default, "Invalid tenant id in metadata, using default tenant");
                default.clone()
            }
            None => {
                tracing::warn!(default = %default, "No tenant id in metadata, using default tenant");
                default.clone()
            }
        }
    }

    pub fn resolve_profile(&self, default: AgentProfile) -> AgentProfile {
        match self.agent.as_deref().map(str::parse::<AgentProfile>) {
            Some(Ok(profile)) => profile,
            Some(Err(e)) => {
                tracing::warn!(error = %e, default = %default, "Unknown agent profile in metadata");
                default
            }
            None => default,
        }
    }
}

/// Everything known about a call when its session starts
#[derive(Debug, Clone, Default)]
pub struct SessionStart {
    pub room_name: String,
    pub metadata: JobMetadata,
    /// SIP participant identity reported by the gateway
    pub participant_identity: Option<String>,
}

impl SessionStart {
    pub fn new(room_name: impl Into<String>) -> Self {
        Self {
            room_name: room_name.into(),
            ..Default::default()
        }
    }

    pub fn with_metadata(mut self, metadata: JobMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_participant_identity(mut self, identity: Option<String>) -> Self {
        self.participant_identity = identity;
        self
    }

    /// Gateway-reported identity wins over the one in the metadata
    pub fn participant_identity(&self) -> Option<String> {
        self.participant_identity
            .clone()
            .or_else(|| self.metadata.participant_identity.clone())
            .filter(|id| !id.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn default_tenant() -> TenantId {
        TenantId::parse("default").unwrap()
    }

    #[test]
    fn test_metadata_from_string_or_object() {
        let raw = json!(r#"{"tenant_id": "acme", "agent": "billing", "user_name": "Ada"}"#);
        let meta = JobMetadata::from_value(Some(&raw));
        assert_eq!(meta.tenant_id.as_deref(), Some("acme"));
        assert_eq!(meta.resolve_profile(AgentProfile::Receptionist), AgentProfile::Billing);

        let raw = json!({"tenant_id": "acme", "participant_identity": "sip_1"});
        let meta = JobMetadata::from_value(Some(&raw));
        assert_eq!(meta.participant_identity.as_deref(), Some("sip_1"));
    }

    #[test]
    fn test_unparseable_metadata_degrades() {
        for raw in [json!("not json"), json!(42), json!([1, 2]), json!("")] {
            assert_eq!(JobMetadata::from_value(Some(&raw)), JobMetadata::default());
        }
        assert_eq!(JobMetadata::from_value(None), JobMetadata::default());
    }

    #[test]
    fn test_tenant_fallback() {
        let meta = JobMetadata {
            tenant_id: Some("../etc".into()),
            ..Default::default()
        };
        assert_eq!(meta.resolve_tenant(&default_tenant()).as_str(), "default");
        assert_eq!(
            JobMetadata::default().resolve_tenant(&default_tenant()).as_str(),
            "default"
        );

        let meta = JobMetadata {
            tenant_id: Some("acme".into()),
            agent: Some("astrologer".into()),
            ..Default::default()
        };
        assert_eq!(meta.resolve_tenant(&default_tenant()).as_str(), "acme");
        assert_eq!(meta.resolve_profile(AgentProfile::Billing), AgentProfile::Billing);
    }

    #[test]
    fn test_participant_identity_precedence() {
        let start = SessionStart::new("Call-5551234567").with_metadata(JobMetadata {
            participant_identity: Some("from_metadata".into()),
            ..Default::default()
        });
        assert_eq!(start.participant_identity().as_deref(), Some("from_metadata"));

        let start = start.with_participant_identity(Some("from_gateway".into()));
        assert_eq!(start.participant_identity().as_deref(), Some("from_gateway"));
    }
}
