//! Main settings module

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::{AgentProfile, ConfigError};

/// Runtime environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Development mode - relaxed validation, warnings only
    #[default]
    Development,
    /// Staging mode - stricter validation
    Staging,
    /// Production mode - all validations enforced
    Production,
}

impl RuntimeEnvironment {
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Check if strict validation should be applied
    pub fn is_strict(&self) -> bool {
        matches!(self, Self::Production | Self::Staging)
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    #[serde(default)]
    pub environment: RuntimeEnvironment,

    /// HTTP / WebSocket server
    #[serde(default)]
    pub server: ServerConfig,

    /// The business the agent answers for
    #[serde(default)]
    pub business: BusinessConfig,

    /// Call handling
    #[serde(default)]
    pub call: CallConfig,

    /// Tenant directories and ledgers on disk
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// Knowledge retrieval
    #[serde(default)]
    pub rag: RagConfig,

    /// LiveKit room service
    #[serde(default)]
    pub room_service: RoomServiceConfig,

    /// Outbound email
    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_server()?;
        self.validate_business()?;
        self.validate_call()?;
        self.validate_rag()?;
        self.validate_room_service()?;
        Ok(())
    }

    fn validate_server(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::invalid("server.port", "Port cannot be 0"));
        }
        if self.server.max_concurrent_calls == 0 {
            return Err(ConfigError::invalid(
                "server.max_concurrent_calls",
                "At least one concurrent call must be allowed",
            ));
        }
        Ok(())
    }

    fn validate_business(&self) -> Result<(), ConfigError> {
        let business = &self.business;

        if business.name.trim().is_empty() {
            return Err(ConfigError::invalid("business.name", "Cannot be empty"));
        }

        if business.timezone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::invalid(
                "business.timezone",
                format!("Unknown IANA timezone '{}'", business.timezone),
            ));
        }

        if business.appointment_slot_minutes == 0 {
            return Err(ConfigError::invalid(
                "business.appointment_slot_minutes",
                "Must be at least 1",
            ));
        }

        if call_agent_core::TenantId::parse(&business.default_tenant).is_err() {
            return Err(ConfigError::invalid(
                "business.default_tenant",
                format!("'{}' is not a valid tenant id", business.default_tenant),
            ));
        }

        Ok(())
    }

    fn validate_call(&self) -> Result<(), ConfigError> {
        let call = &self.call;

        if call.transfer_to.trim().is_empty() {
            return Err(ConfigError::invalid("call.transfer_to", "Cannot be empty"));
        }

        if call.teardown_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "call.teardown_timeout_ms",
                "Timeout must be at least 1ms",
            ));
        }

        if call.tool_timeout_secs == 0 {
            return Err(ConfigError::invalid(
                "call.tool_timeout_secs",
                "Timeout must be at least 1 second",
            ));
        }

        if call.command_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "call.command_timeout_ms",
                "Timeout must be at least 1ms",
            ));
        }

        if self.directory.load_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "directory.load_timeout_ms",
                "Timeout must be at least 1ms",
            ));
        }

        Ok(())
    }

    fn validate_rag(&self) -> Result<(), ConfigError> {
        let rag = &self.rag;

        if rag.default_limit == 0 {
            return Err(ConfigError::invalid("rag.default_limit", "Must be at least 1"));
        }

        if rag.timeout_ms == 0 {
            return Err(ConfigError::invalid("rag.timeout_ms", "Timeout must be at least 1ms"));
        }

        if rag.vector_dim == 0 {
            return Err(ConfigError::invalid("rag.vector_dim", "Must be at least 1"));
        }

        if rag.enabled && rag.qdrant_endpoint.trim().is_empty() {
            return Err(ConfigError::invalid(
                "rag.qdrant_endpoint",
                "Must be set when retrieval is enabled",
            ));
        }

        Ok(())
    }

    fn validate_room_service(&self) -> Result<(), ConfigError> {
        let room = &self.room_service;

        if room.request_timeout_ms == 0 {
            return Err(ConfigError::invalid(
                "room_service.request_timeout_ms",
                "Timeout must be at least 1ms",
            ));
        }

        if room.api_token.is_none() {
            if self.environment.is_strict() {
                return Err(ConfigError::invalid(
                    "room_service.api_token",
                    "API token must be set in staging and production",
                ));
            }
            tracing::warn!("room_service.api_token not configured, room teardown and transfer will be rejected");
        }

        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// CORS allowed origins (empty allows any)
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Gateway connections accepted at once
    #[serde(default = "default_max_concurrent_calls")]
    pub max_concurrent_calls: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_true() -> bool {
    true
}
fn default_max_concurrent_calls() -> usize {
    100
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            max_concurrent_calls: default_max_concurrent_calls(),
        }
    }
}

/// The business the agent represents
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BusinessConfig {
    #[serde(default = "default_business_name")]
    pub name: String,

    /// IANA timezone used for dates and the calendar
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// How the timezone is described to the model
    #[serde(default = "default_timezone_label")]
    pub timezone_label: String,

    #[serde(default = "default_slot_minutes")]
    pub appointment_slot_minutes: u32,

    /// Tenant used when job metadata names none or an invalid one
    #[serde(default = "default_tenant")]
    pub default_tenant: String,

    /// Profile used when job metadata names none
    #[serde(default)]
    pub default_profile: AgentProfile,
}

fn default_business_name() -> String {
    "Jacks' Dental Practice".to_string()
}
fn default_timezone() -> String {
    "Europe/Amsterdam".to_string()
}
fn default_timezone_label() -> String {
    "Europe/Amsterdam or Central European Time".to_string()
}
fn default_slot_minutes() -> u32 {
    30
}
fn default_tenant() -> String {
    "default".to_string()
}

impl BusinessConfig {
    /// Parsed timezone, UTC if the name is unknown
    pub fn tz(&self) -> chrono_tz::Tz {
        self.timezone.parse().unwrap_or(chrono_tz::UTC)
    }
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: default_business_name(),
            timezone: default_timezone(),
            timezone_label: default_timezone_label(),
            appointment_slot_minutes: default_slot_minutes(),
            default_tenant: default_tenant(),
            default_profile: AgentProfile::default(),
        }
    }
}

/// Call handling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallConfig {
    /// Spoken before the room is torn down
    #[serde(default = "default_closing_line")]
    pub closing_line: String,

    /// Number calls are transferred to (E.164)
    #[serde(default = "default_transfer_to")]
    pub transfer_to: String,

    /// SIP participant to transfer when the gateway does not report one
    #[serde(default)]
    pub transfer_participant_identity: Option<String>,

    /// Instruction given to the model before a transfer
    #[serde(default = "default_transfer_announcement")]
    pub transfer_announcement: String,

    /// Bound on room teardown
    #[serde(default = "default_teardown_timeout_ms")]
    pub teardown_timeout_ms: u64,

    /// Default bound on a single tool call
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,

    /// Bound on gateway command acknowledgements
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,

    /// Inject knowledge context after every user turn
    #[serde(default = "default_true")]
    pub auto_retrieve_context: bool,
}

fn default_closing_line() -> String {
    "Thank you for calling! Goodbye!".to_string()
}
fn default_transfer_to() -> String {
    "+15105550123".to_string()
}
fn default_transfer_announcement() -> String {
    "Inform the user that you're transferring them to a different agent.".to_string()
}
fn default_teardown_timeout_ms() -> u64 {
    5000
}
fn default_tool_timeout_secs() -> u64 {
    30
}
fn default_command_timeout_ms() -> u64 {
    30_000
}

impl CallConfig {
    pub fn teardown_timeout(&self) -> Duration {
        Duration::from_millis(self.teardown_timeout_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// SIP URI for the transfer target
    pub fn transfer_uri(&self) -> String {
        let target = self.transfer_to.trim();
        if target.starts_with("tel:") || target.starts_with("sip:") {
            target.to_string()
        } else {
            format!("tel:{}", target)
        }
    }
}

impl Default for CallConfig {
    fn default() -> Self {
        Self {
            closing_line: default_closing_line(),
            transfer_to: default_transfer_to(),
            transfer_participant_identity: None,
            transfer_announcement: default_transfer_announcement(),
            teardown_timeout_ms: default_teardown_timeout_ms(),
            tool_timeout_secs: default_tool_timeout_secs(),
            command_timeout_ms: default_command_timeout_ms(),
            auto_retrieve_context: true,
        }
    }
}

/// Tenant data on disk: `{data_dir}/{tenant}/users.csv` and `invoices.json`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,

    #[serde(default = "default_users_file")]
    pub users_file: String,

    #[serde(default = "default_invoices_file")]
    pub invoices_file: String,

    /// Bound on loading one tenant's snapshot
    #[serde(default = "default_load_timeout_ms")]
    pub load_timeout_ms: u64,
}

fn default_data_dir() -> String {
    "data".to_string()
}
fn default_users_file() -> String {
    "users.csv".to_string()
}
fn default_invoices_file() -> String {
    "invoices.json".to_string()
}
fn default_load_timeout_ms() -> u64 {
    2000
}

impl DirectoryConfig {
    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            users_file: default_users_file(),
            invoices_file: default_invoices_file(),
            load_timeout_ms: default_load_timeout_ms(),
        }
    }
}

/// Knowledge retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RagConfig {
    /// Disabled retrieval always yields empty context
    #[serde(default)]
    pub enabled: bool,

    #[serde(default = "default_qdrant_endpoint")]
    pub qdrant_endpoint: String,

    #[serde(default)]
    pub qdrant_api_key: Option<String>,

    /// Collection name is `{collection_prefix}{tenant}`
    #[serde(default = "default_collection_prefix")]
    pub collection_prefix: String,

    #[serde(default = "default_limit")]
    pub default_limit: usize,

    /// Bound on one retrieval, retries included
    #[serde(default = "default_rag_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Ollama endpoint for query embeddings
    #[serde(default = "default_embedding_endpoint")]
    pub embedding_endpoint: String,

    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    #[serde(default = "default_vector_dim")]
    pub vector_dim: usize,
}

fn default_qdrant_endpoint() -> String {
    "http://localhost:6334".to_string()
}
fn default_collection_prefix() -> String {
    "Documents_".to_string()
}
fn default_limit() -> usize {
    3
}
fn default_rag_timeout_ms() -> u64 {
    3000
}
fn default_max_retries() -> u32 {
    2
}
fn default_initial_backoff_ms() -> u64 {
    100
}
fn default_embedding_endpoint() -> String {
    "http://localhost:11434".to_string()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".to_string()
}
fn default_vector_dim() -> usize {
    768
}

impl RagConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            qdrant_endpoint: default_qdrant_endpoint(),
            qdrant_api_key: None,
            collection_prefix: default_collection_prefix(),
            default_limit: default_limit(),
            timeout_ms: default_rag_timeout_ms(),
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            embedding_endpoint: default_embedding_endpoint(),
            embedding_model: default_embedding_model(),
            vector_dim: default_vector_dim(),
        }
    }
}

/// LiveKit room service (HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoomServiceConfig {
    #[serde(default = "default_room_service_url")]
    pub url: String,

    /// Pre-minted bearer token with room admin and SIP call grants
    #[serde(default)]
    pub api_token: Option<String>,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_room_service_url() -> String {
    "http://localhost:7880".to_string()
}
fn default_request_timeout_ms() -> u64 {
    5000
}

impl RoomServiceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for RoomServiceConfig {
    fn default() -> Self {
        Self {
            url: default_room_service_url(),
            api_token: None,
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Outbound notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// From address on outbound email
    #[serde(default = "default_sender")]
    pub sender: String,
}

fn default_sender() -> String {
    "no-reply@example.com".to_string()
}

impl NotificationConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_backoff_ms: default_initial_backoff_ms(),
            sender: default_sender(),
        }
    }
}

/// Observability configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub log_json: bool,

    /// Enable the Prometheus endpoint
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_json: false,
            metrics_enabled: true,
        }
    }
}

/// Load settings from files and environment
///
/// Priority (highest to lowest):
/// 1. Environment variables (`CALL_AGENT__` prefix, e.g. `CALL_AGENT__SERVER__PORT`)
/// 2. config/{env}.* (if env specified)
/// 3. config/default.*
pub fn load_settings(env: Option<&str>) -> Result<Settings, ConfigError> {
    load_settings_from(Path::new("config"), env)
}

/// Load settings with the config files looked up in `dir`
pub fn load_settings_from(dir: &Path, env: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = Config::builder();

    builder = builder.add_source(
        File::with_name(&dir.join("default").to_string_lossy()).required(false),
    );

    if let Some(env_name) = env {
        builder = builder
            .add_source(File::with_name(&dir.join(env_name).to_string_lossy()).required(false));
    }

    builder = builder.add_source(
        Environment::with_prefix("CALL_AGENT")
            .separator("__")
            .try_parsing(true),
    );

    let config = builder.build()?;
    let settings: Settings = config.try_deserialize()?;

    settings.validate()?;

    Ok(settings)
}
