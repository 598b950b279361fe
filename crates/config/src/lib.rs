//! Configuration management for the call agent
//!
//! Supports loading configuration from:
//! - TOML/YAML/JSON files (`config/default.*`, `config/{env}.*`)
//! - Environment variables (`CALL_AGENT__` prefix, `__` separator)
//!
//! Also owns the agent profiles and the instruction text rendered for them.

pub mod profile;
pub mod prompts;
pub mod settings;

pub use profile::AgentProfile;
pub use prompts::PromptRenderer;
pub use settings::{
    load_settings, load_settings_from, BusinessConfig, CallConfig, DirectoryConfig,
    NotificationConfig, ObservabilityConfig, RagConfig, RoomServiceConfig, RuntimeEnvironment,
    ServerConfig, Settings,
};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl From<config::ConfigError> for ConfigError {
    fn from(err: config::ConfigError) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

impl From<ConfigError> for call_agent_core::Error {
    fn from(err: ConfigError) -> Self {
        call_agent_core::Error::Config(err.to_string())
    }
}
