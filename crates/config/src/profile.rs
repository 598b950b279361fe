//! Agent profiles
//!
//! A profile selects the instructions, the greeting and the tool set an
//! agent runs with. The tool sets themselves are assembled by the tools crate.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentProfile {
    /// Front desk: calendar, contact details, knowledge base
    #[default]
    Receptionist,
    /// Billing department: invoices, reminders, payments
    Billing,
}

impl AgentProfile {
    pub fn all() -> &'static [AgentProfile] {
        &[AgentProfile::Receptionist, AgentProfile::Billing]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Receptionist => "receptionist",
            Self::Billing => "billing",
        }
    }
}

impl fmt::Display for AgentProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AgentProfile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "receptionist" | "calendar" => Ok(Self::Receptionist),
            "billing" | "invoice" | "invoice_reminder" => Ok(Self::Billing),
            other => Err(ConfigError::invalid(
                "agent",
                format!("Unknown agent profile '{}'", other),
            )),
        }
    }
}
