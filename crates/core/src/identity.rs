//! Tenant and caller identity
//!
//! Rooms are named by the telephony bridge as `<Prefix>-<caller>`, e.g.
//! `Call-5551234567`. [`CallerIdentity::parse`] is the single place that
//! recovers the caller from a room name. It never fails: anything that does
//! not carry a usable caller token resolves to [`CallerIdentity::Anonymous`].

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Maximum tenant identifier length
const MAX_TENANT_LEN: usize = 64;

/// Room name delimiter separating the prefix from the caller token
const ROOM_DELIMITER: char = '-';

/// Rejected tenant identifier
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantIdError {
    #[error("tenant id is empty")]
    Empty,

    #[error("tenant id exceeds {MAX_TENANT_LEN} characters")]
    TooLong,

    #[error("tenant id contains invalid character {0:?}")]
    InvalidChar(char),
}

/// Validated tenant identifier
///
/// Only `[A-Za-z0-9_-]` is accepted so the id can be embedded in collection
/// names and directory paths without escaping.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TenantId(String);

impl TenantId {
    /// Parse and validate a tenant identifier
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, TenantIdError> {
        let raw = raw.as_ref().trim();
        if raw.is_empty() {
            return Err(TenantIdError::Empty);
        }
        if raw.len() > MAX_TENANT_LEN {
            return Err(TenantIdError::TooLong);
        }
        if let Some(c) = raw
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '_' || *c == '-'))
        {
            return Err(TenantIdError::InvalidChar(c));
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Knowledge collection name for this tenant
    pub fn collection_name(&self, prefix: &str) -> String {
        format!("{}{}", prefix, self.0)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TenantId {
    type Error = TenantIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<TenantId> for String {
    fn from(id: TenantId) -> Self {
        id.0
    }
}

/// Caller identity recovered from a room name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CallerIdentity {
    /// Caller phone number as it appears in the room name
    Phone(String),
    /// No usable caller token
    Anonymous,
}

impl CallerIdentity {
    /// Recover the caller from a room name
    ///
    /// The token is the text between the first delimiter and the next one
    /// (or the end of the name), trimmed. A missing delimiter or an empty
    /// token yields `Anonymous`.
    pub fn parse(room_name: &str) -> Self {
        let Some((_, rest)) = room_name.split_once(ROOM_DELIMITER) else {
            tracing::debug!(room = %room_name, "Room name has no caller segment");
            return Self::Anonymous;
        };

        let token = rest.split(ROOM_DELIMITER).next().unwrap_or_default().trim();
        if token.is_empty() {
            tracing::debug!(room = %room_name, "Room name has an empty caller segment");
            return Self::Anonymous;
        }

        Self::Phone(token.to_string())
    }

    /// Phone number, if known
    pub fn phone(&self) -> Option<&str> {
        match self {
            Self::Phone(p) => Some(p),
            Self::Anonymous => None,
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Self::Anonymous)
    }
}

impl fmt::Display for CallerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Phone(p) => f.write_str(p),
            Self::Anonymous => f.write_str("anonymous"),
        }
    }
}
