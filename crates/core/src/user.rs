//! Directory user record

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Name returned when the caller cannot be resolved
pub const ANONYMOUS_NAME: &str = "John Doe";

/// Email returned when the caller cannot be resolved
pub const ANONYMOUS_EMAIL: &str = "john.doe@example.com";

/// A caller as known to a tenant's directory
///
/// The record handed to a call is a snapshot. Updates made through the
/// directory are visible to later lookups, never to the copy already held
/// by a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Directory row id, absent for the anonymous record
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Phone number, the directory key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
    pub name: String,
    pub email: String,
    /// Confirmation pin for contact changes, never shown to the model
    #[serde(default, skip_serializing)]
    pub pin: Option<String>,
    /// Any further directory columns
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, String>,
}

impl UserRecord {
    /// The fixed record used whenever the caller is unknown
    pub fn anonymous() -> Self {
        Self {
            id: None,
            phone_number: None,
            name: ANONYMOUS_NAME.to_string(),
            email: ANONYMOUS_EMAIL.to_string(),
            pin: None,
            extra: BTreeMap::new(),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        self.id.is_none() && self.phone_number.is_none()
    }

    /// Tool-facing representation
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(id) = &self.id {
            map.insert("id".into(), json!(id));
        }
        map.insert("name".into(), json!(self.name));
        map.insert("email".into(), json!(self.email));
        if let Some(phone) = &self.phone_number {
            map.insert("phone_number".into(), json!(phone));
        }
        for (k, v) in &self.extra {
            map.entry(k.clone()).or_insert_with(|| json!(v));
        }
        Value::Object(map)
    }
}

impl Default for UserRecord {
    fn default() -> Self {
        Self::anonymous()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_record() {
        let user = UserRecord::anonymous();
        assert!(user.is_anonymous());
        assert_eq!(
            user.to_json(),
            json!({"name": "John Doe", "email": "john.doe@example.com"})
        );
    }

    #[test]
    fn test_extra_columns_do_not_shadow_fields() {
        let mut user = UserRecord {
            id: Some("7".into()),
            phone_number: Some("5551234567".into()),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            pin: Some("1234".into()),
            extra: BTreeMap::new(),
        };
        user.extra.insert("name".into(), "shadow".into());
        user.extra.insert("plan".into(), "gold".into());

        let value = user.to_json();
        assert_eq!(value["name"], "Ada");
        assert_eq!(value["plan"], "gold");
        assert!(value.get("pin").is_none());
        assert_eq!(value["phone_number"], "5551234567");
    }
}
