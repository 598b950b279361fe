//! Per-call context handed to tools

use std::sync::Arc;

use crate::traits::{ConversationModel, RoomControl};
use crate::{CallerIdentity, TenantId, UserRecord};

/// Everything a tool may know about the call it runs in
///
/// Built once when the session becomes active. Identity fields are fixed for
/// the life of the call.
#[derive(Clone)]
pub struct CallContext {
    pub room_name: String,
    pub tenant: TenantId,
    pub caller: CallerIdentity,
    /// SIP participant identity as reported by the gateway
    pub participant_identity: Option<String>,
    /// Directory record resolved at session start
    pub user: UserRecord,
    /// Display name from job metadata, if any
    pub user_name: Option<String>,
    pub model: Arc<dyn ConversationModel>,
    pub room: Arc<dyn RoomControl>,
}

impl CallContext {
    pub fn new(
        room_name: impl Into<String>,
        tenant: TenantId,
        model: Arc<dyn ConversationModel>,
        room: Arc<dyn RoomControl>,
    ) -> Self {
        let room_name = room_name.into();
        let caller = CallerIdentity::parse(&room_name);
        Self {
            room_name,
            tenant,
            caller,
            participant_identity: None,
            user: UserRecord::anonymous(),
            user_name: None,
            model,
            room,
        }
    }

    pub fn with_user(mut self, user: UserRecord) -> Self {
        self.user = user;
        self
    }

    pub fn with_participant_identity(mut self, identity: Option<String>) -> Self {
        self.participant_identity = identity;
        self
    }

    pub fn with_user_name(mut self, name: Option<String>) -> Self {
        self.user_name = name;
        self
    }
}

impl std::fmt::Debug for CallContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CallContext")
            .field("room_name", &self.room_name)
            .field("tenant", &self.tenant)
            .field("caller", &self.caller)
            .field("participant_identity", &self.participant_identity)
            .finish_non_exhaustive()
    }
}
