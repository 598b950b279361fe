//! Active call registry
//!
//! One entry per connected room. The entry is removed when its guard drops,
//! whichever way the connection ends.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use call_agent_agent::SessionState;

use crate::ServerError;

struct ActiveCall {
    started_at: DateTime<Utc>,
    state: watch::Receiver<SessionState>,
}

/// Snapshot served by `GET /calls`
#[derive(Debug, Clone, Serialize)]
pub struct CallInfo {
    pub room_name: String,
    pub state: SessionState,
    pub started_at: DateTime<Utc>,
}

pub struct CallRegistry {
    calls: RwLock<HashMap<String, ActiveCall>>,
    max_calls: usize,
}

impl CallRegistry {
    pub fn new(max_calls: usize) -> Self {
        Self {
            calls: RwLock::new(HashMap::new()),
            max_calls,
        }
    }

    /// Register a room; fails if it is already connected or the server is full
    pub fn register(
        self: &Arc<Self>,
        room_name: &str,
        state: watch::Receiver<SessionState>,
    ) -> Result<CallGuard, ServerError> {
        let mut calls = self.calls.write();
        if calls.contains_key(room_name) {
            return Err(ServerError::Conflict(format!(
                "room {} already has a session",
                room_name
            )));
        }
        if calls.len() >= self.max_calls {
            return Err(ServerError::Unavailable(format!(
                "maximum of {} concurrent calls reached",
                self.max_calls
            )));
        }

        calls.insert(
            room_name.to_string(),
            ActiveCall {
                started_at: Utc::now(),
                state,
            },
        );
        metrics::gauge!("call_agent_active_calls").set(calls.len() as f64);

        Ok(CallGuard {
            registry: Arc::clone(self),
            room_name: room_name.to_string(),
        })
    }

    pub fn contains(&self, room_name: &str) -> bool {
        self.calls.read().contains_key(room_name)
    }

    pub fn count(&self) -> usize {
        self.calls.read().len()
    }

    pub fn is_full(&self) -> bool {
        self.count() >= self.max_calls
    }

    pub fn list(&self) -> Vec<CallInfo> {
        let mut calls: Vec<CallInfo> = self
            .calls
            .read()
            .iter()
            .map(|(room_name, call)| CallInfo {
                room_name: room_name.clone(),
                state: *call.state.borrow(),
                started_at: call.started_at,
            })
            .collect();
        calls.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        calls
    }

    fn remove(&self, room_name: &str) {
        let mut calls = self.calls.write();
        calls.remove(room_name);
        metrics::gauge!("call_agent_active_calls").set(calls.len() as f64);
    }
}

/// Removes its room from the registry on drop
pub struct CallGuard {
    registry: Arc<CallRegistry>,
    room_name: String,
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.registry.remove(&self.room_name);
    }
}
