//! LiveKit room service client
//!
//! Room teardown and SIP transfer go straight to the LiveKit server over its
//! Twirp HTTP API, authenticated with a pre-minted bearer token.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use call_agent_config::RoomServiceConfig;
use call_agent_core::TransportError;

use crate::ServerError;

/// Room operations that do not go through the gateway
#[async_trait]
pub trait RoomService: Send + Sync {
    async fn delete_room(&self, room_name: &str) -> Result<(), TransportError>;

    async fn transfer_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
        transfer_to: &str,
    ) -> Result<(), TransportError>;
}

pub struct LiveKitRoomService {
    client: reqwest::Client,
    base_url: String,
    api_token: Option<String>,
    timeout: Duration,
}

impl LiveKitRoomService {
    pub fn new(config: &RoomServiceConfig) -> Result<Self, ServerError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| ServerError::Internal(format!("room service client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
            timeout: config.request_timeout(),
        })
    }

    fn endpoint(&self, service: &str, method: &str) -> String {
        format!("{}/twirp/{}/{}", self.base_url, service, method)
    }

    async fn call(&self, service: &str, method: &str, body: Value) -> Result<(), TransportError> {
        let Some(token) = self.api_token.as_deref() else {
            return Err(TransportError::Rejected(
                "room service api token not configured".to_string(),
            ));
        };

        let response = self
            .client
            .post(self.endpoint(service, method))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    TransportError::Timeout(self.timeout.as_millis() as u64)
                } else {
                    TransportError::Io(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(TransportError::Rejected(format!(
            "{} returned {}: {}",
            method, status, detail
        )))
    }
}

#[async_trait]
impl RoomService for LiveKitRoomService {
    async fn delete_room(&self, room_name: &str) -> Result<(), TransportError> {
        self.call("livekit.RoomService", "DeleteRoom", json!({ "room": room_name }))
            .await
    }

    async fn transfer_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
        transfer_to: &str,
    ) -> Result<(), TransportError> {
        self.call(
            "livekit.SIP",
            "TransferSIPParticipant",
            json!({
                "room_name": room_name,
                "participant_identity": participant_identity,
                "transfer_to": transfer_to,
            }),
        )
        .await
    }
}
