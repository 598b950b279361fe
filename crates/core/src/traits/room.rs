//! Room / transport boundary

use async_trait::async_trait;

use crate::TransportError;

/// Speech output and room management for one call
#[async_trait]
pub trait RoomControl: Send + Sync {
    /// Speak `text` to the caller, resolving when playout is done
    async fn say(&self, text: &str, allow_interruptions: bool) -> Result<(), TransportError>;

    /// Wait until any speech in flight has finished playing
    async fn wait_for_playout(&self) -> Result<(), TransportError>;

    /// Tear the room down, disconnecting every participant
    async fn delete_room(&self, room_name: &str) -> Result<(), TransportError>;

    /// Hand a SIP participant over to another number (`tel:...`)
    async fn transfer_participant(
        &self,
        room_name: &str,
        participant_identity: &str,
        transfer_to: &str,
    ) -> Result<(), TransportError>;
}
