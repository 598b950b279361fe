//! Usage telemetry boundary

use crate::UsageSummary;

/// Receives the usage summary of a closed call
pub trait UsageSink: Send + Sync {
    fn record(&self, room_name: &str, summary: &UsageSummary);
}
