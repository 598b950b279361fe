//! Usage sink and session metrics

use call_agent_core::{UsageSink, UsageSummary};

/// Writes the usage summary of each call to the log
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingUsageSink;

impl UsageSink for TracingUsageSink {
    fn record(&self, room_name: &str, summary: &UsageSummary) {
        tracing::info!(
            room = room_name,
            duration_ms = summary.duration_ms,
            tool_calls = summary.total_tool_calls(),
            "Usage: {}",
            summary
        );
    }
}

pub(crate) fn record_session_started(profile: &'static str) {
    metrics::counter!("call_agent_sessions_total", "profile" => profile).increment(1);
}

pub(crate) fn record_session_closed(reason: &'static str) {
    metrics::counter!("call_agent_sessions_closed_total", "reason" => reason).increment(1);
}

/// Tool labels are bounded by the catalog; unknown names share one label
pub(crate) fn record_tool_call(tool: &str, known: bool, outcome: &'static str, latency_ms: f64) {
    let tool = if known { tool.to_string() } else { "unknown".to_string() };
    metrics::counter!("call_agent_tool_calls_total", "tool" => tool.clone(), "outcome" => outcome)
        .increment(1);
    metrics::histogram!("call_agent_tool_latency_ms", "tool" => tool).record(latency_ms);
}
