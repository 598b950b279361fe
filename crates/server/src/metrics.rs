//! Prometheus metrics
//!
//! Counters and histograms are emitted through the `metrics` facade from the
//! agent crate; this module only installs the recorder and serves it.

use axum::{extract::State, http::StatusCode, response::IntoResponse};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::{AppState, ServerError};

/// Install the global Prometheus recorder
pub fn init_metrics() -> Result<PrometheusHandle, ServerError> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ServerError::Internal(format!("metrics recorder: {}", e)))?;

    metrics::describe_counter!("call_agent_sessions_total", "Call sessions started");
    metrics::describe_counter!("call_agent_sessions_closed_total", "Call sessions closed by reason");
    metrics::describe_counter!("call_agent_tool_calls_total", "Tool invocations by outcome");
    metrics::describe_histogram!("call_agent_tool_latency_ms", "Tool execution latency");
    metrics::describe_counter!("call_agent_retrieval_total", "Knowledge retrievals by outcome");
    metrics::describe_gauge!("call_agent_active_calls", "Currently connected calls");

    Ok(handle)
}

/// `GET /metrics`
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    match &state.metrics {
        Some(handle) => (StatusCode::OK, handle.render()),
        None => (StatusCode::NOT_FOUND, "metrics disabled".to_string()),
    }
}
