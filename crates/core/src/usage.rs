//! Usage accounting for a single call

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::time::Instant;

/// Usage counters reported by the gateway
///
/// Deltas: each report is added to what the call has already accumulated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UsageMetrics {
    pub llm_prompt_tokens: u64,
    pub llm_completion_tokens: u64,
    pub tts_characters: u64,
    pub stt_audio_duration_secs: f64,
}

impl UsageMetrics {
    fn add(&mut self, other: &UsageMetrics) {
        self.llm_prompt_tokens += other.llm_prompt_tokens;
        self.llm_completion_tokens += other.llm_completion_tokens;
        self.tts_characters += other.tts_characters;
        self.stt_audio_duration_secs += other.stt_audio_duration_secs;
    }
}

/// Per-tool invocation counts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCounts {
    pub succeeded: u32,
    pub failed: u32,
}

/// Summary flushed once when a call closes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(flatten)]
    pub metrics: UsageMetrics,
    pub user_turns: u32,
    pub tools: BTreeMap<String, ToolCounts>,
}

impl UsageSummary {
    pub fn total_tool_calls(&self) -> u32 {
        self.tools.values().map(|c| c.succeeded + c.failed).sum()
    }
}

impl fmt::Display for UsageSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "duration={}ms prompt_tokens={} completion_tokens={} tts_chars={} stt_secs={:.1} turns={} tool_calls={}",
            self.duration_ms,
            self.metrics.llm_prompt_tokens,
            self.metrics.llm_completion_tokens,
            self.metrics.tts_characters,
            self.metrics.stt_audio_duration_secs,
            self.user_turns,
            self.total_tool_calls(),
        )
    }
}

/// Accumulates usage over the life of a call
#[derive(Debug)]
pub struct UsageCollector {
    started_at: DateTime<Utc>,
    started: Instant,
    metrics: UsageMetrics,
    user_turns: u32,
    tools: BTreeMap<String, ToolCounts>,
}

impl UsageCollector {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            started: Instant::now(),
            metrics: UsageMetrics::default(),
            user_turns: 0,
            tools: BTreeMap::new(),
        }
    }

    pub fn collect(&mut self, metrics: &UsageMetrics) {
        self.metrics.add(metrics);
    }

    pub fn record_user_turn(&mut self) {
        self.user_turns += 1;
    }

    pub fn record_tool(&mut self, tool: &str, success: bool) {
        let counts = self.tools.entry(tool.to_string()).or_default();
        if success {
            counts.succeeded += 1;
        } else {
            counts.failed += 1;
        }
    }

    pub fn summary(&self) -> UsageSummary {
        UsageSummary {
            started_at: self.started_at,
            duration_ms: self.started.elapsed().as_millis() as u64,
            metrics: self.metrics,
            user_turns: self.user_turns,
            tools: self.tools.clone(),
        }
    }
}

impl Default for UsageCollector {
    fn default() -> Self {
        Self::new()
    }
}
