//! Execution metrics reported by models and aggregated across phases.

use serde::{Deserialize, Serialize};

/// Metrics for one model call, one phase, or an aggregate of many.
///
/// Times are milliseconds, memory is megabytes. Only `executionTime`,
/// `memoryUsed` and `tokensUsed` are required on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Metrics {
    pub execution_time: f64,
    pub memory_used: f64,
    pub tokens_used: u64,
    #[serde(default)]
    pub latency: f64,
    #[serde(default)]
    pub tokens_processed: u64,
    #[serde(default)]
    pub peak_memory_usage: f64,
    #[serde(default)]
    pub total_processing_time: f64,
    #[serde(default)]
    pub total_execution_time: f64,
    #[serde(default)]
    pub total_memory_used: f64,
    #[serde(default)]
    pub total_tokens_used: u64,
}

impl Metrics {
    pub fn new(execution_time: f64, memory_used: f64, tokens_used: u64) -> Self {
        Self {
            execution_time,
            memory_used,
            tokens_used,
            ..Default::default()
        }
    }

    /// Fill empty running totals from this call's own figures.
    pub fn with_totals(mut self) -> Self {
        if self.total_execution_time == 0.0 {
            self.total_execution_time = self.execution_time;
        }
        if self.total_memory_used == 0.0 {
            self.total_memory_used = self.memory_used;
        }
        if self.total_tokens_used == 0 {
            self.total_tokens_used = self.tokens_used;
        }
        if self.peak_memory_usage < self.memory_used {
            self.peak_memory_usage = self.memory_used;
        }
        self
    }

    /// Sum every field across `items`, except peak memory which takes the max.
    ///
    /// Token counters saturate at `u64::MAX`.
    pub fn aggregate<'a>(items: impl IntoIterator<Item = &'a Metrics>) -> Metrics {
        items.into_iter().fold(Metrics::default(), |mut acc, m| {
            acc.execution_time += m.execution_time;
            acc.memory_used += m.memory_used;
            acc.tokens_used = acc.tokens_used.saturating_add(m.tokens_used);
            acc.latency += m.latency;
            acc.tokens_processed = acc.tokens_processed.saturating_add(m.tokens_processed);
            acc.total_processing_time += m.total_processing_time;
            acc.total_execution_time += m.total_execution_time;
            acc.total_memory_used += m.total_memory_used;
            acc.total_tokens_used = acc.total_tokens_used.saturating_add(m.total_tokens_used);
            acc.peak_memory_usage = acc.peak_memory_usage.max(m.peak_memory_usage);
            acc
        })
    }

    /// Name of the first required field that is negative or not finite.
    pub fn invalid_field(&self) -> Option<&'static str> {
        let bad = |v: f64| !v.is_finite() || v < 0.0;
        if bad(self.execution_time) {
            Some("executionTime")
        } else if bad(self.memory_used) {
            Some("memoryUsed")
        } else {
            None
        }
    }
}

/// Live resource counters a model exposes between calls.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    pub average_latency: f64,
    pub memory_usage: f64,
    pub tokens_processed: u64,
    pub peak_memory_usage: f64,
    pub total_processing_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStats {
    pub total_tokens: u64,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}
