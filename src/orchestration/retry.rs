//! Uniform retry policy applied to every phase call.
//!
//! Logical failures (`success: false`) are retried immediately and, once
//! attempts run out, the last failed outcome is returned so the chain can
//! still try fallbacks. Raised errors back off exponentially and escalate
//! to `Error::RetryExhausted` when attempts run out.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{Error, Result};
use crate::{mlog_debug, mlog_warn};

use super::model::{Model, ModelRequest};
use super::phase::{ModelOutcome, PhaseName};

/// Default number of attempts per phase call.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff unit; the delay after attempt `n` is `2^n` units.
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 1000;

/// Retry configuration for the chain orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Attempts per phase call, including the first.
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

impl OrchestratorConfig {
    /// Create a config with the specified attempt limit.
    pub fn with_max_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_retries == 0 {
            return Err(Error::InvalidConfig("maxRetries must be at least 1".into()));
        }
        Ok(())
    }

    /// Delay to wait after failed attempt `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.min(16);
        Duration::from_millis(self.retry_base_delay_ms.saturating_mul(factor))
    }
}

enum LastAttempt {
    Failed(ModelOutcome),
    Raised(Error),
}

/// Call `model` up to `config.max_retries` times.
pub async fn with_retry(
    config: &OrchestratorConfig,
    label: PhaseName,
    model: &dyn Model,
    request: ModelRequest<'_>,
) -> Result<ModelOutcome> {
    let max = config.max_retries.max(1);
    let mut last = None;

    for attempt in 1..=max {
        mlog_debug!("{} attempt {}/{} model={}", label, attempt, max, model.id());

        match model.process(request).await {
            Ok(mut outcome) if outcome.success => {
                merge_live_metrics(&mut outcome, model);
                return Ok(outcome);
            }
            Ok(outcome) => {
                mlog_warn!(
                    "{} model={} reported failure on attempt {}: {}",
                    label,
                    model.id(),
                    attempt,
                    outcome.error.as_deref().unwrap_or("no reason given")
                );
                last = Some(LastAttempt::Failed(outcome));
            }
            Err(err) => {
                mlog_warn!(
                    "{} model={} raised on attempt {}: {}",
                    label,
                    model.id(),
                    attempt,
                    err
                );
                last = Some(LastAttempt::Raised(err));
                if attempt < max {
                    sleep(config.backoff(attempt)).await;
                }
            }
        }
    }

    match last {
        Some(LastAttempt::Failed(outcome)) => Ok(outcome),
        Some(LastAttempt::Raised(err)) => Err(Error::RetryExhausted {
            phase: label.to_string(),
            model: model.id().to_string(),
            attempts: max,
            last_error: Box::new(err),
        }),
        // The loop runs at least once.
        None => Err(Error::MissingPhaseOutput {
            phase: label.to_string(),
        }),
    }
}

/// Fold the model's live counters into a successful call's metrics.
fn merge_live_metrics(outcome: &mut ModelOutcome, model: &dyn Model) {
    let resources = model.resource_metrics();
    let tokens = model.token_stats();
    let m = &mut outcome.metrics;

    m.latency = resources.average_latency;
    m.memory_used = m.memory_used.max(resources.memory_usage);
    m.tokens_processed = resources.tokens_processed;
    m.peak_memory_usage = m.peak_memory_usage.max(resources.peak_memory_usage);
    m.total_processing_time = resources.total_processing_time;
    if m.tokens_used == 0 {
        m.tokens_used = tokens.total_tokens;
    }
}
