//! Phase and outcome types produced during chain execution.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use crate::core::Metrics;

/// The kind of work a model is asked to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Planning,
    Context,
    Execution,
    Review,
}

impl PhaseKind {
    /// Display order used when naming positional results.
    pub const ORDER: [PhaseKind; 4] = [
        PhaseKind::Planning,
        PhaseKind::Context,
        PhaseKind::Execution,
        PhaseKind::Review,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseKind::Planning => "planning",
            PhaseKind::Context => "context",
            PhaseKind::Execution => "execution",
            PhaseKind::Review => "review",
        }
    }
}

impl std::fmt::Display for PhaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label of a recorded phase: a kind, or the 1-based position of the
/// fallback executor that produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhaseName {
    Kind(PhaseKind),
    Fallback(usize),
}

impl PhaseName {
    /// The kind of work behind this label; fallbacks stand in for execution.
    pub fn kind(&self) -> PhaseKind {
        match self {
            PhaseName::Kind(kind) => *kind,
            PhaseName::Fallback(_) => PhaseKind::Execution,
        }
    }
}

impl From<PhaseKind> for PhaseName {
    fn from(kind: PhaseKind) -> Self {
        PhaseName::Kind(kind)
    }
}

impl std::fmt::Display for PhaseName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PhaseName::Kind(kind) => write!(f, "{}", kind),
            PhaseName::Fallback(n) => write!(f, "fallback_{}", n),
        }
    }
}

impl std::str::FromStr for PhaseName {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(n) = s.strip_prefix("fallback_") {
            return n
                .parse()
                .map(PhaseName::Fallback)
                .map_err(|_| format!("invalid fallback label: {}", s));
        }
        PhaseKind::ORDER
            .into_iter()
            .find(|k| k.as_str() == s)
            .map(PhaseName::Kind)
            .ok_or_else(|| format!("unknown phase: {}", s))
    }
}

impl Serialize for PhaseName {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PhaseName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    Completed,
    Failed,
    Skipped,
}

impl PhaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhaseStatus::Completed => "completed",
            PhaseStatus::Failed => "failed",
            PhaseStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a model call produced.
///
/// `success: false` is a logical failure: the call returned but the model
/// could not do the work. It is never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOutcome {
    pub success: bool,
    #[serde(default)]
    pub output: Value,
    pub metrics: Metrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ModelOutcome {
    pub fn success(output: Value, metrics: Metrics) -> Self {
        Self {
            success: true,
            output,
            metrics,
            error: None,
        }
    }

    pub fn failure(reason: impl Into<String>, metrics: Metrics) -> Self {
        Self {
            success: false,
            output: Value::Null,
            metrics,
            error: Some(reason.into()),
        }
    }
}

/// One recorded phase of a chain execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhaseResult {
    pub phase: PhaseName,
    pub status: PhaseStatus,
    pub model_id: String,
    pub outcome: ModelOutcome,
    #[serde(default)]
    pub used_fallback: bool,
}

impl PhaseResult {
    pub fn new(phase: impl Into<PhaseName>, model_id: impl Into<String>, outcome: ModelOutcome) -> Self {
        let status = if outcome.success {
            PhaseStatus::Completed
        } else {
            PhaseStatus::Failed
        };
        Self {
            phase: phase.into(),
            status,
            model_id: model_id.into(),
            outcome: ModelOutcome {
                metrics: outcome.metrics.with_totals(),
                ..outcome
            },
            used_fallback: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == PhaseStatus::Completed && self.outcome.success
    }

    /// Metrics-only view for error reports.
    pub fn snapshot(&self) -> crate::error::PhaseSnapshot {
        crate::error::PhaseSnapshot {
            phase: self.phase.to_string(),
            status: self.status.to_string(),
            metrics: self.outcome.metrics,
        }
    }
}

/// Aggregated result of one task run through a chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelResult {
    pub success: bool,
    pub output: Value,
    /// Phase whose output became the task's answer.
    pub phase: PhaseName,
    pub phases: Vec<PhaseResult>,
    pub metrics: Metrics,
    pub used_fallback: bool,
}
