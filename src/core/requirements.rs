//! Requirement and capability types shared by the analyzer and registries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named skill dimension used to match tasks to models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    Code,
    Reasoning,
    Vision,
    Context,
    Analysis,
    Interaction,
    Specialized,
}

impl Capability {
    pub const ALL: [Capability; 7] = [
        Capability::Code,
        Capability::Reasoning,
        Capability::Vision,
        Capability::Context,
        Capability::Analysis,
        Capability::Interaction,
        Capability::Specialized,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Code => "code",
            Capability::Reasoning => "reasoning",
            Capability::Vision => "vision",
            Capability::Context => "context",
            Capability::Analysis => "analysis",
            Capability::Interaction => "interaction",
            Capability::Specialized => "specialized",
        }
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Capability {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Capability::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown capability: {}", s))
    }
}

/// What the task optimizes for. Only `Quality` enables the review phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Speed,
    Quality,
    #[default]
    Efficiency,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::Speed => write!(f, "speed"),
            Priority::Quality => write!(f, "quality"),
            Priority::Efficiency => write!(f, "efficiency"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "speed" => Ok(Priority::Speed),
            "quality" => Ok(Priority::Quality),
            "efficiency" => Ok(Priority::Efficiency),
            other => Err(format!("unknown priority: {}", other)),
        }
    }
}

/// Resource ceilings for a task.
///
/// `max_latency` is advisory: model implementations are expected to honor
/// it, the orchestrator does not enforce it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceConstraints {
    /// Megabytes.
    pub max_memory: f64,
    /// Fraction of a CPU in (0, 1].
    pub max_cpu: f64,
    /// Milliseconds.
    pub max_latency: f64,
}

impl Default for ResourceConstraints {
    fn default() -> Self {
        Self {
            max_memory: 1000.0,
            max_cpu: 0.8,
            max_latency: 200.0,
        }
    }
}

/// Structured requirements derived from a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRequirements {
    pub primary_capability: Capability,
    #[serde(default)]
    pub secondary_capabilities: Vec<Capability>,
    pub min_capability_scores: BTreeMap<Capability, f64>,
    /// Estimated context size in token-equivalent units.
    pub context_size: u64,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_constraints: Option<ResourceConstraints>,
}

/// Observed quality of a model for one capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelCapabilityScore {
    /// Score in [0, 1].
    pub score: f64,
    pub confidence: f64,
    pub last_updated: DateTime<Utc>,
    pub sample_size: u32,
}

impl ModelCapabilityScore {
    pub fn new(score: f64, confidence: f64) -> Self {
        Self {
            score: score.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            last_updated: Utc::now(),
            sample_size: 0,
        }
    }
}

pub type ModelCapabilities = BTreeMap<Capability, ModelCapabilityScore>;

/// A model identity paired with its capability scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelProfile {
    pub id: String,
    pub capabilities: ModelCapabilities,
}

impl ModelProfile {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            capabilities: ModelCapabilities::new(),
        }
    }

    pub fn with_capability(mut self, capability: Capability, score: f64, confidence: f64) -> Self {
        self.capabilities
            .insert(capability, ModelCapabilityScore::new(score, confidence));
        self
    }

    /// Confidence-weighted score for a capability, 0 when unknown.
    pub fn weight_for(&self, capability: Capability) -> f64 {
        self.capabilities
            .get(&capability)
            .map(|s| s.score * s.confidence)
            .unwrap_or(0.0)
    }
}

/// Pick the profile with the highest weight for `capability`.
///
/// Ties keep the earliest profile so registry order acts as preference.
pub fn select_best(profiles: &[ModelProfile], capability: Capability) -> Option<&ModelProfile> {
    profiles.iter().fold(None, |best: Option<&ModelProfile>, p| match best {
        Some(b) if b.weight_for(capability) >= p.weight_for(capability) => Some(b),
        _ => Some(p),
    })
}
