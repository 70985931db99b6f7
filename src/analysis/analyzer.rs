//! Requirement analysis for incoming tasks.
//!
//! The `RequirementAnalyzer` turns a task's type tag and input into a
//! validated `TaskRequirements`, and can propose a minimal planner +
//! executor chain when no registry has a better match.

use serde::{Deserialize, Serialize};

use crate::core::{
    select_best, Capability, ModelProfile, Priority, ResourceConstraints, Task, TaskRequirements,
};
use crate::error::{Error, Result};
use crate::{mlog_debug, mlog_warn};

/// Minimum score pinned on the primary capability.
pub const PRIMARY_MIN_SCORE: f64 = 0.8;

/// Minimum score pinned on every secondary capability.
pub const SECONDARY_MIN_SCORE: f64 = 0.6;

/// Serialized input length above which the context estimate is scaled.
pub const LARGE_INPUT_CHARS: usize = 1000;

/// Scale applied to the base context size for large inputs.
pub const LARGE_INPUT_FACTOR: f64 = 1.5;

/// Fixed per-type defaults used during inference.
#[derive(Debug, Clone, Copy, PartialEq)]
struct TypeProfile {
    primary: Capability,
    secondary: &'static [Capability],
    base_context: u64,
    priority: Priority,
}

fn profile(
    primary: Capability,
    secondary: &'static [Capability],
    base_context: u64,
    priority: Priority,
) -> TypeProfile {
    TypeProfile {
        primary,
        secondary,
        base_context,
        priority,
    }
}

fn type_profile(task_type: &str) -> TypeProfile {
    use Capability::*;

    match task_type {
        "code_generation" | "code" | "generation" => {
            profile(Code, &[Analysis, Reasoning], 8000, Priority::Quality)
        }
        "code_review" | "review" => profile(Code, &[Analysis], 8000, Priority::Quality),
        "analysis" | "data_analysis" => profile(Analysis, &[Reasoning], 4000, Priority::Quality),
        "image_analysis" | "vision" => profile(Vision, &[Analysis], 2000, Priority::Efficiency),
        "summarization" | "document_processing" | "context" => {
            profile(Context, &[Analysis], 16000, Priority::Efficiency)
        }
        "conversation" | "chat" | "interaction" => {
            profile(Interaction, &[Reasoning], 2000, Priority::Speed)
        }
        "reasoning" | "planning" => profile(Reasoning, &[Analysis], 4000, Priority::Quality),
        "translation" | "specialized" => {
            profile(Specialized, &[Reasoning], 4000, Priority::Efficiency)
        }
        _ => profile(Reasoning, &[], 4000, Priority::Efficiency),
    }
}

/// A minimal two-role chain proposal.
///
/// The analyzer owns no model instances, so the proposal is expressed as
/// profiles; a registry turns it into a live `ModelChain`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestedChain {
    pub planner: ModelProfile,
    pub executor: ModelProfile,
}

#[derive(Debug, Clone, Default)]
pub struct RequirementAnalyzer {
    constraints: ResourceConstraints,
}

impl RequirementAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use different default resource ceilings for inferred requirements.
    pub fn with_constraints(constraints: ResourceConstraints) -> Self {
        Self { constraints }
    }

    /// Derive validated requirements for `task`.
    ///
    /// Requirements attached to the task take precedence over inference but
    /// are validated all the same.
    pub fn analyze(&self, task: &Task) -> Result<TaskRequirements> {
        if let Some(pinned) = &task.requirements {
            mlog_debug!("analyze task={} using pinned requirements", task.id.short());
            self.validate_requirements(pinned)?;
            return Ok(pinned.clone());
        }

        let profile = type_profile(&task.task_type);

        let mut min_capability_scores = std::collections::BTreeMap::new();
        for cap in profile.secondary {
            min_capability_scores.insert(*cap, SECONDARY_MIN_SCORE);
        }
        min_capability_scores.insert(profile.primary, PRIMARY_MIN_SCORE);

        let priority = match task.metadata_str("priority") {
            Some(raw) => raw.parse().unwrap_or_else(|e| {
                mlog_warn!("task={} ignoring priority override: {}", task.id.short(), e);
                profile.priority
            }),
            None => profile.priority,
        };

        let requirements = TaskRequirements {
            primary_capability: profile.primary,
            secondary_capabilities: profile.secondary.to_vec(),
            min_capability_scores,
            context_size: estimate_context_size(task, profile.base_context)?,
            priority,
            resource_constraints: Some(self.constraints),
        };

        mlog_debug!(
            "analyze task={} type={} primary={} context={} priority={}",
            task.id.short(),
            task.task_type,
            requirements.primary_capability,
            requirements.context_size,
            requirements.priority
        );

        self.validate_requirements(&requirements)?;
        Ok(requirements)
    }

    /// Check that a requirement set is internally consistent.
    pub fn validate_requirements(&self, requirements: &TaskRequirements) -> Result<()> {
        let fail = |msg: String| Err(Error::InvalidRequirements(msg));

        if requirements.min_capability_scores.is_empty() {
            return fail("minCapabilityScores must not be empty".into());
        }
        if !requirements
            .min_capability_scores
            .contains_key(&requirements.primary_capability)
        {
            return fail(format!(
                "no minimum score for primary capability {}",
                requirements.primary_capability
            ));
        }
        for (cap, score) in &requirements.min_capability_scores {
            if !(0.0..=1.0).contains(score) {
                return fail(format!("score for {} out of range: {}", cap, score));
            }
        }
        if requirements.context_size == 0 {
            return fail("contextSize must be positive".into());
        }
        if let Some(rc) = &requirements.resource_constraints {
            if !(rc.max_cpu > 0.0 && rc.max_cpu <= 1.0) {
                return fail(format!("maxCpu must be in (0, 1], got {}", rc.max_cpu));
            }
            if !(rc.max_memory > 0.0) {
                return fail(format!("maxMemory must be positive, got {}", rc.max_memory));
            }
            if !(rc.max_latency > 0.0) {
                return fail(format!("maxLatency must be positive, got {}", rc.max_latency));
            }
        }
        Ok(())
    }

    /// Propose a reasoning-weighted planner and an executor weighted
    /// toward the primary capability.
    pub fn suggest_model_chain(&self, requirements: &TaskRequirements) -> SuggestedChain {
        let reasoning_floor = requirements
            .min_capability_scores
            .get(&Capability::Reasoning)
            .copied()
            .unwrap_or(PRIMARY_MIN_SCORE)
            .max(PRIMARY_MIN_SCORE);

        let planner = ModelProfile::new("generic-planner")
            .with_capability(Capability::Reasoning, reasoning_floor, 0.5);

        let primary = requirements.primary_capability;
        let mut executor = ModelProfile::new(format!("generic-{}-executor", primary));
        for cap in &requirements.secondary_capabilities {
            let floor = requirements
                .min_capability_scores
                .get(cap)
                .copied()
                .unwrap_or(SECONDARY_MIN_SCORE);
            executor = executor.with_capability(*cap, floor, 0.5);
        }
        let primary_floor = requirements
            .min_capability_scores
            .get(&primary)
            .copied()
            .unwrap_or(PRIMARY_MIN_SCORE);
        executor = executor.with_capability(primary, primary_floor, 0.5);

        SuggestedChain { planner, executor }
    }

    /// Pick a planner and an executor from known model profiles.
    ///
    /// The planner is the best reasoner, the executor the best fit for the
    /// primary capability; one profile may fill both roles. `None` when the
    /// catalog is empty.
    pub fn select_chain(
        &self,
        requirements: &TaskRequirements,
        catalog: &[ModelProfile],
    ) -> Option<SuggestedChain> {
        let planner = select_best(catalog, Capability::Reasoning)?;
        let executor = select_best(catalog, requirements.primary_capability)?;
        mlog_debug!(
            "select_chain primary={} planner={} executor={}",
            requirements.primary_capability,
            planner.id,
            executor.id
        );
        Some(SuggestedChain {
            planner: planner.clone(),
            executor: executor.clone(),
        })
    }
}

fn estimate_context_size(task: &Task, base: u64) -> Result<u64> {
    let serialized = serde_json::to_string(&task.input)?;
    if serialized.len() > LARGE_INPUT_CHARS {
        let scaled = (base as f64 * LARGE_INPUT_FACTOR).ceil() as u64;
        Ok(scaled.max(base))
    } else {
        Ok(base)
    }
}
