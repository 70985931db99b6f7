//! Contracts for the models and registries a chain is built from.
//!
//! Concrete models live outside this crate. They process one request,
//! report an outcome, and expose live resource and token counters that the
//! retry wrapper folds into phase metrics after each successful call.

use futures::future::BoxFuture;
use serde_json::Value;
use std::sync::Arc;

use crate::analysis::SuggestedChain;
use crate::core::{ResourceMetrics, Task, TaskRequirements, TokenStats};
use crate::error::Result;

use super::phase::{ModelOutcome, PhaseKind};

/// Input handed to a model for one phase.
#[derive(Debug, Clone, Copy)]
pub struct ModelRequest<'a> {
    pub phase: PhaseKind,
    pub task: &'a Task,
    /// Output of the preceding phase(s), if any.
    pub upstream: Option<&'a Value>,
}

impl<'a> ModelRequest<'a> {
    pub fn new(phase: PhaseKind, task: &'a Task, upstream: Option<&'a Value>) -> Self {
        Self {
            phase,
            task,
            upstream,
        }
    }
}

/// A planner, executor, reviewer or context-preparer.
///
/// `process` returns `Ok` with `success: false` for logical failures and
/// `Err` for faults worth backing off from.
pub trait Model: Send + Sync {
    fn id(&self) -> &str;

    fn process<'a>(&'a self, request: ModelRequest<'a>) -> BoxFuture<'a, Result<ModelOutcome>>;

    fn resource_metrics(&self) -> ResourceMetrics {
        ResourceMetrics::default()
    }

    fn token_stats(&self) -> TokenStats {
        TokenStats::default()
    }
}

/// Role-bound models assigned to a task.
#[derive(Clone)]
pub struct ModelChain {
    pub planner: Arc<dyn Model>,
    pub executor: Arc<dyn Model>,
    pub reviewer: Option<Arc<dyn Model>>,
    pub context: Option<Arc<dyn Model>>,
    /// Alternate executors, tried in order.
    pub fallbacks: Vec<Arc<dyn Model>>,
}

impl ModelChain {
    pub fn new(planner: Arc<dyn Model>, executor: Arc<dyn Model>) -> Self {
        Self {
            planner,
            executor,
            reviewer: None,
            context: None,
            fallbacks: Vec::new(),
        }
    }

    pub fn with_reviewer(mut self, reviewer: Arc<dyn Model>) -> Self {
        self.reviewer = Some(reviewer);
        self
    }

    pub fn with_context(mut self, context: Arc<dyn Model>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn Model>) -> Self {
        self.fallbacks.push(fallback);
        self
    }

    pub fn with_fallbacks(mut self, fallbacks: impl IntoIterator<Item = Arc<dyn Model>>) -> Self {
        self.fallbacks.extend(fallbacks);
        self
    }
}

impl std::fmt::Debug for ModelChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelChain")
            .field("planner", &self.planner.id())
            .field("executor", &self.executor.id())
            .field("reviewer", &self.reviewer.as_ref().map(|m| m.id()))
            .field("context", &self.context.as_ref().map(|m| m.id()))
            .field(
                "fallbacks",
                &self.fallbacks.iter().map(|m| m.id()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

/// Resolves requirements to a chain. Lookups must be side-effect free.
pub trait ModelRegistry: Send + Sync {
    fn resolve(&self, requirements: &TaskRequirements) -> Option<ModelChain>;

    /// Instantiate a proposed chain when `resolve` found nothing.
    fn build(&self, _suggestion: &SuggestedChain) -> Option<ModelChain> {
        None
    }
}
