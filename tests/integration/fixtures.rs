//! Test fixtures for integration tests.
//!
//! Provides helpers for:
//! - Scripted mock models that succeed, fail or raise on demand
//! - A static registry handing out a prepared chain
//! - Predefined tasks

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use modelchain::core::{ResourceMetrics, TokenStats};
use modelchain::orchestration::{ModelRequest, PhaseKind};
use modelchain::{
    Error, Metrics, Model, ModelChain, ModelOutcome, ModelRegistry, Result, SuggestedChain, Task,
    TaskRequirements,
};

/// What a scripted model does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed(Value),
    Fail(&'static str),
    Raise(&'static str),
}

/// A request as the model saw it.
#[derive(Debug, Clone)]
pub struct Seen {
    pub phase: PhaseKind,
    pub upstream: Option<Value>,
}

/// A model that plays back a script; the last step repeats forever.
pub struct ScriptedModel {
    id: String,
    script: Vec<Step>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Seen>>,
    metrics: Metrics,
}

impl ScriptedModel {
    pub fn new(id: &str, script: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            script,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
            metrics: Metrics::new(10.0, 4.0, 20),
        })
    }

    /// Always succeeds with `output`.
    pub fn ok(id: &str, output: Value) -> Arc<Self> {
        Self::new(id, vec![Step::Succeed(output)])
    }

    /// Always reports a logical failure.
    pub fn failing(id: &str) -> Arc<Self> {
        Self::new(id, vec![Step::Fail("cannot do it")])
    }

    /// Always raises.
    pub fn raising(id: &str) -> Arc<Self> {
        Self::new(id, vec![Step::Raise("backend unavailable")])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<Seen> {
        self.seen.lock().unwrap().clone()
    }
}

impl Model for ScriptedModel {
    fn id(&self) -> &str {
        &self.id
    }

    fn process<'a>(&'a self, request: ModelRequest<'a>) -> BoxFuture<'a, Result<ModelOutcome>> {
        async move {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(Seen {
                phase: request.phase,
                upstream: request.upstream.cloned(),
            });

            // Yield so interleaved executions actually interleave.
            tokio::task::yield_now().await;

            let step = self
                .script
                .get(n)
                .or_else(|| self.script.last())
                .cloned()
                .unwrap_or(Step::Fail("empty script"));

            match step {
                Step::Succeed(output) => Ok(ModelOutcome::success(output, self.metrics)),
                Step::Fail(reason) => Ok(ModelOutcome::failure(reason, self.metrics)),
                Step::Raise(reason) => Err(Error::model(self.id.clone(), reason)),
            }
        }
        .boxed()
    }

    fn resource_metrics(&self) -> ResourceMetrics {
        ResourceMetrics {
            average_latency: 7.0,
            memory_usage: self.metrics.memory_used,
            tokens_processed: 42,
            peak_memory_usage: self.metrics.peak_memory_usage,
            total_processing_time: 11.0,
        }
    }

    fn token_stats(&self) -> TokenStats {
        TokenStats {
            total_tokens: 20,
            prompt_tokens: 15,
            completion_tokens: 5,
        }
    }
}

/// A model that echoes its task id, for concurrency checks.
pub struct TaskEcho(pub &'static str);

impl Model for TaskEcho {
    fn id(&self) -> &str {
        self.0
    }

    fn process<'a>(&'a self, request: ModelRequest<'a>) -> BoxFuture<'a, Result<ModelOutcome>> {
        async move {
            tokio::task::yield_now().await;
            Ok(ModelOutcome::success(
                json!({ "task": request.task.id.to_string(), "phase": request.phase.as_str() }),
                Metrics::new(1.0, 1.0, 1),
            ))
        }
        .boxed()
    }
}

/// Registry returning a fixed chain, or building one from suggestions only.
pub struct StaticRegistry {
    pub chain: Option<ModelChain>,
    pub build_from_suggestion: bool,
    pub suggestions: Mutex<Vec<SuggestedChain>>,
}

impl StaticRegistry {
    pub fn resolving(chain: ModelChain) -> Arc<Self> {
        Arc::new(Self {
            chain: Some(chain),
            build_from_suggestion: false,
            suggestions: Mutex::new(Vec::new()),
        })
    }

    pub fn building() -> Arc<Self> {
        Arc::new(Self {
            chain: None,
            build_from_suggestion: true,
            suggestions: Mutex::new(Vec::new()),
        })
    }

    pub fn empty() -> Arc<Self> {
        Arc::new(Self {
            chain: None,
            build_from_suggestion: false,
            suggestions: Mutex::new(Vec::new()),
        })
    }
}

impl ModelRegistry for StaticRegistry {
    fn resolve(&self, _requirements: &TaskRequirements) -> Option<ModelChain> {
        self.chain.clone()
    }

    fn build(&self, suggestion: &SuggestedChain) -> Option<ModelChain> {
        self.suggestions.lock().unwrap().push(suggestion.clone());
        if !self.build_from_suggestion {
            return None;
        }
        Some(ModelChain::new(
            ScriptedModel::ok(&suggestion.planner.id, json!("generic plan")),
            ScriptedModel::ok(&suggestion.executor.id, json!("generic answer")),
        ))
    }
}

/// A task whose inferred priority is quality.
pub fn quality_task() -> Task {
    Task::new("code_generation", "write a tokenizer", json!({"lang": "rust"}))
}

/// A task whose inferred priority is speed.
pub fn speed_task() -> Task {
    Task::new("chat", "say hello", json!("hi"))
}
