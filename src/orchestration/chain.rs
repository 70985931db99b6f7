//! Chain orchestrator driving a task through its phases.
//!
//! Phases run strictly in order:
//! 1. Planning - always, its output is required downstream
//! 2. Context - only when the chain has a context-preparer
//! 3. Execution - always, with fallback executors on failure
//! 4. Review - only after a successful execution of a quality-priority task
//!
//! Per-execution state lives in a `ChainRun` owned by each call, so one
//! orchestrator can serve concurrent tasks.

use serde_json::{json, Value};
use std::sync::Arc;

use crate::analysis::RequirementAnalyzer;
use crate::core::{Metrics, Priority, Task, TaskRequirements};
use crate::error::{Error, PhaseSnapshot, Result};
use crate::{mlog, mlog_debug, mlog_error, mlog_trace, mlog_warn};

use super::model::{Model, ModelChain, ModelRegistry, ModelRequest};
use super::phase::{ModelResult, PhaseKind, PhaseName, PhaseResult};
use super::retry::{with_retry, OrchestratorConfig};

/// Phase results accumulated by a single chain execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainRun {
    pub phases: Vec<PhaseResult>,
    /// Whether a fallback executor satisfied the execution phase.
    pub used_fallback: bool,
}

impl ChainRun {
    /// The last phase, in execution order, that completed successfully.
    pub fn last_success(&self) -> Option<&PhaseResult> {
        self.phases.iter().rev().find(|p| p.is_success())
    }

    pub fn metrics(&self) -> Metrics {
        Metrics::aggregate(self.phases.iter().map(|p| &p.outcome.metrics))
    }

    pub fn snapshot(&self) -> Vec<PhaseSnapshot> {
        self.phases.iter().map(PhaseResult::snapshot).collect()
    }

    /// Collapse the run into a task-level result.
    ///
    /// The answer comes from the last successful phase, which is the review
    /// when one ran and succeeded.
    pub fn into_result(self) -> Result<ModelResult> {
        let metrics = self.metrics();
        let (output, phase) = match self.last_success() {
            Some(last) => (last.outcome.output.clone(), last.phase),
            None => {
                return Err(Error::NoSuccessfulPhase {
                    phases: self.phases.len(),
                })
            }
        };

        Ok(ModelResult {
            success: true,
            output,
            phase,
            phases: self.phases,
            metrics,
            used_fallback: self.used_fallback,
        })
    }
}

/// Drives tasks through planning, context, execution and review.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use modelchain::orchestration::{ChainOrchestrator, OrchestratorConfig};
///
/// let orchestrator = ChainOrchestrator::new(OrchestratorConfig::default())?
///     .with_registry(Arc::new(my_registry));
///
/// let result = orchestrator.handle_task(&task).await?;
/// println!("answer from {}: {}", result.phase, result.output);
/// ```
pub struct ChainOrchestrator {
    config: OrchestratorConfig,
    analyzer: RequirementAnalyzer,
    registry: Option<Arc<dyn ModelRegistry>>,
}

impl ChainOrchestrator {
    /// Create an orchestrator without a registry.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` if `max_retries` is zero.
    pub fn new(config: OrchestratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            analyzer: RequirementAnalyzer::new(),
            registry: None,
        })
    }

    pub fn with_registry(mut self, registry: Arc<dyn ModelRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_analyzer(mut self, analyzer: RequirementAnalyzer) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Analyze, resolve a chain, execute it and aggregate the result.
    pub async fn handle_task(&self, task: &Task) -> Result<ModelResult> {
        mlog!(
            "task={} type={} received",
            task.id.short(),
            task.task_type
        );
        let requirements = self.analyzer.analyze(task)?;
        let chain = self.resolve_chain(task, &requirements)?;
        self.run_task(task, &chain, &requirements).await
    }

    /// Execute `chain` for `task` and aggregate the phases into one result.
    pub async fn run_task(
        &self,
        task: &Task,
        chain: &ModelChain,
        requirements: &TaskRequirements,
    ) -> Result<ModelResult> {
        let run = self.execute_chain(task, chain, requirements).await?;
        let result = run.into_result()?;
        mlog!(
            "task={} finished answer_phase={} phases={} fallback={}",
            task.id.short(),
            result.phase,
            result.phases.len(),
            result.used_fallback
        );
        Ok(result)
    }

    /// Run every applicable phase and return the accumulated results.
    ///
    /// # Errors
    ///
    /// Any error not absorbed by retry or fallback handling is returned as
    /// `Error::ChainExecution`, tagged with the phase that was running and a
    /// metrics snapshot of the phases recorded so far.
    pub async fn execute_chain(
        &self,
        task: &Task,
        chain: &ModelChain,
        requirements: &TaskRequirements,
    ) -> Result<ChainRun> {
        let mut run = ChainRun::default();
        let mut current = PhaseName::Kind(PhaseKind::Planning);

        match self
            .sequence(task, chain, requirements, &mut run, &mut current)
            .await
        {
            Ok(()) => Ok(run),
            Err(source) => {
                mlog_error!(
                    "task={} chain failed during {}: {}",
                    task.id.short(),
                    current,
                    source
                );
                Err(Error::ChainExecution {
                    phase: current.to_string(),
                    source: Box::new(source),
                    snapshot: run.snapshot(),
                })
            }
        }
    }

    fn resolve_chain(&self, task: &Task, requirements: &TaskRequirements) -> Result<ModelChain> {
        let no_chain = || Error::NoChain {
            task: task.id.to_string(),
        };
        let registry = self.registry.as_ref().ok_or_else(no_chain)?;

        if let Some(chain) = registry.resolve(requirements) {
            return Ok(chain);
        }

        mlog_debug!(
            "task={} no registry match, building suggested chain",
            task.id.short()
        );
        let suggestion = self.analyzer.suggest_model_chain(requirements);
        registry.build(&suggestion).ok_or_else(no_chain)
    }

    async fn sequence(
        &self,
        task: &Task,
        chain: &ModelChain,
        requirements: &TaskRequirements,
        run: &mut ChainRun,
        current: &mut PhaseName,
    ) -> Result<()> {
        // Planning
        *current = PhaseKind::Planning.into();
        let plan = self
            .run_phase(task, PhaseKind::Planning, chain.planner.as_ref(), None, run)
            .await?;
        let plan = match plan {
            Some(output) => output,
            None => {
                return Err(Error::MissingPhaseOutput {
                    phase: PhaseKind::Planning.to_string(),
                })
            }
        };

        // Context
        let mut context = Value::Null;
        if let Some(preparer) = &chain.context {
            *current = PhaseKind::Context.into();
            context = self
                .run_phase(task, PhaseKind::Context, preparer.as_ref(), Some(&plan), run)
                .await?
                .unwrap_or(Value::Null);
        }

        // Execution
        *current = PhaseKind::Execution.into();
        let upstream = json!({ "plan": plan, "context": context });
        let executed = self.run_execution(task, chain, &upstream, run).await?;

        // Review
        if !executed || requirements.priority != Priority::Quality {
            return Ok(());
        }
        if let Some(reviewer) = &chain.reviewer {
            *current = PhaseKind::Review.into();
            let answer = run
                .phases
                .last()
                .map(|p| p.outcome.output.clone())
                .unwrap_or(Value::Null);
            self.run_phase(task, PhaseKind::Review, reviewer.as_ref(), Some(&answer), run)
                .await?;
        }

        Ok(())
    }

    /// Run one non-execution phase; returns its output when it succeeded.
    async fn run_phase(
        &self,
        task: &Task,
        kind: PhaseKind,
        model: &dyn Model,
        upstream: Option<&Value>,
        run: &mut ChainRun,
    ) -> Result<Option<Value>> {
        mlog!("task={} phase={} model={}", task.id.short(), kind, model.id());

        let outcome = with_retry(
            &self.config,
            kind.into(),
            model,
            ModelRequest::new(kind, task, upstream),
        )
        .await?;

        let result = PhaseResult::new(kind, model.id(), outcome);
        mlog_trace!(
            "task={} phase={} status={} output={}",
            task.id.short(),
            kind,
            result.status,
            result.outcome.output
        );
        let output = result.is_success().then(|| result.outcome.output.clone());
        run.phases.push(result);
        Ok(output)
    }

    /// Run the primary executor, then fallbacks in order until one succeeds.
    ///
    /// Returns whether execution succeeded. Errors from fallbacks are
    /// absorbed; the primary's error surfaces only if no attempt returned.
    async fn run_execution(
        &self,
        task: &Task,
        chain: &ModelChain,
        upstream: &Value,
        run: &mut ChainRun,
    ) -> Result<bool> {
        let request = ModelRequest::new(PhaseKind::Execution, task, Some(upstream));
        let executor = chain.executor.as_ref();
        mlog!(
            "task={} phase=execution model={}",
            task.id.short(),
            executor.id()
        );

        let primary = with_retry(&self.config, PhaseKind::Execution.into(), executor, request).await;
        let (mut failed, primary_error) = match primary {
            Ok(outcome) if outcome.success => {
                run.phases
                    .push(PhaseResult::new(PhaseKind::Execution, executor.id(), outcome));
                return Ok(true);
            }
            Ok(outcome) => (
                Some(PhaseResult::new(PhaseKind::Execution, executor.id(), outcome)),
                None,
            ),
            Err(err) => {
                mlog_warn!("task={} primary executor raised: {}", task.id.short(), err);
                (None, Some(err))
            }
        };

        for (i, fallback) in chain.fallbacks.iter().enumerate() {
            let label = PhaseName::Fallback(i + 1);
            mlog!(
                "task={} trying {} model={}",
                task.id.short(),
                label,
                fallback.id()
            );

            match with_retry(&self.config, label, fallback.as_ref(), request).await {
                Ok(outcome) if outcome.success => {
                    let mut result = PhaseResult::new(label, fallback.id(), outcome);
                    result.used_fallback = true;
                    run.used_fallback = true;
                    run.phases.push(result);
                    return Ok(true);
                }
                Ok(outcome) => {
                    if failed.is_none() {
                        failed = Some(PhaseResult::new(label, fallback.id(), outcome));
                    }
                }
                Err(err) => {
                    mlog_warn!("task={} {} raised: {}", task.id.short(), label, err);
                }
            }
        }

        match (failed, primary_error) {
            (Some(result), _) => {
                mlog_warn!("task={} execution failed on every executor", task.id.short());
                run.phases.push(result);
                Ok(false)
            }
            (None, Some(err)) => Err(err),
            (None, None) => Err(Error::MissingPhaseOutput {
                phase: PhaseKind::Execution.to_string(),
            }),
        }
    }
}
