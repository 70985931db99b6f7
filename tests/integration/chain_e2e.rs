//! End-to-end chain sequencing through `ChainOrchestrator`.

use serde_json::json;
use std::sync::Arc;

use modelchain::orchestration::{PhaseKind, PhaseName, PhaseStatus};
use modelchain::core::ResourceConstraints;
use modelchain::{
    Capability, ChainOrchestrator, Model, ModelChain, OrchestratorConfig, RequirementAnalyzer,
};

use crate::fixtures::{quality_task, speed_task, ScriptedModel, StaticRegistry, TaskEcho};

fn orchestrator() -> ChainOrchestrator {
    ChainOrchestrator::new(OrchestratorConfig::default()).unwrap()
}

#[tokio::test]
async fn test_two_phase_chain_runs_in_order() {
    let planner = ScriptedModel::ok("planner", json!("the plan"));
    let executor = ScriptedModel::ok("executor", json!("the answer"));
    let chain = ModelChain::new(planner.clone(), executor.clone());
    let orchestrator = orchestrator().with_registry(StaticRegistry::resolving(chain));

    let result = orchestrator.handle_task(&speed_task()).await.unwrap();

    assert!(result.success);
    assert_eq!(result.output, json!("the answer"));
    assert_eq!(result.phase, PhaseName::Kind(PhaseKind::Execution));
    let names: Vec<String> = result.phases.iter().map(|p| p.phase.to_string()).collect();
    assert_eq!(names, vec!["planning", "execution"]);
    assert!(!result.used_fallback);
    assert_eq!(planner.calls(), 1);
    assert_eq!(executor.calls(), 1);
}

#[tokio::test]
async fn test_execution_receives_plan_and_context() {
    let planner = ScriptedModel::ok("planner", json!({"steps": 2}));
    let context = ScriptedModel::ok("context", json!("relevant docs"));
    let executor = ScriptedModel::ok("executor", json!("done"));
    let chain =
        ModelChain::new(planner.clone(), executor.clone()).with_context(context.clone());

    let result = orchestrator()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&speed_task())
        .await
        .unwrap();

    let names: Vec<String> = result.phases.iter().map(|p| p.phase.to_string()).collect();
    assert_eq!(names, vec!["planning", "context", "execution"]);

    assert_eq!(planner.seen()[0].upstream, None);
    assert_eq!(context.seen()[0].upstream, Some(json!({"steps": 2})));
    assert_eq!(context.seen()[0].phase, PhaseKind::Context);
    assert_eq!(
        executor.seen()[0].upstream,
        Some(json!({"plan": {"steps": 2}, "context": "relevant docs"}))
    );
}

#[tokio::test]
async fn test_failed_context_passes_null_downstream() {
    let executor = ScriptedModel::ok("executor", json!("done"));
    let chain = ModelChain::new(ScriptedModel::ok("planner", json!("plan")), executor.clone())
        .with_context(ScriptedModel::failing("context"));

    let result = orchestrator()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&speed_task())
        .await
        .unwrap();

    assert_eq!(result.phases[1].status, PhaseStatus::Failed);
    assert_eq!(
        executor.seen()[0].upstream,
        Some(json!({"plan": "plan", "context": null}))
    );
    assert_eq!(result.output, json!("done"));
}

#[tokio::test]
async fn test_review_runs_only_for_quality_tasks() {
    let reviewer = ScriptedModel::ok("reviewer", json!("reviewed answer"));
    let chain = ModelChain::new(
        ScriptedModel::ok("planner", json!("plan")),
        ScriptedModel::ok("executor", json!("draft")),
    )
    .with_reviewer(reviewer.clone());
    let orchestrator = orchestrator().with_registry(StaticRegistry::resolving(chain));

    let fast = orchestrator.handle_task(&speed_task()).await.unwrap();
    assert_eq!(fast.phases.len(), 2);
    assert_eq!(reviewer.calls(), 0);

    let careful = orchestrator.handle_task(&quality_task()).await.unwrap();
    let names: Vec<String> = careful.phases.iter().map(|p| p.phase.to_string()).collect();
    assert_eq!(names, vec!["planning", "execution", "review"]);
    assert_eq!(reviewer.seen()[0].upstream, Some(json!("draft")));

    // The answer comes from the last successful phase.
    assert_eq!(careful.output, json!("reviewed answer"));
    assert_eq!(careful.phase, PhaseName::Kind(PhaseKind::Review));
}

#[tokio::test]
async fn test_review_skipped_after_failed_execution() {
    let reviewer = ScriptedModel::ok("reviewer", json!("reviewed"));
    let chain = ModelChain::new(
        ScriptedModel::ok("planner", json!("plan")),
        ScriptedModel::failing("executor"),
    )
    .with_reviewer(reviewer.clone());

    let result = orchestrator()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&quality_task())
        .await
        .unwrap();

    assert_eq!(reviewer.calls(), 0);
    assert_eq!(result.phases.len(), 2);
    assert_eq!(result.phases[1].status, PhaseStatus::Failed);
    // Only planning succeeded, so its output stands as the answer.
    assert_eq!(result.phase, PhaseName::Kind(PhaseKind::Planning));
    assert_eq!(result.output, json!("plan"));
}

#[tokio::test]
async fn test_failed_planning_aborts_chain() {
    let executor = ScriptedModel::ok("executor", json!("never"));
    let chain = ModelChain::new(ScriptedModel::failing("planner"), executor.clone());

    let err = orchestrator()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&speed_task())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "CHAIN_EXECUTION_ERROR");
    let details = err.details();
    assert_eq!(details["phase"], "planning");
    assert_eq!(details["cause"]["code"], "MISSING_PHASE_OUTPUT");
    assert_eq!(details["results"].as_array().unwrap().len(), 1);
    assert_eq!(executor.calls(), 0);
}

#[tokio::test]
async fn test_metrics_aggregate_across_phases() {
    let chain = ModelChain::new(
        ScriptedModel::ok("planner", json!("plan")),
        ScriptedModel::ok("executor", json!("answer")),
    );

    let result = orchestrator()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&speed_task())
        .await
        .unwrap();

    assert_eq!(result.metrics.execution_time, 20.0);
    assert_eq!(result.metrics.total_execution_time, 20.0);
    assert_eq!(result.metrics.tokens_used, 40);
    // Live counters from the model replace the reported latency.
    assert_eq!(result.metrics.latency, 14.0);
    assert_eq!(result.metrics.tokens_processed, 84);
    assert_eq!(result.metrics.peak_memory_usage, 4.0);
}

#[tokio::test]
async fn test_missing_registry_is_no_chain() {
    let err = orchestrator().handle_task(&speed_task()).await.unwrap_err();
    assert_eq!(err.code(), "NO_CHAIN");
}

#[tokio::test]
async fn test_registry_without_match_or_build_is_no_chain() {
    let registry = StaticRegistry::empty();
    let err = orchestrator()
        .with_registry(registry.clone())
        .handle_task(&quality_task())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "NO_CHAIN");
    assert_eq!(registry.suggestions.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_registry_builds_suggested_chain() {
    let registry = StaticRegistry::building();
    let result = orchestrator()
        .with_registry(registry.clone())
        .handle_task(&quality_task())
        .await
        .unwrap();

    assert_eq!(result.output, json!("generic answer"));
    assert_eq!(result.phases[0].model_id, "generic-planner");
    assert_eq!(result.phases[1].model_id, "generic-code-executor");

    let suggestions = registry.suggestions.lock().unwrap();
    let executor = &suggestions[0].executor;
    assert!(executor.capabilities.contains_key(&Capability::Code));
}

#[tokio::test]
async fn test_custom_analyzer_gates_every_task() {
    let planner = ScriptedModel::ok("planner", json!("plan"));
    let chain = ModelChain::new(planner.clone(), ScriptedModel::ok("executor", json!("x")));
    let analyzer = RequirementAnalyzer::with_constraints(ResourceConstraints {
        max_cpu: 0.0,
        ..ResourceConstraints::default()
    });

    let err = orchestrator()
        .with_analyzer(analyzer)
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&speed_task())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_REQUIREMENTS");
    assert_eq!(planner.calls(), 0);
}

#[tokio::test]
async fn test_execute_chain_with_explicit_chain() {
    let task = speed_task();
    let requirements = RequirementAnalyzer::new().analyze(&task).unwrap();
    let chain = ModelChain::new(
        ScriptedModel::ok("planner", json!("plan")),
        ScriptedModel::ok("executor", json!(["a", "b"])),
    );

    let run = orchestrator()
        .execute_chain(&task, &chain, &requirements)
        .await
        .unwrap();
    assert_eq!(run.phases.len(), 2);
    assert_eq!(run.last_success().unwrap().outcome.output, json!(["a", "b"]));
}

#[tokio::test]
async fn test_concurrent_tasks_keep_separate_phase_lists() {
    let planner: Arc<dyn Model> = Arc::new(TaskEcho("planner"));
    let executor: Arc<dyn Model> = Arc::new(TaskEcho("executor"));
    let chain = ModelChain::new(planner, executor);
    let orchestrator = orchestrator().with_registry(StaticRegistry::resolving(chain));

    let first = speed_task();
    let second = quality_task();
    let (a, b) = tokio::join!(
        orchestrator.handle_task(&first),
        orchestrator.handle_task(&second)
    );
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.phases.len(), 2);
    assert_eq!(b.phases.len(), 2);
    for phase in &a.phases {
        assert_eq!(phase.outcome.output["task"], first.id.to_string());
    }
    for phase in &b.phases {
        assert_eq!(phase.outcome.output["task"], second.id.to_string());
    }
    assert_eq!(a.output["phase"], "execution");
}
