//! Retry behavior as observed through whole chain executions.

use serde_json::json;
use std::time::Duration;

use modelchain::orchestration::{PhaseKind, PhaseStatus};
use modelchain::{ChainOrchestrator, ModelChain, OrchestratorConfig};

use crate::fixtures::{speed_task, ScriptedModel, Step, StaticRegistry};

#[tokio::test]
async fn test_logical_failures_then_success() {
    let executor = ScriptedModel::new(
        "executor",
        vec![
            Step::Fail("not yet"),
            Step::Fail("still not"),
            Step::Succeed(json!("third time")),
        ],
    );
    let chain = ModelChain::new(ScriptedModel::ok("planner", json!("plan")), executor.clone());

    let result = ChainOrchestrator::new(OrchestratorConfig::default())
        .unwrap()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&speed_task())
        .await
        .unwrap();

    assert_eq!(executor.calls(), 3);
    assert_eq!(result.output, json!("third time"));
    assert_eq!(result.phases[1].status, PhaseStatus::Completed);
}

#[tokio::test]
async fn test_persistent_logical_failure_returns_last_failure() {
    let executor = ScriptedModel::new(
        "executor",
        vec![Step::Fail("first"), Step::Fail("second"), Step::Fail("last")],
    );
    let chain = ModelChain::new(ScriptedModel::ok("planner", json!("plan")), executor.clone());

    let result = ChainOrchestrator::new(OrchestratorConfig::default())
        .unwrap()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&speed_task())
        .await
        .unwrap();

    assert_eq!(executor.calls(), 3);
    let execution = &result.phases[1];
    assert_eq!(execution.status, PhaseStatus::Failed);
    assert_eq!(execution.outcome.error.as_deref(), Some("last"));
}

#[tokio::test(start_paused = true)]
async fn test_raising_planner_exhausts_retries_with_backoff() {
    let planner = ScriptedModel::raising("planner");
    let chain = ModelChain::new(planner.clone(), ScriptedModel::ok("executor", json!("x")));
    let orchestrator = ChainOrchestrator::new(OrchestratorConfig::with_max_retries(4))
        .unwrap()
        .with_registry(StaticRegistry::resolving(chain));

    let start = tokio::time::Instant::now();
    let err = orchestrator.handle_task(&speed_task()).await.unwrap_err();
    let elapsed = start.elapsed();

    assert_eq!(planner.calls(), 4);
    // 2s + 4s + 8s between four attempts, none after the last.
    assert!(elapsed >= Duration::from_millis(14_000));
    assert!(elapsed < Duration::from_millis(14_100));

    assert_eq!(err.code(), "CHAIN_EXECUTION_ERROR");
    let details = err.details();
    assert_eq!(details["phase"], "planning");
    assert_eq!(details["cause"]["code"], "RETRY_EXHAUSTED");
    assert_eq!(details["cause"]["details"]["attempts"], 4);
    assert_eq!(details["cause"]["details"]["model"], "planner");
    assert_eq!(details["cause"]["details"]["lastError"]["code"], "MODEL_ERROR");
    assert!(details["results"].as_array().unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_raise_then_recover() {
    let planner = ScriptedModel::new(
        "planner",
        vec![Step::Raise("timeout"), Step::Succeed(json!("plan"))],
    );
    let chain = ModelChain::new(planner.clone(), ScriptedModel::ok("executor", json!("done")));

    let result = ChainOrchestrator::new(OrchestratorConfig::default())
        .unwrap()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&speed_task())
        .await
        .unwrap();

    assert_eq!(planner.calls(), 2);
    assert_eq!(result.phases[0].phase.kind(), PhaseKind::Planning);
    assert_eq!(result.output, json!("done"));
}

#[tokio::test(start_paused = true)]
async fn test_raising_reviewer_keeps_earlier_snapshot() {
    let chain = ModelChain::new(
        ScriptedModel::ok("planner", json!("plan")),
        ScriptedModel::ok("executor", json!("draft")),
    )
    .with_reviewer(ScriptedModel::raising("reviewer"));

    let err = ChainOrchestrator::new(OrchestratorConfig::default())
        .unwrap()
        .with_registry(StaticRegistry::resolving(chain))
        .handle_task(&crate::fixtures::quality_task())
        .await
        .unwrap_err();

    let details = err.details();
    assert_eq!(details["phase"], "review");
    let results = details["results"].as_array().unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0]["phase"], "planning");
    assert_eq!(results[1]["status"], "completed");
}
