//! Orchestration layer for model chains.
//!
//! This module defines the contract external models and registries fulfil,
//! the retry policy applied to every model call, and the `ChainOrchestrator`
//! that sequences planning, context, execution and review phases.

mod chain;
mod model;
mod phase;
mod retry;

pub use chain::{ChainOrchestrator, ChainRun};
pub use model::{Model, ModelChain, ModelRegistry, ModelRequest};
pub use phase::{ModelOutcome, ModelResult, PhaseKind, PhaseName, PhaseResult, PhaseStatus};
pub use retry::{with_retry, OrchestratorConfig, DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE_DELAY_MS};
