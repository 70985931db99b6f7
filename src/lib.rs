//! Multi-phase model chain orchestration.
//!
//! A task flows through three components:
//! - `analysis`: derives structured requirements from a task
//! - `orchestration`: runs planning, context, execution and review phases
//!   over a registry-supplied chain with retries and fallback executors
//! - `synthesis`: merges phase outputs into one formatted answer

pub mod config;
pub mod error;
pub mod log;

pub mod analysis;
pub mod core;
pub mod orchestration;
pub mod synthesis;

pub use analysis::{RequirementAnalyzer, SuggestedChain};
pub use config::Config;
pub use core::{Capability, Metrics, Priority, Task, TaskId, TaskRequirements};
pub use error::{Error, Result};
pub use orchestration::{
    ChainOrchestrator, Model, ModelChain, ModelOutcome, ModelRegistry, ModelResult,
    OrchestratorConfig, PhaseResult,
};
pub use synthesis::{CombinedResult, FormattedResult, ResultSynthesizer, SynthesizerConfig};
