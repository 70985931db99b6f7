//! Core data model: tasks, requirements and metrics.

pub mod metrics;
pub mod requirements;
pub mod task;

pub use metrics::{Metrics, ResourceMetrics, TokenStats};
pub use requirements::{
    select_best, Capability, ModelCapabilities, ModelCapabilityScore, ModelProfile, Priority,
    ResourceConstraints, TaskRequirements,
};
pub use task::{Task, TaskId};
