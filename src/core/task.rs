//! Task data model.
//!
//! A task is created by the caller and stays read-only while it moves
//! through analysis, chain execution and synthesis.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::requirements::TaskRequirements;

/// Unique identifier for a task.
///
/// Uses UUID v4 for generation and provides a short form display
/// for human-readable output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    /// Create a new unique task identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Return first 8 characters of the UUID for display.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A unit of work submitted to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique identifier for this task.
    pub id: TaskId,
    /// Free-form type tag, e.g. `code_generation` or `summarization`.
    #[serde(rename = "type")]
    pub task_type: String,
    /// What the task should accomplish.
    pub description: String,
    /// Opaque input payload handed to every model.
    #[serde(default)]
    pub input: Value,
    /// Caller-supplied requirements that bypass inference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirements: Option<TaskRequirements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl Task {
    /// Create a new task with a fresh identifier.
    pub fn new(task_type: impl Into<String>, description: impl Into<String>, input: Value) -> Self {
        Self {
            id: TaskId::new(),
            task_type: task_type.into(),
            description: description.into(),
            input,
            requirements: None,
            metadata: None,
        }
    }

    pub fn with_id(mut self, id: TaskId) -> Self {
        self.id = id;
        self
    }

    /// Pin the requirements instead of letting the analyzer infer them.
    pub fn with_requirements(mut self, requirements: TaskRequirements) -> Self {
        self.requirements = Some(requirements);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// Look up a metadata string value.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }
}
