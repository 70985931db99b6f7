use serde_json::{json, Value};
use thiserror::Error;

/// Metrics-only view of a phase, attached to chain execution errors.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseSnapshot {
    pub phase: String,
    pub status: String,
    pub metrics: crate::core::Metrics,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("No home directory")]
    NoHomeDir,

    #[error("Invalid requirements: {0}")]
    InvalidRequirements(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Model {model} failed: {message}")]
    Model { model: String, message: String },

    #[error("{phase} failed after {attempts} attempts: {last_error}")]
    RetryExhausted {
        phase: String,
        model: String,
        attempts: u32,
        last_error: Box<Error>,
    },

    #[error("Phase {phase} produced no usable output")]
    MissingPhaseOutput { phase: String },

    #[error("No phase completed successfully ({phases} attempted)")]
    NoSuccessfulPhase { phases: usize },

    #[error("No model chain available for task {task}")]
    NoChain { task: String },

    #[error("Chain execution failed during {phase}: {source}")]
    ChainExecution {
        phase: String,
        #[source]
        source: Box<Error>,
        snapshot: Vec<PhaseSnapshot>,
    },

    #[error("No results to combine")]
    NoResults,

    #[error("Invalid result at index {index}: {reason}")]
    InvalidResult { index: usize, reason: String },

    #[error("Validation error: {0}")]
    Validation(String),
}

impl Error {
    /// Create a model failure, the error a `Model` raises for a transient fault.
    pub fn model(model: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Model {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::Io(_) => "IO_ERROR",
            Error::Json(_) => "JSON_ERROR",
            Error::TomlParse(_) => "TOML_PARSE_ERROR",
            Error::TomlSerialize(_) => "TOML_SERIALIZE_ERROR",
            Error::NoHomeDir => "NO_HOME_DIR",
            Error::InvalidRequirements(_) => "INVALID_REQUIREMENTS",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Model { .. } => "MODEL_ERROR",
            Error::RetryExhausted { .. } => "RETRY_EXHAUSTED",
            Error::MissingPhaseOutput { .. } => "MISSING_PHASE_OUTPUT",
            Error::NoSuccessfulPhase { .. } => "NO_SUCCESSFUL_PHASE",
            Error::NoChain { .. } => "NO_CHAIN",
            Error::ChainExecution { .. } => "CHAIN_EXECUTION_ERROR",
            Error::NoResults => "NO_RESULTS",
            Error::InvalidResult { .. } => "INVALID_RESULT",
            Error::Validation(_) => "VALIDATION_ERROR",
        }
    }

    /// Structured details for callers that need more than the message.
    pub fn details(&self) -> Value {
        match self {
            Error::Model { model, message } => json!({ "model": model, "message": message }),
            Error::RetryExhausted {
                phase,
                model,
                attempts,
                last_error,
            } => json!({
                "phase": phase,
                "model": model,
                "attempts": attempts,
                "lastError": {
                    "code": last_error.code(),
                    "message": last_error.to_string(),
                },
            }),
            Error::MissingPhaseOutput { phase } => json!({ "phase": phase }),
            Error::NoSuccessfulPhase { phases } => json!({ "phases": phases }),
            Error::NoChain { task } => json!({ "task": task }),
            Error::ChainExecution {
                phase,
                source,
                snapshot,
            } => json!({
                "phase": phase,
                "cause": { "code": source.code(), "details": source.details() },
                "results": snapshot,
            }),
            Error::InvalidResult { index, reason } => json!({ "index": index, "reason": reason }),
            other => json!({ "message": other.to_string() }),
        }
    }

    /// Whether the fault came from an upstream model and may clear on a later call.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Model { .. } | Error::RetryExhausted { .. } => true,
            Error::ChainExecution { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
