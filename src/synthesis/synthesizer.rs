//! Result synthesizer merging phase outputs into one answer.
//!
//! The `ResultSynthesizer` validates an ordered list of outcomes, combines
//! their outputs by type, sums their metrics and then formats the answer
//! with an inferred presentation format and schema.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::Metrics;
use crate::error::{Error, Result};
use crate::orchestration::{ModelOutcome, ModelResult, PhaseKind, PhaseResult, PhaseStatus};
use crate::{mlog_debug, mlog_warn};

use super::format::{
    detect_format, indent_code, infer_schema, wrap_text, FormatOptions, OutputFormat,
};

/// Metric fields every input must carry as numbers.
const REQUIRED_METRICS: [&str; 3] = ["executionTime", "memoryUsed", "tokensUsed"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SynthesizerConfig {
    /// Validate inputs before combining and the result after.
    pub validate_results: bool,
    /// Require every phase to complete for overall success.
    pub require_all_phases: bool,
    pub format_options: FormatOptions,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self {
            validate_results: true,
            require_all_phases: false,
            format_options: FormatOptions::default(),
        }
    }
}

/// One input, labelled for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedPhase {
    pub name: String,
    pub status: PhaseStatus,
    pub result: ModelOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultMetadata {
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub total_phases: usize,
    pub successful_phases: usize,
    pub failed_phases: usize,
}

/// The combined answer of several outcomes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CombinedResult {
    pub output: Value,
    pub phases: Vec<SynthesizedPhase>,
    pub metrics: Metrics,
    pub metadata: ResultMetadata,
}

impl CombinedResult {
    pub fn is_success(&self) -> bool {
        self.metadata.success
    }
}

/// A combined answer tagged with how to present it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormattedResult {
    pub output: Value,
    pub format: OutputFormat,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ResultMetadata>,
}

impl From<&ModelResult> for ModelOutcome {
    fn from(result: &ModelResult) -> Self {
        ModelOutcome {
            success: result.success,
            output: result.output.clone(),
            metrics: result.metrics,
            error: None,
        }
    }
}

impl From<&PhaseResult> for ModelOutcome {
    fn from(result: &PhaseResult) -> Self {
        result.outcome.clone()
    }
}

impl From<&CombinedResult> for ModelOutcome {
    fn from(result: &CombinedResult) -> Self {
        ModelOutcome {
            success: result.metadata.success,
            output: result.output.clone(),
            metrics: result.metrics,
            error: None,
        }
    }
}

/// Display label for the input at `index`.
pub fn phase_label(index: usize) -> String {
    match PhaseKind::ORDER.get(index) {
        Some(kind) => kind.to_string(),
        None => format!("phase_{}", index + 1),
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultSynthesizer {
    config: SynthesizerConfig,
}

impl ResultSynthesizer {
    pub fn new(config: SynthesizerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Combine outcomes, in phase order, into one result.
    ///
    /// # Errors
    ///
    /// `Error::NoResults` for empty input, `Error::InvalidResult` when an
    /// input's metrics are unusable, and `Error::Validation` if the combined
    /// result is inconsistent.
    pub fn combine(&self, results: &[ModelOutcome]) -> Result<CombinedResult> {
        if results.is_empty() {
            return Err(Error::NoResults);
        }

        if self.config.validate_results {
            for (index, result) in results.iter().enumerate() {
                if let Some(field) = result.metrics.invalid_field() {
                    mlog_warn!("synthesis rejected input {}: bad {}", index, field);
                    return Err(Error::InvalidResult {
                        index,
                        reason: format!("metrics.{} must be a finite, non-negative number", field),
                    });
                }
            }
        }

        let phases: Vec<SynthesizedPhase> = results
            .iter()
            .enumerate()
            .map(|(i, r)| SynthesizedPhase {
                name: phase_label(i),
                status: if r.success {
                    PhaseStatus::Completed
                } else {
                    PhaseStatus::Failed
                },
                result: r.clone(),
            })
            .collect();

        let successful_phases = phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Completed)
            .count();
        let metadata = ResultMetadata {
            timestamp: Utc::now(),
            success: self.overall_success(&phases),
            total_phases: phases.len(),
            successful_phases,
            failed_phases: phases.len() - successful_phases,
        };

        let combined = CombinedResult {
            output: combine_outputs(results),
            metrics: sum_metrics(results),
            phases,
            metadata,
        };

        if self.config.validate_results {
            self.validate(&combined)?;
        }

        mlog_debug!(
            "synthesis combined {} results success={} ({} completed)",
            combined.metadata.total_phases,
            combined.metadata.success,
            combined.metadata.successful_phases
        );
        Ok(combined)
    }

    /// Combine loosely-typed outcomes, checking their shape first.
    pub fn combine_json(&self, values: &[Value]) -> Result<CombinedResult> {
        let outcomes = values
            .iter()
            .enumerate()
            .map(|(index, value)| decode_outcome(index, value))
            .collect::<Result<Vec<_>>>()?;
        self.combine(&outcomes)
    }

    /// Re-check a combined result against its own phase statuses.
    pub fn validate(&self, result: &CombinedResult) -> Result<()> {
        if result.phases.is_empty() {
            return Err(Error::Validation("result has no phases".into()));
        }
        for (i, phase) in result.phases.iter().enumerate() {
            if phase.name.trim().is_empty() {
                return Err(Error::Validation(format!("phase {} has no name", i)));
            }
        }

        let expected = self.overall_success(&result.phases);
        if result.metadata.success != expected {
            return Err(Error::Validation(format!(
                "success flag {} disagrees with phase statuses (expected {}, requireAllPhases={})",
                result.metadata.success, expected, self.config.require_all_phases
            )));
        }
        Ok(())
    }

    /// Tag the combined output with a presentation format and schema.
    pub fn format(&self, result: &CombinedResult) -> FormattedResult {
        let mut formatted = self.format_output(&result.output);
        if self.config.format_options.include_metadata {
            formatted.metadata = Some(result.metadata.clone());
        }
        formatted
    }

    /// Format a bare output value; no metadata is attached.
    pub fn format_output(&self, output: &Value) -> FormattedResult {
        let options = &self.config.format_options;
        let format = detect_format(output);

        let (output, schema) = match (format, output) {
            (OutputFormat::Code, Value::String(code)) => {
                (Value::String(indent_code(code, options.indent_size)), None)
            }
            (OutputFormat::Text, Value::String(text)) => {
                (Value::String(wrap_text(text, options.max_line_length)), None)
            }
            (OutputFormat::Json | OutputFormat::Structured, value) => {
                (value.clone(), Some(infer_schema(value)))
            }
            (_, value) => (value.clone(), None),
        };

        FormattedResult {
            output,
            format,
            schema,
            metadata: None,
        }
    }

    fn overall_success(&self, phases: &[SynthesizedPhase]) -> bool {
        let completed = |p: &SynthesizedPhase| p.status == PhaseStatus::Completed;
        if self.config.require_all_phases {
            phases.iter().all(completed)
        } else {
            phases.iter().any(completed)
        }
    }
}

/// Merge outputs by type.
///
/// A single input passes through untouched. Otherwise successful outputs are
/// joined when all strings, concatenated when all arrays and shallow-merged
/// when all objects. Anything else yields every input's raw output,
/// failures included.
fn combine_outputs(results: &[ModelOutcome]) -> Value {
    if let [only] = results {
        return only.output.clone();
    }

    let successful: Vec<&Value> = results
        .iter()
        .filter(|r| r.success)
        .map(|r| &r.output)
        .collect();

    if !successful.is_empty() {
        if let Some(texts) = successful
            .iter()
            .map(|v| v.as_str())
            .collect::<Option<Vec<_>>>()
        {
            return Value::String(texts.join("\n\n"));
        }

        if let Some(arrays) = successful
            .iter()
            .map(|v| v.as_array())
            .collect::<Option<Vec<_>>>()
        {
            return Value::Array(arrays.into_iter().flatten().cloned().collect());
        }

        if let Some(objects) = successful
            .iter()
            .map(|v| v.as_object())
            .collect::<Option<Vec<_>>>()
        {
            let mut merged = Map::new();
            for object in objects {
                for (k, v) in object {
                    merged.insert(k.clone(), v.clone());
                }
            }
            return Value::Object(merged);
        }
    }

    Value::Array(results.iter().map(|r| r.output.clone()).collect())
}

/// Sum metrics, deriving running totals from each input's own figures.
fn sum_metrics(results: &[ModelOutcome]) -> Metrics {
    let sealed: Vec<Metrics> = results.iter().map(|r| r.metrics.with_totals()).collect();
    Metrics::aggregate(&sealed)
}

fn decode_outcome(index: usize, value: &Value) -> Result<ModelOutcome> {
    let invalid = |reason: String| Error::InvalidResult { index, reason };

    if !value.get("success").is_some_and(Value::is_boolean) {
        return Err(invalid("success must be a boolean".into()));
    }
    let metrics = value.get("metrics");
    for field in REQUIRED_METRICS {
        if !metrics.and_then(|m| m.get(field)).is_some_and(Value::is_number) {
            return Err(invalid(format!("metrics.{} must be a number", field)));
        }
    }

    serde_json::from_value(value.clone()).map_err(|e| invalid(e.to_string()))
}
