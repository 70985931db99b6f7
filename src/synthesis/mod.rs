//! Synthesis of phase outputs into one externally consumable answer.

mod format;
mod synthesizer;

pub use format::{
    detect_format, indent_code, infer_schema, is_nested, looks_like_code, wrap_text,
    FormatOptions, OutputFormat,
};
pub use synthesizer::{
    phase_label, CombinedResult, FormattedResult, ResultMetadata, ResultSynthesizer,
    SynthesizedPhase, SynthesizerConfig,
};
