//! Task requirement analysis.

mod analyzer;

pub use analyzer::{
    RequirementAnalyzer, SuggestedChain, LARGE_INPUT_CHARS, PRIMARY_MIN_SCORE, SECONDARY_MIN_SCORE,
};
