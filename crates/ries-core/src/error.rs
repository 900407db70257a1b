//! Error taxonomy for the analysis stages
//!
//! Per-record problems (unmapped codes, missing benchmarks, zero denominators)
//! are recovered inside the stage that sees them and only show up in stage
//! statistics. The variants here are the failures that abort a run.

use crate::pipeline::Stage;

/// Failure surfaced by an analysis stage or by configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum RiesError {
    /// Malformed input that cannot be degraded to a safe default.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A stage was invoked before its upstream table was produced.
    #[error("{stage}: upstream table '{missing}' is missing or empty")]
    StageDependency { stage: Stage, missing: &'static str },

    /// The stage input exists but yields no population to aggregate over.
    #[error("{stage}: no papers left to aggregate")]
    EmptyPopulation { stage: Stage },

    /// Analysis configuration rejected during validation.
    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T, E = RiesError> = std::result::Result<T, E>;

/// Ratio with the zero-denominator policy applied: `0.0` instead of NaN/inf.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator == 0.0 {
        return 0.0;
    }
    let value = numerator / denominator;
    if value.is_finite() { value } else { 0.0 }
}
