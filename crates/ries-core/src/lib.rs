//! RIES Core - research-evaluation benchmark and RCI classification engine
//!
//! Turns paper-level citation and field-apportionment data into citation
//! benchmarks, relative citation impact scores, ordinal classes and
//! research-output indicators. Storage-agnostic: every stage takes and
//! returns in-memory tables.

pub mod assign;
pub mod benchmark;
pub mod classify;
pub mod config;
pub mod error;
pub mod logging;
pub mod model;
pub mod normalize;
pub mod outputs;
pub mod pipeline;
pub mod progress;
pub mod rci;
pub mod summary;
pub mod translate;

// Re-exports for convenience
pub use assign::{AssignStats, HepSet, YearWindow, assign, assign_all};
pub use benchmark::{Benchmark, BenchmarkTable, Centiles, aggregate};
pub use classify::{
    ClassSummary, Classes, DEFAULT_STATIC_BOUNDARIES, GroupClass, PaperClass, ThresholdTable,
    classify,
};
pub use config::{AnalysisConfig, Taxonomy, validate_version};
pub use error::{Result, RiesError, ratio};
pub use logging::{IndicatifLogger, init_logging};
pub use model::{Apportionment, Assignment, Digits, Paper, Scope};
pub use normalize::normalize;
pub use outputs::OutputRow;
pub use pipeline::{DigitOutput, RunOutput, ScopeOutput, Stage, run};
pub use progress::{ProgressContext, fmt_num};
pub use rci::{Dims, GroupKey, GroupScore, PaperScore, PaperScores, Rci, weighted_mean};
pub use summary::{FieldNames, SummaryRow, round_dp};
pub use translate::translate;
