//! Stage pipeline: translate → assign → benchmark → score → classify → outputs
//!
//! Each stage reads only what earlier stages produced and returns fresh
//! tables; nothing is mutated after it is handed downstream.

use std::fmt;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::assign::{assign_all, AssignStats, HepSet};
use crate::benchmark::{aggregate, BenchmarkTable};
use crate::classify::{
    classify_groups, classify_papers, summarize, thresholds, ClassSummary, GroupClass, PaperClass,
    ThresholdTable,
};
use crate::config::{AnalysisConfig, Taxonomy};
use crate::error::{Result, RiesError};
use crate::model::{Assignment, Digits, Paper, Scope};
use crate::outputs::{research_outputs, OutputRow};
use crate::progress::{finish_stage, fmt_num, ProgressContext};
use crate::rci::{score_groups, score_papers, Dims, GroupScore, PaperScores, ScoreStats};
use crate::summary::{benchmark_summary, FieldNames, SummaryRow};
use crate::translate::translate_papers;

/// Pipeline stage identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Translate,
    Assign,
    Benchmark,
    Score,
    Classify,
    Outputs,
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::Assign => "assign",
            Self::Benchmark => "benchmark",
            Self::Score => "score",
            Self::Classify => "classify",
            Self::Outputs => "outputs",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tables of one scope at one digit length.
#[derive(Debug, Clone)]
pub struct ScopeOutput {
    pub scope: Scope,
    pub benchmarks: BenchmarkTable,
    pub groupings: Vec<(Dims, Vec<GroupScore>)>,
    pub group_classes: Vec<GroupClass>,
    pub class_summary: Vec<ClassSummary>,
    pub outputs: Vec<(Dims, Vec<OutputRow>)>,
}

/// Tables of one digit length.
#[derive(Debug, Clone)]
pub struct DigitOutput {
    pub digits: Digits,
    pub thresholds: ThresholdTable,
    pub paper_scores: PaperScores,
    pub score_stats: ScoreStats,
    pub paper_classes: Vec<PaperClass>,
    pub summary: Vec<SummaryRow>,
    pub scopes: Vec<ScopeOutput>,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub assignments: Vec<Assignment>,
    pub assign_stats: AssignStats,
    /// Papers whose apportionment was dropped by translation
    pub untranslated: usize,
    pub digits: Vec<DigitOutput>,
}

impl RunOutput {
    /// Number of tables a writer will emit.
    pub fn table_count(&self) -> usize {
        1 + self
            .digits
            .iter()
            .map(|d| {
                4 + d
                    .scopes
                    .iter()
                    .map(|s| 3 + s.groupings.len() + s.outputs.len())
                    .sum::<usize>()
            })
            .sum::<usize>()
    }
}

/// Run every stage over `papers` with a validated configuration.
pub fn run(
    config: &AnalysisConfig,
    mut papers: Vec<Paper>,
    heps: &HepSet,
    names: &FieldNames,
    progress: &ProgressContext,
) -> Result<RunOutput> {
    let started = Instant::now();

    let mut untranslated = 0;
    if config.taxonomy == Taxonomy::Foe {
        let pb = progress.stage_line(Stage::Translate);
        untranslated = translate_papers(&mut papers);
        finish_stage(
            &pb,
            format!("{} papers, {} dropped", fmt_num(papers.len()), fmt_num(untranslated)),
        );
    }

    let pb = progress.stage_line(Stage::Assign);
    let (assignments, assign_stats) = assign_all(&papers, heps, config.window());
    drop(papers);
    assign_stats.log();
    finish_stage(&pb, format!("{} rows", fmt_num(assignments.len())));
    if assignments.is_empty() {
        return Err(RiesError::EmptyPopulation {
            stage: Stage::Assign,
        });
    }

    let mut digits = Vec::with_capacity(config.digits.len());
    for &d in &config.digits {
        if !assignments.iter().any(|a| a.digits() == Some(d)) {
            log::warn!("no {d}-digit field codes in the input, skipping that level");
            continue;
        }
        digits.push(run_digits(config, &assignments, d, names, progress)?);
    }
    if digits.is_empty() {
        return Err(RiesError::EmptyPopulation {
            stage: Stage::Benchmark,
        });
    }

    log::info!(
        "pipeline: {} assignments, {} digit levels in {:.1}s",
        fmt_num(assignments.len()),
        digits.len(),
        started.elapsed().as_secs_f64()
    );
    Ok(RunOutput {
        assignments,
        assign_stats,
        untranslated,
        digits,
    })
}

fn run_digits(
    config: &AnalysisConfig,
    assignments: &[Assignment],
    digits: Digits,
    names: &FieldNames,
    progress: &ProgressContext,
) -> Result<DigitOutput> {
    let pb = progress.stage_line(Stage::Benchmark);
    pb.set_message(format!("{digits}-digit"));
    // both scopes feed the paper scores, whatever the configured scopes
    let world = aggregate(assignments, Scope::World, digits)?;
    let local = aggregate(assignments, Scope::Local, digits)?;
    finish_stage(
        &pb,
        format!("{digits}-digit: {} world, {} local groups", world.len(), local.len()),
    );

    let pb = progress.stage_line(Stage::Score);
    let (paper_scores, score_stats) = score_papers(assignments, digits, &local, &world)?;
    let thresholds = thresholds(&paper_scores, &config.static_boundaries);
    finish_stage(
        &pb,
        format!("{digits}-digit: {} papers", fmt_num(paper_scores.len())),
    );

    let pb = progress.stage_line(Stage::Classify);
    let paper_classes = classify_papers(&paper_scores, &thresholds);
    let summary = benchmark_summary(&world, &local, &thresholds, names);
    finish_stage(
        &pb,
        format!("{digits}-digit: {} papers classed", fmt_num(paper_classes.len())),
    );

    let pb = progress.stage_line(Stage::Outputs);
    let mut scopes = Vec::with_capacity(config.scopes.len());
    for &scope in &config.scopes {
        let benchmarks = match scope {
            Scope::World => world.clone(),
            Scope::Local => local.clone(),
        };
        let groupings: Vec<(Dims, Vec<GroupScore>)> = config
            .groupings
            .iter()
            .map(|&dims| (dims, score_groups(assignments, &paper_scores, scope, dims)))
            .collect();
        let full = match groupings.iter().find(|(dims, _)| *dims == Dims::ALL) {
            Some((_, groups)) => classify_groups(groups, &thresholds),
            None => classify_groups(
                &score_groups(assignments, &paper_scores, scope, Dims::ALL),
                &thresholds,
            ),
        };
        let class_summary = summarize(assignments, &paper_classes, digits, scope);
        let outputs = config
            .groupings
            .iter()
            .map(|&dims| (dims, research_outputs(assignments, scope, digits, dims)))
            .collect();
        log::debug!(
            "outputs: {scope} {digits}-digit, {} class summaries",
            class_summary.len()
        );
        scopes.push(ScopeOutput {
            scope,
            benchmarks,
            groupings,
            group_classes: full,
            class_summary,
            outputs,
        });
    }
    finish_stage(&pb, format!("{digits}-digit: {} scopes", scopes.len()));

    Ok(DigitOutput {
        digits,
        thresholds,
        paper_scores,
        score_stats,
        paper_classes,
        summary,
        scopes,
    })
}
