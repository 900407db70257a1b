//! Write every table of a run as `{table}.parquet` in one directory

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use rayon::prelude::*;
use ries_core::{fmt_num, Digits, Dims, RunOutput, Scope};

use crate::sink::{cleanup_tmp_files, ParquetSink};
use crate::tables::{
    Accumulator, AssignmentAccumulator, BenchmarkAccumulator, ClassSummaryAccumulator,
    GroupClassAccumulator, GroupScoreAccumulator, OutputAccumulator, PaperClassAccumulator,
    PaperScoreAccumulator, SummaryAccumulator, ThresholdAccumulator,
};

/// A finalized output table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenTable {
    pub name: String,
    pub rows: usize,
}

pub const ASSIGNMENTS_TABLE: &str = "core_assignments";

pub fn benchmarks_table(scope: Scope, d: Digits) -> String {
    format!("benchmarks_{scope}_{d}")
}

pub fn thresholds_table(d: Digits) -> String {
    format!("benchmarks_rci_world_{d}")
}

pub fn summary_table(d: Digits) -> String {
    format!("benchmarks_summary_{d}")
}

pub fn paper_scores_table(d: Digits) -> String {
    format!("rci_papers_{d}")
}

pub fn grouping_table(scope: Scope, d: Digits, dims: Dims) -> String {
    format!("rci_grouping_{scope}_{d}_{dims}")
}

pub fn paper_classes_table(d: Digits) -> String {
    format!("rci_classes_papers_{d}")
}

pub fn group_classes_table(scope: Scope, d: Digits) -> String {
    format!("rci_classes_fields_{scope}_{d}")
}

pub fn class_summary_table(scope: Scope, d: Digits) -> String {
    format!("rci_classes_summary_{scope}_{d}")
}

pub fn outputs_table(scope: Scope, d: Digits, dims: Dims) -> String {
    format!("research_outputs_{scope}_{d}_{dims}")
}

/// Names of every table `write_run` emits for `out`, in write order.
pub fn table_names(out: &RunOutput) -> Vec<String> {
    let mut names = Vec::with_capacity(out.table_count());
    names.push(ASSIGNMENTS_TABLE.to_string());
    for level in &out.digits {
        let d = level.digits;
        names.extend([
            thresholds_table(d),
            summary_table(d),
            paper_scores_table(d),
            paper_classes_table(d),
        ]);
        for s in &level.scopes {
            names.push(benchmarks_table(s.scope, d));
            names.extend(
                s.groupings
                    .iter()
                    .map(|(dims, _)| grouping_table(s.scope, d, *dims)),
            );
            names.push(group_classes_table(s.scope, d));
            names.push(class_summary_table(s.scope, d));
            names.extend(
                s.outputs
                    .iter()
                    .map(|(dims, _)| outputs_table(s.scope, d, *dims)),
            );
        }
    }
    names
}

/// Stream `rows` through `acc` into `{dir}/{name}.parquet`.
fn write_table<'a, A, I>(
    dir: &Path,
    name: &str,
    zstd_level: i32,
    mut acc: A,
    rows: I,
) -> Result<WrittenTable>
where
    A: Accumulator,
    A::Row: 'a,
    I: IntoIterator<Item = &'a A::Row>,
{
    let mut sink = ParquetSink::new(name, dir, acc.schema(), zstd_level)
        .with_context(|| format!("creating table {name}"))?;
    for row in rows {
        acc.push(row);
        if acc.is_full() {
            let batch = acc.take_batch()?;
            sink.write_batch(&batch)
                .with_context(|| format!("writing table {name}"))?;
        }
    }
    if !acc.is_empty() {
        let batch = acc.take_batch()?;
        sink.write_batch(&batch)
            .with_context(|| format!("writing table {name}"))?;
    }
    let rows = sink
        .finalize()
        .with_context(|| format!("finalizing table {name}"))?;
    log::debug!("wrote {name}: {} rows", fmt_num(rows));
    Ok(WrittenTable {
        name: name.to_string(),
        rows,
    })
}

type Job<'a> = Box<dyn FnOnce() -> Result<WrittenTable> + Send + 'a>;

/// Write all tables of `out` into `dir`, one rayon task per table.
///
/// Stale `.tmp` files are removed first. Returns the tables sorted by name.
pub fn write_run(
    out: &RunOutput,
    dir: &Path,
    zstd_level: i32,
    pb: &ProgressBar,
) -> Result<Vec<WrittenTable>> {
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    cleanup_tmp_files(dir).with_context(|| format!("cleaning {}", dir.display()))?;

    let z = zstd_level;
    let mut jobs: Vec<Job<'_>> = Vec::with_capacity(out.table_count());
    jobs.push(Box::new(move || {
        write_table(dir, ASSIGNMENTS_TABLE, z, AssignmentAccumulator::default(), &out.assignments)
    }));
    for level in &out.digits {
        let d = level.digits;
        jobs.push(Box::new(move || {
            write_table(
                dir,
                &thresholds_table(d),
                z,
                ThresholdAccumulator::default(),
                level.thresholds.iter(),
            )
        }));
        jobs.push(Box::new(move || {
            write_table(dir, &summary_table(d), z, SummaryAccumulator::default(), &level.summary)
        }));
        jobs.push(Box::new(move || {
            write_table(
                dir,
                &paper_scores_table(d),
                z,
                PaperScoreAccumulator::default(),
                level.paper_scores.rows(),
            )
        }));
        jobs.push(Box::new(move || {
            write_table(
                dir,
                &paper_classes_table(d),
                z,
                PaperClassAccumulator::default(),
                &level.paper_classes,
            )
        }));

        for s in &level.scopes {
            let scope = s.scope;
            jobs.push(Box::new(move || {
                write_table(
                    dir,
                    &benchmarks_table(scope, d),
                    z,
                    BenchmarkAccumulator::default(),
                    s.benchmarks.iter(),
                )
            }));
            for (dims, groups) in &s.groupings {
                let dims = *dims;
                jobs.push(Box::new(move || {
                    write_table(
                        dir,
                        &grouping_table(scope, d, dims),
                        z,
                        GroupScoreAccumulator::new(dims),
                        groups,
                    )
                }));
            }
            jobs.push(Box::new(move || {
                write_table(
                    dir,
                    &group_classes_table(scope, d),
                    z,
                    GroupClassAccumulator::default(),
                    &s.group_classes,
                )
            }));
            jobs.push(Box::new(move || {
                write_table(
                    dir,
                    &class_summary_table(scope, d),
                    z,
                    ClassSummaryAccumulator::default(),
                    &s.class_summary,
                )
            }));
            for (dims, rows) in &s.outputs {
                let dims = *dims;
                jobs.push(Box::new(move || {
                    write_table(
                        dir,
                        &outputs_table(scope, d, dims),
                        z,
                        OutputAccumulator::new(dims),
                        rows,
                    )
                }));
            }
        }
    }

    pb.set_length(jobs.len() as u64);
    let mut written: Vec<WrittenTable> = jobs
        .into_par_iter()
        .map(|job| {
            let table = job()?;
            pb.inc(1);
            Ok(table)
        })
        .collect::<Result<_>>()?;
    written.sort_by(|a, b| a.name.cmp(&b.name));

    let rows: usize = written.iter().map(|t| t.rows).sum();
    log::info!(
        "wrote {} tables ({} rows) to {}",
        written.len(),
        fmt_num(rows),
        dir.display()
    );
    Ok(written)
}
