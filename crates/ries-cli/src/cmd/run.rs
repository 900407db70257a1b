//! `ries run` - run the pipeline from run.toml into the run store

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Args;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};
use indicatif::{ProgressBar, ProgressStyle};

use ries_core::{fmt_num, AnalysisConfig, FieldNames, ProgressContext, RunOutput, Taxonomy};
use ries_io::{read_field_names, read_heps, read_papers, resolve_inputs, write_run, WrittenTable};
use ries_store::{InputFiles, LookupResult, RunConfig, RunInput, RunManifest, Store};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Path to run.toml
    pub run_config: PathBuf,

    /// Rerun even when the stored run is current
    #[arg(long)]
    pub force: bool,

    /// Show the run plan without executing
    #[arg(long)]
    pub dry_run: bool,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,
}

#[derive(Debug, Clone, Copy)]
enum RunStatus {
    Cached,
    NeedsRun,
    Forced,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Cached => write!(f, "CACHED"),
            Self::NeedsRun => write!(f, "NEEDS_RUN"),
            Self::Forced => write!(f, "FORCED"),
        }
    }
}

/// Everything resolved from run.toml and the global config.
struct RunPlan {
    run_config: RunConfig,
    version: String,
    analysis: AnalysisConfig,
    zstd_level: i32,
    output: PathBuf,
    workers: usize,
    files: InputFiles,
    input: RunInput,
}

impl RunPlan {
    fn resolve(args: &RunArgs, config: &Config) -> Result<Self> {
        let run_config = RunConfig::from_file(&args.run_config)?;
        let version = run_config.version()?;
        let analysis = run_config
            .analysis()
            .with_context(|| format!("invalid [analysis] in {}", args.run_config.display()))?;
        let zstd_level = run_config.zstd_level(config.output.compression_level);
        let output = run_config.output_dir(&config.output.default_dir);
        let workers = config.workers(args.workers);

        let files = InputFiles {
            papers: resolve_inputs(&run_config.inputs.papers)?,
            heps: resolve_inputs(&run_config.inputs.heps)?,
            fields: run_config.inputs.fields.clone(),
        };
        let input = RunInput::new(&version, &analysis, zstd_level, &files)?;

        Ok(Self {
            run_config,
            version,
            analysis,
            zstd_level,
            output,
            workers,
            files,
            input,
        })
    }

    fn print(&self, status: RunStatus) {
        let digits: Vec<String> = self.analysis.digits.iter().map(|d| d.to_string()).collect();
        let scopes: Vec<String> = self.analysis.scopes.iter().map(|s| s.to_string()).collect();

        let mut table = settings_table();
        table.add_row(vec!["Version", &self.version]);
        table.add_row(vec!["Input hash", &self.input.short_hash()]);
        table.add_row(vec![
            Cell::new("Status"),
            match status {
                RunStatus::Cached => Cell::new(status).fg(Color::Green),
                RunStatus::NeedsRun | RunStatus::Forced => Cell::new(status).fg(Color::Yellow),
            },
        ]);
        table.add_row(vec!["Output", &self.output.display().to_string()]);
        table.add_row(vec!["Paper files", &self.files.papers.len().to_string()]);
        table.add_row(vec!["HEP files", &self.files.heps.len().to_string()]);
        table.add_row(vec![
            "Field names",
            &self
                .files
                .fields
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "-".into()),
        ]);
        table.add_row(vec![
            "Taxonomy",
            match self.analysis.taxonomy {
                Taxonomy::For => "for",
                Taxonomy::Foe => "foe",
            },
        ]);
        table.add_row(vec![
            "Years",
            &format!("{}..={}", self.analysis.start, self.analysis.finish),
        ]);
        table.add_row(vec!["Digits", &digits.join(", ")]);
        table.add_row(vec!["Scopes", &scopes.join(", ")]);
        table.add_row(vec!["Groupings", &self.analysis.groupings.len().to_string()]);
        table.add_row(vec!["Tables (max)", &self.analysis.table_count().to_string()]);
        table.add_row(vec!["Workers", &self.workers.to_string()]);
        table.add_row(vec!["zstd level", &self.zstd_level.to_string()]);
        eprintln!("\n{table}");
    }
}

pub fn run(args: RunArgs, config: &Config, progress: &ProgressContext) -> Result<()> {
    let plan = RunPlan::resolve(&args, config)?;
    let store = Store::new(&plan.output)?;

    let stale = store.cleanup_tmp()?;
    if stale > 0 {
        log::info!("removed {stale} stale staging dirs");
    }

    let (status, cached) = match store.lookup(&plan.input) {
        LookupResult::Cached { path, manifest } if !args.force => {
            (RunStatus::Cached, Some((path, manifest)))
        }
        LookupResult::Cached { .. } => (RunStatus::Forced, None),
        LookupResult::NeedsRun => (RunStatus::NeedsRun, None),
    };
    plan.print(status);

    if let Some((path, manifest)) = cached {
        eprintln!(
            "Run {} is current: {} tables, {} rows in {}",
            plan.version,
            manifest.tables.len(),
            fmt_num(manifest.total_rows()),
            path.display()
        );
        eprintln!("Use --force to rerun.");
        return Ok(());
    }
    if args.dry_run {
        eprintln!("(dry-run mode, no execution)");
        return Ok(());
    }

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(plan.workers)
        .build()
        .context("failed to build thread pool")?;

    let started = Instant::now();
    let (out, written, manifest) = pool.install(|| execute(&plan, &store, progress))?;
    log::info!(
        "run {}: {} tables committed in {:.1}s",
        plan.version,
        written.len(),
        started.elapsed().as_secs_f64()
    );

    print_summary(&plan, &store, &out, &written, &manifest);
    Ok(())
}

fn execute(
    plan: &RunPlan,
    store: &Store,
    progress: &ProgressContext,
) -> Result<(RunOutput, Vec<WrittenTable>, RunManifest)> {
    let inputs = &plan.run_config.inputs;
    let papers = read_papers(&inputs.papers)?;
    let heps = read_heps(&inputs.heps)?;
    let names = load_field_names(plan.files.fields.as_deref(), plan.analysis.taxonomy)?;
    log::info!(
        "inputs: {} papers, {} HEP institutions, {} field names",
        fmt_num(papers.len()),
        fmt_num(heps.len()),
        fmt_num(names.len())
    );

    let out = ries_core::run(&plan.analysis, papers, &heps, &names, progress)?;

    let tmp = store.begin(&plan.version)?;
    let pb = write_bar(progress, out.table_count());
    let written = write_run(&out, &tmp, plan.zstd_level, &pb)?;
    pb.finish_and_clear();

    let tables: BTreeMap<String, usize> =
        written.iter().map(|t| (t.name.clone(), t.rows)).collect();
    let manifest = store.commit(&plan.input, &tmp, tables)?;
    Ok((out, written, manifest))
}

/// Field names: the supplied table, else built-in FoE names when translating.
fn load_field_names(path: Option<&Path>, taxonomy: Taxonomy) -> Result<FieldNames> {
    match (path, taxonomy) {
        (Some(path), _) => read_field_names(path),
        (None, Taxonomy::Foe) => Ok(FieldNames::foe()),
        (None, Taxonomy::For) => Ok(FieldNames::default()),
    }
}

fn write_bar(progress: &ProgressContext, tables: usize) -> ProgressBar {
    if !progress.is_tty() {
        return ProgressBar::hidden();
    }
    let pb = progress.multi().add(ProgressBar::new(tables as u64));
    if let Ok(style) =
        ProgressStyle::with_template("  {prefix:<10.cyan.bold} [{bar:30.green/dim}] {pos}/{len}")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb.set_prefix("write");
    pb
}

fn settings_table() -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Setting").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);
    table
}

fn print_summary(
    plan: &RunPlan,
    store: &Store,
    out: &RunOutput,
    written: &[WrittenTable],
    manifest: &RunManifest,
) {
    let stats = &out.assign_stats;
    let mut table = settings_table();
    table.add_row(vec!["Papers in", &fmt_num(stats.papers_in)]);
    table.add_row(vec!["Outside year window", &fmt_num(stats.papers_out_of_window)]);
    table.add_row(vec!["Malformed codes", &fmt_num(stats.malformed_codes)]);
    if plan.analysis.taxonomy == Taxonomy::Foe {
        table.add_row(vec!["Untranslated papers", &fmt_num(out.untranslated)]);
    }
    table.add_row(vec!["Assignments", &fmt_num(stats.assignments)]);
    table.add_row(vec![
        "Papers / institutions",
        &format!(
            "{} / {}",
            fmt_num(stats.unique_papers),
            fmt_num(stats.unique_institutions)
        ),
    ]);
    for level in &out.digits {
        let s = &level.score_stats;
        table.add_row(vec![
            format!("{}-digit scores", level.digits),
            format!(
                "{} papers ({} without local, {} without world benchmark)",
                fmt_num(s.papers),
                fmt_num(s.missing_local),
                fmt_num(s.missing_world)
            ),
        ]);
    }
    eprintln!("\n{table}");

    let mut tables = Table::new();
    tables
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Table").fg(Color::Cyan),
            Cell::new("Rows").fg(Color::Cyan),
        ]);
    for t in written {
        let rows = if t.rows == 0 {
            Cell::new(0).fg(Color::DarkGrey)
        } else {
            Cell::new(fmt_num(t.rows))
        };
        tables.add_row(vec![Cell::new(&t.name), rows]);
    }
    eprintln!("{tables}");

    eprintln!("=== Run Complete ===");
    eprintln!("Run:     {}", store.run_dir(&plan.version).display());
    eprintln!("Input:   {}", manifest.input_hash);
    eprintln!("Content: {:.8}", manifest.content_hash);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_run_toml(dir: &Path, extra: &str) -> PathBuf {
        std::fs::write(dir.join("papers.jsonl"), "").unwrap();
        std::fs::write(dir.join("heps.jsonl"), "{\"ror\":\"https://ror.org/02n415q13\"}\n")
            .unwrap();
        let path = dir.join("run.toml");
        std::fs::write(
            &path,
            format!(
                "version = \"v1\"\noutput = \"store\"\n{extra}\n[inputs]\npapers = \"papers.jsonl\"\nheps = \"heps.jsonl\"\n"
            ),
        )
        .unwrap();
        path
    }

    fn args(path: PathBuf) -> RunArgs {
        RunArgs {
            run_config: path,
            force: false,
            dry_run: true,
            workers: Some(64),
        }
    }

    #[test]
    fn plan_merges_global_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_run_toml(dir.path(), "");
        let config: Config = toml::from_str("[output]\ncompression_level = 7\n[workers]\nmax = 4\n")
            .unwrap();
        let plan = RunPlan::resolve(&args(path), &config).unwrap();
        assert_eq!(plan.version, "v1");
        assert_eq!(plan.zstd_level, 7);
        assert_eq!(plan.workers, 4);
        assert_eq!(plan.output, dir.path().join("store"));
        assert_eq!(plan.files.papers, vec![dir.path().join("papers.jsonl")]);
    }

    #[test]
    fn run_toml_overrides_global_level() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_run_toml(dir.path(), "zstd_level = 1");
        let plan = RunPlan::resolve(&args(path), &Config::default()).unwrap();
        assert_eq!(plan.zstd_level, 1);
    }

    #[test]
    fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_run_toml(dir.path(), "");
        run(args(path), &Config::default(), &ProgressContext::hidden()).unwrap();
        let store = Store::new(&dir.path().join("store")).unwrap();
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn field_names_fall_back_by_taxonomy() {
        assert_eq!(load_field_names(None, Taxonomy::For).unwrap().len(), 0);
        assert!(!load_field_names(None, Taxonomy::Foe).unwrap().is_empty());
    }
}
