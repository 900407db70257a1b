//! RunConfig: parse run.toml
//!
//! ```toml
//! version = "20240801"
//! output = "./data"
//!
//! [inputs]
//! papers = "papers/*.parquet"
//! heps = "heps.jsonl"
//!
//! [analysis]
//! taxonomy = "foe"
//! start = 2015
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ries_core::{validate_version, AnalysisConfig};
use serde::Deserialize;

/// Top-level run.toml structure.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Run tag; names the output directory.
    #[serde(default)]
    pub version: Option<String>,

    /// Version of the paper table; used when `version` is absent.
    #[serde(default)]
    pub doi_table_version: Option<String>,

    /// Output directory (runs live under `{output}/runs`). Falls back to the
    /// global config.
    #[serde(default)]
    pub output: Option<PathBuf>,

    /// zstd level for written tables. Falls back to the global config.
    #[serde(default)]
    pub zstd_level: Option<i32>,

    pub inputs: Inputs,

    #[serde(default)]
    pub analysis: AnalysisConfig,
}

/// Input locations: a file, a directory or a glob pattern each.
#[derive(Debug, Clone, Deserialize)]
pub struct Inputs {
    pub papers: PathBuf,
    pub heps: PathBuf,
    /// Field code → name table for the benchmark summary
    #[serde(default)]
    pub fields: Option<PathBuf>,
}

impl RunConfig {
    /// Parse run.toml; relative input paths are taken from the file's directory.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read run config: {}", path.display()))?;
        let mut config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse run config: {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        let join = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        join(&mut self.inputs.papers);
        join(&mut self.inputs.heps);
        if let Some(fields) = self.inputs.fields.as_mut() {
            join(fields);
        }
        if let Some(output) = self.output.as_mut() {
            join(output);
        }
    }

    /// Effective run tag: `version`, else `doi_table_version`.
    pub fn version(&self) -> Result<String> {
        let version = [&self.version, &self.doi_table_version]
            .into_iter()
            .flatten()
            .map(|v| v.trim())
            .find(|v| !v.is_empty())
            .context("run.toml needs a version (or doi_table_version)")?;
        validate_version(version)?;
        Ok(version.to_string())
    }

    /// Validated analysis settings.
    pub fn analysis(&self) -> Result<AnalysisConfig> {
        Ok(self.analysis.clone().validate()?)
    }

    pub fn output_dir(&self, default: &Path) -> PathBuf {
        self.output.clone().unwrap_or_else(|| default.to_path_buf())
    }

    pub fn zstd_level(&self, default: i32) -> i32 {
        self.zstd_level.unwrap_or(default)
    }
}
