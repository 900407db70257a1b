//! Global tool configuration (`ries.toml`)

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;

/// Global configuration for ries
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub output: OutputConfig,
    pub workers: WorkersConfig,
    /// File this config was read from; `None` for built-in defaults
    #[serde(skip)]
    pub source: Option<PathBuf>,
}

/// Levels accepted by the Parquet zstd codec.
const ZSTD_LEVELS: std::ops::RangeInclusive<i32> = 1..=22;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Store root used when run.toml has no `output`
    pub default_dir: PathBuf,
    /// zstd level used when run.toml has no `zstd_level`
    pub compression_level: i32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            default_dir: PathBuf::from("./data"),
            compression_level: 3,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct WorkersConfig {
    pub default: usize,
    pub max: usize,
}

impl Default for WorkersConfig {
    fn default() -> Self {
        let cpus = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4);
        Self {
            default: cpus.min(8),
            max: 16,
        }
    }
}

/// Config file looked up in the working directory.
pub const LOCAL_CONFIG: &str = "ries.toml";

/// Locations searched by [`Config::load`], in order.
fn candidates() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(LOCAL_CONFIG)];
    if let Some(dirs) = directories::ProjectDirs::from("", "", "ries") {
        paths.push(dirs.config_dir().join("config.toml"));
    }
    paths
}

impl Config {
    /// First of `./ries.toml` and `~/.config/ries/config.toml` that exists,
    /// else defaults.
    pub fn load() -> Result<Self> {
        match candidates().into_iter().find(|p| p.exists()) {
            Some(path) => Self::from_file(&path),
            None => {
                log::debug!("no config file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        config.source = Some(path.to_path_buf());

        log::info!("Loaded config from {}", path.display());
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if !ZSTD_LEVELS.contains(&self.output.compression_level) {
            bail!(
                "output.compression_level must be in {}..={}, got {}",
                ZSTD_LEVELS.start(),
                ZSTD_LEVELS.end(),
                self.output.compression_level
            );
        }
        if self.workers.max == 0 {
            bail!("workers.max must be at least 1");
        }
        Ok(())
    }

    /// Worker count: the request (or the default), clamped to `1..=max`.
    pub fn workers(&self, requested: Option<usize>) -> usize {
        let max = self.workers.max.max(1);
        let n = requested.unwrap_or(self.workers.default);
        if n > max {
            log::warn!("{n} workers requested, capping at {max}");
        }
        n.clamp(1, max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert_eq!(config.output.default_dir, PathBuf::from("./data"));
        assert_eq!(config.output.compression_level, 3);
        assert!(config.workers.default >= 1);
    }

    #[test]
    fn parse_config_toml() {
        let toml = r#"
[output]
default_dir = "/tmp/ries"
compression_level = 5

[workers]
default = 4
max = 8
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.output.default_dir, PathBuf::from("/tmp/ries"));
        assert_eq!(config.output.compression_level, 5);
        assert_eq!(config.workers.default, 4);
        assert_eq!(config.workers.max, 8);
    }

    #[test]
    fn partial_sections_keep_defaults() {
        let config: Config = toml::from_str("[workers]\nmax = 2\n").unwrap();
        assert_eq!(config.workers.max, 2);
        assert_eq!(config.output.compression_level, 3);
    }

    #[test]
    fn workers_clamped() {
        let config: Config = toml::from_str("[workers]\ndefault = 4\nmax = 8\n").unwrap();
        assert_eq!(config.workers(None), 4);
        assert_eq!(config.workers(Some(32)), 8);
        assert_eq!(config.workers(Some(0)), 1);
    }

    #[test]
    fn from_file_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ries.toml");
        std::fs::write(&path, "[output\n").unwrap();
        let err = Config::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse"));
    }

    #[test]
    fn from_file_validates_and_records_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ries.toml");
        std::fs::write(&path, "[output]\ncompression_level = 30\n").unwrap();
        assert!(Config::from_file(&path).is_err());

        std::fs::write(&path, "[output]\ncompression_level = 9\n").unwrap();
        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.source.as_deref(), Some(path.as_path()));
        assert_eq!(config.output.compression_level, 9);
    }

    #[test]
    fn local_config_searched_first() {
        assert_eq!(candidates()[0], PathBuf::from(LOCAL_CONFIG));
    }
}
