//! `ries runs` / `ries verify` - inspect the run store

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Cell, Color, Table};

use ries_core::fmt_num;
use ries_store::{Store, VerifyResult};

use crate::config::Config;

#[derive(Args, Debug)]
pub struct RunsArgs {
    /// Store directory (default: output.default_dir from the config)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct VerifyArgs {
    /// Run version to verify
    pub version: String,

    /// Store directory (default: output.default_dir from the config)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,
}

fn store_dir<'a>(dir: Option<&'a Path>, config: &'a Config) -> &'a Path {
    dir.unwrap_or(&config.output.default_dir)
}

fn short(hash: &str) -> &str {
    &hash[..std::cmp::min(8, hash.len())]
}

pub fn runs(args: RunsArgs, config: &Config) -> Result<()> {
    let store = Store::new(store_dir(args.dir.as_deref(), config))?;
    let entries = store.list()?;

    if entries.is_empty() {
        eprintln!("No stored runs.");
        return Ok(());
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec![
            Cell::new("Version").fg(Color::Cyan),
            Cell::new("Input").fg(Color::Cyan),
            Cell::new("Tables").fg(Color::Cyan),
            Cell::new("Rows").fg(Color::Cyan),
            Cell::new("Content").fg(Color::Cyan),
            Cell::new("Created").fg(Color::Cyan),
            Cell::new("Latest").fg(Color::Cyan),
        ]);

    for entry in &entries {
        let latest_cell = if entry.latest {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("")
        };
        table.add_row(vec![
            Cell::new(&entry.version),
            Cell::new(&entry.input_hash),
            Cell::new(entry.tables),
            Cell::new(fmt_num(entry.rows)),
            Cell::new(&entry.content_hash),
            Cell::new(&entry.created_at),
            latest_cell,
        ]);
    }

    eprintln!("\n{table}");
    eprintln!("{} runs total", entries.len());
    Ok(())
}

pub fn verify(args: VerifyArgs, config: &Config) -> Result<()> {
    let store = Store::new(store_dir(args.dir.as_deref(), config))?;
    let results = store.verify(&args.version)?;

    let failed = results.iter().filter(|r| !r.ok).count();
    let status = if failed == 0 { "OK" } else { "FAIL" };
    eprintln!("[{status}] {} ({} files)", args.version, results.len());
    print_mismatches(&args.version, &results);

    if failed > 0 {
        bail!("{failed} of {} files in run {} failed verification", results.len(), args.version);
    }
    Ok(())
}

fn print_mismatches(version: &str, results: &[VerifyResult]) {
    for r in results {
        if !r.ok {
            eprintln!("  MISMATCH in {version}: {}", r.path);
            eprintln!("    expected: {}", short(&r.expected));
            eprintln!("    actual:   {}", short(&r.actual));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use ries_store::RunInput;

    fn seeded_store(dir: &Path) -> Store {
        let store = Store::new(dir).unwrap();
        let input = RunInput {
            version: "v1".into(),
            config_json: "{}".into(),
        };
        let tmp = store.begin("v1").unwrap();
        std::fs::write(tmp.join("rci_papers_4.parquet"), b"rows").unwrap();
        store
            .commit(&input, &tmp, BTreeMap::from([("rci_papers_4".into(), 1)]))
            .unwrap();
        store
    }

    #[test]
    fn short_truncates() {
        assert_eq!(short("0123456789abcdef"), "01234567");
        assert_eq!(short("MISSING"), "MISSING");
    }

    #[test]
    fn verify_fails_on_tampered_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = seeded_store(dir.path());
        let args = |version: &str| VerifyArgs {
            version: version.into(),
            dir: Some(dir.path().to_path_buf()),
        };
        verify(args("v1"), &Config::default()).unwrap();

        std::fs::write(store.run_dir("v1").join("rci_papers_4.parquet"), b"edited").unwrap();
        assert!(verify(args("v1"), &Config::default()).is_err());
        assert!(verify(args("v9"), &Config::default()).is_err());
    }

    #[test]
    fn runs_lists_store() {
        let dir = tempfile::tempdir().unwrap();
        seeded_store(dir.path());
        let args = RunsArgs {
            dir: Some(dir.path().to_path_buf()),
        };
        runs(args, &Config::default()).unwrap();
    }
}
