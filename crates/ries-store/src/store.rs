//! Versioned store for run outputs
//!
//! Directory layout:
//! ```text
//! {base}/
//! ├── runs/
//! │   ├── {version}/        # one finished run
//! │   │   ├── manifest.json
//! │   │   └── *.parquet
//! │   └── {version}.tmp/    # run being written
//! └── latest -> runs/{version}
//! ```
//!
//! A run is written into its `.tmp` directory and replaces any previous
//! directory of the same version in one step on commit.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use crate::hash;
use crate::input::RunInput;
use crate::manifest::RunManifest;

/// Result of looking up a run in the store.
#[derive(Debug)]
pub enum LookupResult {
    /// The stored run was produced from identical inputs.
    Cached {
        path: PathBuf,
        manifest: RunManifest,
    },
    NeedsRun,
}

/// Summary of a stored run for listing.
#[derive(Debug, Serialize)]
pub struct RunEntry {
    pub version: String,
    pub input_hash: String,
    pub tables: usize,
    pub rows: usize,
    pub content_hash: String,
    pub created_at: String,
    pub latest: bool,
}

/// Verification result for a single file.
#[derive(Debug)]
pub struct VerifyResult {
    pub path: String,
    pub expected: String,
    pub actual: String,
    pub ok: bool,
}

const LATEST: &str = "latest";

#[cfg(unix)]
fn symlink(target: &Path, link: &Path) -> std::io::Result<()> {
    std::os::unix::fs::symlink(target, link)
}

#[cfg(not(unix))]
fn symlink(_target: &Path, _link: &Path) -> std::io::Result<()> {
    Ok(())
}

/// Move `staged` to `target`, parking any existing `target` at `old` until
/// the move succeeds. On failure the previous `target` is put back.
fn replace_dir(staged: &Path, target: &Path, old: &Path) -> Result<()> {
    if target.exists() {
        if old.exists() {
            fs::remove_dir_all(old)?;
        }
        fs::rename(target, old)
            .with_context(|| format!("failed to move aside {}", target.display()))?;
    }
    if let Err(e) = fs::rename(staged, target) {
        if old.exists() {
            if let Err(restore) = fs::rename(old, target) {
                log::error!("failed to restore {}: {restore}", old.display());
            }
        }
        return Err(e).with_context(|| {
            format!(
                "failed to rename {} → {}",
                staged.display(),
                target.display()
            )
        });
    }
    if old.exists() {
        fs::remove_dir_all(old).with_context(|| format!("failed to remove {}", old.display()))?;
    }
    Ok(())
}

pub struct Store {
    base: PathBuf,
}

impl Store {
    /// Open (creating if needed) a store rooted at `base`.
    pub fn new(base: &Path) -> Result<Self> {
        let runs_dir = base.join("runs");
        fs::create_dir_all(&runs_dir)
            .with_context(|| format!("failed to create runs dir: {}", runs_dir.display()))?;
        Ok(Self {
            base: base.to_path_buf(),
        })
    }

    pub fn runs_dir(&self) -> PathBuf {
        self.base.join("runs")
    }

    pub fn run_dir(&self, version: &str) -> PathBuf {
        self.runs_dir().join(version)
    }

    pub fn tmp_dir(&self, version: &str) -> PathBuf {
        self.runs_dir().join(format!("{version}.tmp"))
    }

    /// Look up a stored run with the same version and input hash.
    pub fn lookup(&self, input: &RunInput) -> LookupResult {
        let dir = self.run_dir(&input.version);
        if !dir.exists() {
            return LookupResult::NeedsRun;
        }
        match RunManifest::read_from(&dir) {
            Ok(manifest) if manifest.input_hash == input.short_hash() => LookupResult::Cached {
                path: dir,
                manifest,
            },
            Ok(manifest) => {
                log::info!(
                    "run {}: inputs changed ({} → {}), rerunning",
                    input.version,
                    manifest.input_hash,
                    input.short_hash()
                );
                LookupResult::NeedsRun
            }
            Err(e) => {
                log::warn!("corrupt run {}: {e}", input.version);
                LookupResult::NeedsRun
            }
        }
    }

    /// Create an empty staging directory for `version`, removing a stale one.
    pub fn begin(&self, version: &str) -> Result<PathBuf> {
        let tmp = self.tmp_dir(version);
        if tmp.exists() {
            log::warn!("removing stale staging dir {}", tmp.display());
            fs::remove_dir_all(&tmp)
                .with_context(|| format!("failed to remove {}", tmp.display()))?;
        }
        fs::create_dir_all(&tmp).with_context(|| format!("failed to create {}", tmp.display()))?;
        Ok(tmp)
    }

    /// Commit a staged run: hash its files, write the manifest, replace the
    /// previous directory of this version and point `latest` at it.
    pub fn commit(
        &self,
        input: &RunInput,
        tmp_dir: &Path,
        tables: BTreeMap<String, usize>,
    ) -> Result<RunManifest> {
        let (file_hashes, content_hash) = RunManifest::compute_content_hashes(tmp_dir)?;
        let manifest = RunManifest {
            version: input.version.clone(),
            input_hash: input.short_hash(),
            config_json: input.config_json.clone(),
            file_hashes,
            content_hash: content_hash.to_hex().to_string(),
            tables,
            created_at: chrono::Utc::now(),
        };
        manifest.write_to(tmp_dir)?;

        replace_dir(
            tmp_dir,
            &self.run_dir(&input.version),
            &self.runs_dir().join(format!("{}.old", input.version)),
        )?;

        self.set_latest(&input.version);
        Ok(manifest)
    }

    fn set_latest(&self, version: &str) {
        let latest = self.base.join(LATEST);
        let _ = fs::remove_file(&latest);
        let target = PathBuf::from("runs").join(version);
        if let Err(e) = symlink(&target, &latest) {
            log::warn!("failed to update {}: {e}", latest.display());
        }
    }

    /// Version `latest` points at, if any.
    pub fn latest(&self) -> Option<String> {
        let target = fs::read_link(self.base.join(LATEST)).ok()?;
        Some(target.file_name()?.to_string_lossy().into_owned())
    }

    /// All committed runs, oldest first.
    pub fn list(&self) -> Result<Vec<RunEntry>> {
        let latest = self.latest();
        let mut entries = Vec::new();
        for entry in fs::read_dir(self.runs_dir())? {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().into_owned();
            if !path.is_dir() || name.ends_with(".tmp") || name.ends_with(".old") {
                continue;
            }
            match RunManifest::read_from(&path) {
                Ok(manifest) => entries.push(RunEntry {
                    latest: latest.as_deref() == Some(name.as_str()),
                    version: name,
                    input_hash: manifest.input_hash.clone(),
                    tables: manifest.tables.len(),
                    rows: manifest.total_rows(),
                    content_hash: manifest.content_hash.chars().take(8).collect(),
                    created_at: manifest.created_at.format("%Y-%m-%d %H:%M").to_string(),
                }),
                Err(e) => log::warn!("skipping {name}: {e}"),
            }
        }
        entries.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.version.cmp(&b.version)));
        Ok(entries)
    }

    /// Re-hash a run's files against its manifest.
    pub fn verify(&self, version: &str) -> Result<Vec<VerifyResult>> {
        let dir = self.run_dir(version);
        let manifest =
            RunManifest::read_from(&dir).with_context(|| format!("no manifest for {version}"))?;

        let mut results = Vec::with_capacity(manifest.file_hashes.len());
        for (filename, expected) in &manifest.file_hashes {
            let path = dir.join(filename);
            let (actual, ok) = if path.exists() {
                match hash::hash_file(&path) {
                    Ok(h) => {
                        let hex = h.to_hex().to_string();
                        let ok = hex == *expected;
                        (hex, ok)
                    }
                    Err(e) => (format!("error: {e}"), false),
                }
            } else {
                ("MISSING".to_string(), false)
            };
            results.push(VerifyResult {
                path: filename.clone(),
                expected: expected.clone(),
                actual,
                ok,
            });
        }
        Ok(results)
    }

    /// Remove staging directories left by interrupted runs.
    pub fn cleanup_tmp(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(self.runs_dir())? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if (name.ends_with(".tmp") || name.ends_with(".old")) && entry.path().is_dir() {
                log::info!("cleaning stale dir: {name}");
                fs::remove_dir_all(entry.path())?;
                count += 1;
            }
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(version: &str, json: &str) -> RunInput {
        RunInput {
            version: version.into(),
            config_json: json.into(),
        }
    }

    fn commit(store: &Store, input: &RunInput, data: &[u8]) -> RunManifest {
        let tmp = store.begin(&input.version).unwrap();
        fs::write(tmp.join("core_assignments.parquet"), data).unwrap();
        store
            .commit(input, &tmp, BTreeMap::from([("core_assignments".into(), 2)]))
            .unwrap()
    }

    #[test]
    fn lookup_miss_then_hit() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let run = input("v1", r#"{"a":1}"#);
        assert!(matches!(store.lookup(&run), LookupResult::NeedsRun));

        let manifest = commit(&store, &run, b"rows");
        assert!(!store.tmp_dir("v1").exists());
        match store.lookup(&run) {
            LookupResult::Cached { manifest: m, path } => {
                assert_eq!(m.content_hash, manifest.content_hash);
                assert_eq!(path, store.run_dir("v1"));
            }
            LookupResult::NeedsRun => panic!("expected cache hit"),
        }
        // same version, different inputs
        assert!(matches!(
            store.lookup(&input("v1", r#"{"a":2}"#)),
            LookupResult::NeedsRun
        ));
    }

    #[test]
    fn commit_replaces_whole_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let run = input("v1", "{}");
        commit(&store, &run, b"first");
        fs::write(store.run_dir("v1").join("stray.parquet"), b"x").unwrap();

        let second = commit(&store, &run, b"second");
        assert!(!store.run_dir("v1").join("stray.parquet").exists());
        assert_eq!(second.file_hashes.len(), 1);
        assert!(!store.runs_dir().join("v1.old").exists());
    }

    #[test]
    fn failed_replace_restores_previous_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        let run = input("v1", "{}");
        let first = commit(&store, &run, b"first");

        let old = store.runs_dir().join("v1.old");
        let missing = store.runs_dir().join("gone.tmp");
        assert!(replace_dir(&missing, &store.run_dir("v1"), &old).is_err());

        assert!(!old.exists());
        let kept = RunManifest::read_from(&store.run_dir("v1")).unwrap();
        assert_eq!(kept.content_hash, first.content_hash);
        store.cleanup_tmp().unwrap();
        assert!(matches!(store.lookup(&run), LookupResult::Cached { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn latest_follows_last_commit() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        commit(&store, &input("v1", "{}"), b"a");
        commit(&store, &input("v2", "{}"), b"b");
        assert_eq!(store.latest().as_deref(), Some("v2"));

        let runs = store.list().unwrap();
        assert_eq!(runs.len(), 2);
        assert!(runs.iter().any(|r| r.version == "v2" && r.latest));
        assert!(runs.iter().all(|r| r.rows == 2 && r.tables == 1));
    }

    #[test]
    fn verify_detects_tampering() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        commit(&store, &input("v1", "{}"), b"rows");
        assert!(store.verify("v1").unwrap().iter().all(|r| r.ok));

        fs::write(store.run_dir("v1").join("core_assignments.parquet"), b"edited").unwrap();
        let results = store.verify("v1").unwrap();
        assert!(!results[0].ok);

        fs::remove_file(store.run_dir("v1").join("core_assignments.parquet")).unwrap();
        assert_eq!(store.verify("v1").unwrap()[0].actual, "MISSING");
        assert!(store.verify("nope").is_err());
    }

    #[test]
    fn cleanup_removes_staging_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::new(dir.path()).unwrap();
        store.begin("v1").unwrap();
        fs::create_dir_all(store.runs_dir().join("v0.old")).unwrap();
        assert_eq!(store.cleanup_tmp().unwrap(), 2);
        assert!(store.list().unwrap().is_empty());
    }
}
