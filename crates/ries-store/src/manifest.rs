//! Run manifest: input hash, content hashes and table row counts

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::hash;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Manifest stored in every run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Run version tag (directory name).
    pub version: String,
    /// Short blake3 hash of `config_json`.
    pub input_hash: String,
    /// Canonical input JSON that was hashed (for auditability).
    pub config_json: String,
    /// Per-file blake3 content hashes (filename → full hex hash).
    pub file_hashes: BTreeMap<String, String>,
    /// Combined content hash of all output files.
    pub content_hash: String,
    /// Rows per written table.
    pub tables: BTreeMap<String, usize>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl RunManifest {
    /// Hash every regular file in `dir` except the manifest itself.
    /// Returns (file_hashes, combined_content_hash).
    pub fn compute_content_hashes(dir: &Path) -> Result<(BTreeMap<String, String>, blake3::Hash)> {
        let pattern = dir.join("*");
        let pattern_str = pattern.to_string_lossy();

        let mut entries: Vec<_> = glob::glob(&pattern_str)
            .context("invalid glob pattern")?
            .filter_map(|e| e.ok())
            .filter(|p| p.is_file() && p.file_name().is_some_and(|n| n != MANIFEST_FILE))
            .collect();
        entries.sort();

        let mut file_hashes = BTreeMap::new();
        let mut all_hashes = Vec::with_capacity(entries.len());
        for path in &entries {
            let h = hash::hash_file(path)
                .with_context(|| format!("failed to hash {}", path.display()))?;
            let Some(filename) = path.file_name() else {
                continue;
            };
            file_hashes.insert(filename.to_string_lossy().into_owned(), h.to_hex().to_string());
            all_hashes.push(h);
        }

        let content_hash = if all_hashes.is_empty() {
            hash::hash_bytes(b"empty")
        } else {
            hash::combine_hashes(&all_hashes)
        };
        Ok((file_hashes, content_hash))
    }

    pub fn total_rows(&self) -> usize {
        self.tables.values().sum()
    }

    /// Write manifest to dir/manifest.json
    pub fn write_to(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(self).context("failed to serialize manifest")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Read manifest from dir/manifest.json
    pub fn read_from(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hashes_skip_manifest_and_dirs() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("core_assignments.parquet"), b"a").unwrap();
        std::fs::write(dir.path().join("rci_papers_4.parquet"), b"b").unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), b"{}").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let (hashes, combined) = RunManifest::compute_content_hashes(dir.path()).unwrap();
        assert_eq!(hashes.len(), 2);
        assert!(!hashes.contains_key(MANIFEST_FILE));
        let (_, again) = RunManifest::compute_content_hashes(dir.path()).unwrap();
        assert_eq!(combined, again);
    }

    #[test]
    fn empty_dir_uses_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let (hashes, combined) = RunManifest::compute_content_hashes(dir.path()).unwrap();
        assert!(hashes.is_empty());
        assert_eq!(combined, hash::hash_bytes(b"empty"));
    }

    #[test]
    fn manifest_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = RunManifest {
            version: "20240801".into(),
            input_hash: "abcd1234".into(),
            config_json: r#"{"zstd_level":3}"#.into(),
            file_hashes: BTreeMap::from([("core_assignments.parquet".into(), "h".into())]),
            content_hash: "deadbeef".into(),
            tables: BTreeMap::from([("core_assignments".into(), 6), ("rci_papers_4".into(), 3)]),
            created_at: chrono::Utc::now(),
        };
        manifest.write_to(dir.path()).unwrap();
        let loaded = RunManifest::read_from(dir.path()).unwrap();
        assert_eq!(loaded.version, manifest.version);
        assert_eq!(loaded.tables, manifest.tables);
        assert_eq!(loaded.total_rows(), 9);
    }

    #[test]
    fn read_from_corrupt_json() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE), b"not valid json").unwrap();
        assert!(RunManifest::read_from(dir.path()).is_err());
    }
}
