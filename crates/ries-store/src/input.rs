//! Run input identity: what must match for a stored run to be reused

use std::path::PathBuf;

use anyhow::{Context, Result};
use ries_core::AnalysisConfig;
use serde::Serialize;

use crate::hash;

/// Concrete input files of a run, after glob/directory expansion.
#[derive(Debug, Clone, Default)]
pub struct InputFiles {
    pub papers: Vec<PathBuf>,
    pub heps: Vec<PathBuf>,
    pub fields: Option<PathBuf>,
}

/// Content-affecting settings plus input content hashes, serialized in a
/// fixed field order.
#[derive(Serialize)]
struct CanonicalInput<'a> {
    analysis: &'a AnalysisConfig,
    zstd_level: i32,
    papers: String,
    heps: String,
    fields: Option<String>,
}

/// Identity of one run: its version tag and the canonical JSON hashed into
/// the input hash.
#[derive(Debug, Clone)]
pub struct RunInput {
    pub version: String,
    pub config_json: String,
}

impl RunInput {
    /// Hash every input file and serialize the analysis settings.
    pub fn new(
        version: &str,
        analysis: &AnalysisConfig,
        zstd_level: i32,
        files: &InputFiles,
    ) -> Result<Self> {
        let papers = hash::hash_file_set(&files.papers).context("hashing paper files")?;
        let heps = hash::hash_file_set(&files.heps).context("hashing HEP registry")?;
        let fields = files
            .fields
            .as_ref()
            .map(|p| {
                hash::hash_file(p).with_context(|| format!("hashing {}", p.display()))
            })
            .transpose()?;
        let canonical = CanonicalInput {
            analysis,
            zstd_level,
            papers: papers.to_hex().to_string(),
            heps: heps.to_hex().to_string(),
            fields: fields.map(|h| h.to_hex().to_string()),
        };
        let config_json =
            serde_json::to_string(&canonical).context("serializing run input")?;
        Ok(Self {
            version: version.to_string(),
            config_json,
        })
    }

    pub fn input_hash(&self) -> blake3::Hash {
        hash::hash_bytes(self.config_json.as_bytes())
    }

    /// Short (8-char hex) input hash.
    pub fn short_hash(&self) -> String {
        hash::short_hash(&self.input_hash())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ries_core::Taxonomy;

    fn files(dir: &std::path::Path, papers: &[u8]) -> InputFiles {
        let p = dir.join("papers.jsonl");
        let h = dir.join("heps.jsonl");
        std::fs::write(&p, papers).unwrap();
        std::fs::write(&h, b"{\"ror\":\"r\"}").unwrap();
        InputFiles {
            papers: vec![p],
            heps: vec![h],
            fields: None,
        }
    }

    #[test]
    fn same_inputs_same_hash() {
        let dir = tempfile::tempdir().unwrap();
        let f = files(dir.path(), b"{}");
        let cfg = AnalysisConfig::default();
        let a = RunInput::new("v1", &cfg, 3, &f).unwrap();
        let b = RunInput::new("v2", &cfg, 3, &f).unwrap();
        assert_eq!(a.input_hash(), b.input_hash());
        assert_eq!(a.short_hash().len(), 8);
    }

    #[test]
    fn hash_tracks_content_and_settings() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = AnalysisConfig::default();
        let base = RunInput::new("v", &cfg, 3, &files(dir.path(), b"{}")).unwrap();

        let changed_data = RunInput::new("v", &cfg, 3, &files(dir.path(), b"{ }")).unwrap();
        assert_ne!(base.input_hash(), changed_data.input_hash());

        let f = files(dir.path(), b"{}");
        let foe = AnalysisConfig {
            taxonomy: Taxonomy::Foe,
            ..AnalysisConfig::default()
        };
        assert_ne!(
            base.input_hash(),
            RunInput::new("v", &foe, 3, &f).unwrap().input_hash()
        );
        assert_ne!(
            base.input_hash(),
            RunInput::new("v", &cfg, 9, &f).unwrap().input_hash()
        );
        assert!(base.config_json.contains(r#""taxonomy":"for""#));
    }
}
