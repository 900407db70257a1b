//! Blake3 hashing of input files, output tables and run configs

use std::io;
use std::path::Path;

/// Hash a file's contents with blake3.
pub fn hash_file(path: &Path) -> io::Result<blake3::Hash> {
    let mut hasher = blake3::Hasher::new();
    hasher.update_mmap(path)?;
    Ok(hasher.finalize())
}

pub fn hash_bytes(data: &[u8]) -> blake3::Hash {
    blake3::hash(data)
}

/// Combine hashes in order by hashing their concatenated bytes.
pub fn combine_hashes(hashes: &[blake3::Hash]) -> blake3::Hash {
    let mut hasher = blake3::Hasher::new();
    for h in hashes {
        hasher.update(h.as_bytes());
    }
    hasher.finalize()
}

/// Combined hash of a file set, independent of the order given.
///
/// An empty set hashes to the `"empty"` sentinel.
pub fn hash_file_set<P: AsRef<Path>>(paths: &[P]) -> io::Result<blake3::Hash> {
    let mut sorted: Vec<&Path> = paths.iter().map(AsRef::as_ref).collect();
    sorted.sort();
    if sorted.is_empty() {
        return Ok(hash_bytes(b"empty"));
    }
    let hashes = sorted
        .into_iter()
        .map(hash_file)
        .collect::<io::Result<Vec<_>>>()?;
    Ok(combine_hashes(&hashes))
}

/// First 8 hex characters of a blake3 hash.
pub fn short_hash(hash: &blake3::Hash) -> String {
    hash.to_hex()[..8].to_string()
}
