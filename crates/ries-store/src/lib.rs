//! ries-store: versioned run store for RIES outputs
//!
//! Each run is stored under its version tag with a manifest of input and
//! content hashes, so unchanged inputs can be detected and written tables
//! verified later.

pub mod hash;
pub mod input;
pub mod manifest;
pub mod run_config;
pub mod store;

pub use hash::{combine_hashes, hash_bytes, hash_file, short_hash};
pub use input::{InputFiles, RunInput};
pub use manifest::RunManifest;
pub use run_config::RunConfig;
pub use store::{LookupResult, RunEntry, Store, VerifyResult};
