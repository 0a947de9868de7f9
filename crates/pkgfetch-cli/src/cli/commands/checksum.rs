//! Checksum command: digest a file the way the verifier does.

use anyhow::{Context, Result};
use pkgfetch_core::checksum::{self, HashAlgorithm};
use std::path::Path;

/// Print the digest of `path`, optionally of its gunzipped contents.
pub fn run_checksum(path: &Path, gunzip: bool, sha1: bool) -> Result<()> {
    let algorithm = if sha1 {
        HashAlgorithm::Sha1
    } else {
        HashAlgorithm::Sha256
    };
    let digest = if gunzip {
        checksum::gunzip_digest_path(algorithm, path)
    } else {
        checksum::digest_path(algorithm, path)
    }
    .with_context(|| format!("digest {}", path.display()))?;
    println!("{}  {}", digest, path.display());
    Ok(())
}
