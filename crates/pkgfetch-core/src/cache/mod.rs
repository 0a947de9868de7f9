//! Content-addressed download cache and per-batch staging.
//!
//! Cached payloads are named by their hex content hash under a fan-out
//! directory. Two layouts exist:
//! - V1 (current): `ab/abcdef...`
//! - V0 (legacy): `ab/cdef01/abcdef...`
//!
//! New entries are always written in V1; lookups also consult V0 so caches
//! written by older clients stay useful. Entries become visible only through
//! an atomic rename from the staging area.

mod staging;

pub use staging::StagingArea;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::checksum::ContentHash;
use crate::error::FetchError;

/// On-disk cache layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    V0,
    V1,
}

impl Layout {
    /// Layouts consulted on lookup, preferred first.
    pub const LOOKUP_ORDER: [Layout; 2] = [Layout::V1, Layout::V0];

    /// Path of `hash` relative to the cache root.
    pub fn relative_path(self, hash: &ContentHash) -> PathBuf {
        let hex = hash.to_hex();
        match self {
            Layout::V1 => PathBuf::from(&hex[0..2]).join(&hex),
            Layout::V0 => PathBuf::from(&hex[0..2]).join(&hex[2..8]).join(&hex),
        }
    }
}

/// Content-addressed cache rooted at a directory.
#[derive(Debug, Clone)]
pub struct ContentCache {
    root: PathBuf,
}

impl ContentCache {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Where a new entry for `hash` is written.
    pub fn path_for(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(Layout::V1.relative_path(hash))
    }

    /// Existing cache file for `hash`, checking every known layout.
    pub fn lookup(&self, hash: &ContentHash) -> Option<PathBuf> {
        Layout::LOOKUP_ORDER
            .iter()
            .map(|layout| self.root.join(layout.relative_path(hash)))
            .find(|p| p.is_file())
    }

    /// Atomically move a verified staged file into the cache. Returns the cache path.
    ///
    /// The staging area must be on the same filesystem as the cache root;
    /// rename fails otherwise.
    pub fn insert(&self, hash: &ContentHash, staged: &Path) -> Result<PathBuf, FetchError> {
        let dest = self.path_for(hash);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|e| FetchError::io(parent, e))?;
        }
        fs::rename(staged, &dest).map_err(|e| FetchError::io(&dest, e))?;
        tracing::debug!(hash = %hash, path = %dest.display(), "cached payload");
        Ok(dest)
    }

    /// Remove every layout's copy of `hash`. Returns true if anything was removed.
    pub fn remove(&self, hash: &ContentHash) -> io::Result<bool> {
        let mut removed = false;
        for layout in Layout::LOOKUP_ORDER {
            let p = self.root.join(layout.relative_path(hash));
            match fs::remove_file(&p) {
                Ok(()) => removed = true,
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}
