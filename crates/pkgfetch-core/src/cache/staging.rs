//! Staging area for payloads that have been received but not yet verified.
//!
//! Each batch owns its own `StagingArea` over a shared directory. Staged
//! files get a unique name per creation (prefixed by the hash), so two
//! batches receiving the same payload never write, verify or remove each
//! other's files. The area remembers what it created so a failed attempt
//! removes only its own partial files.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io;
use std::path::{Path, PathBuf};

use crate::checksum::ContentHash;
use crate::error::{FetchError, StagingDirErrorKind};

const STAGED_SUFFIX: &str = ".part";

#[derive(Debug)]
pub struct StagingArea {
    root: PathBuf,
    in_flight: BTreeMap<ContentHash, PathBuf>,
}

impl StagingArea {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            in_flight: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the staging directory if missing.
    pub fn ensure_dir(&self) -> Result<(), FetchError> {
        fs::create_dir_all(&self.root).map_err(|source| FetchError::StagingDir {
            path: self.root.clone(),
            kind: staging_error_kind(&source),
            source,
        })
    }

    /// Create a fresh staged file for `hash` and track it. A file this area
    /// staged earlier for the same hash is removed first.
    /// Staged files get mode 0644 regardless of what the archive header says.
    pub fn create(&mut self, hash: &ContentHash) -> Result<(File, PathBuf), FetchError> {
        if let Some(old) = self.in_flight.remove(hash) {
            remove_quietly(&old);
        }
        let (file, path) = tempfile::Builder::new()
            .prefix(&format!("{}.", hash.to_hex()))
            .suffix(STAGED_SUFFIX)
            .tempfile_in(&self.root)
            .and_then(|tmp| tmp.keep().map_err(|e| e.error))
            .map_err(|e| FetchError::io(&self.root, e))?;
        self.in_flight.insert(*hash, path.clone());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(fs::Permissions::from_mode(0o644))
                .map_err(|e| FetchError::io(&path, e))?;
        }

        Ok((file, path))
    }

    /// Staged file currently tracked for `hash`.
    pub fn staged_path(&self, hash: &ContentHash) -> Option<&Path> {
        self.in_flight.get(hash).map(PathBuf::as_path)
    }

    /// Stop tracking `hash` (its file was promoted or already removed).
    pub fn settle(&mut self, hash: &ContentHash) {
        self.in_flight.remove(hash);
    }

    /// Remove the staged file for `hash` and stop tracking it.
    pub fn discard(&mut self, hash: &ContentHash) {
        if let Some(path) = self.in_flight.remove(hash) {
            remove_quietly(&path);
        }
    }

    /// Remove every file this area created that has not been settled.
    pub fn cleanup_partial(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }
        tracing::debug!(count = self.in_flight.len(), "removing partial staged files");
        for path in std::mem::take(&mut self.in_flight).into_values() {
            remove_quietly(&path);
        }
    }

    /// Number of tracked, unsettled files.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

fn remove_quietly(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("could not remove staged file {}: {}", path.display(), e),
    }
}

#[cfg(unix)]
fn staging_error_kind(e: &io::Error) -> StagingDirErrorKind {
    match e.raw_os_error() {
        Some(libc::EACCES) => StagingDirErrorKind::Permissions,
        Some(libc::EROFS) => StagingDirErrorKind::ReadOnly,
        _ => StagingDirErrorKind::Other,
    }
}

#[cfg(not(unix))]
fn staging_error_kind(e: &io::Error) -> StagingDirErrorKind {
    match e.kind() {
        io::ErrorKind::PermissionDenied => StagingDirErrorKind::Permissions,
        _ => StagingDirErrorKind::Other,
    }
}
