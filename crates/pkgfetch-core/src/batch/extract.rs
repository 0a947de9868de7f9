//! Streaming extraction of a file-list response.
//!
//! Members are staged one at a time, verified against the pending action
//! for their hash, promoted into the cache, and the matching actions get
//! their openers. Members nobody asked for are discarded.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use crate::action::{Action, Opener};
use crate::cache::{ContentCache, StagingArea};
use crate::checksum::ContentHash;
use crate::control::CancelCheck;
use crate::error::FetchError;
use crate::retry::classify_io_error;
use crate::verify::verify_content;

use super::pending::PendingBatch;

const COPY_BUF_SIZE: usize = 64 * 1024;

/// Borrowed batch state an extraction writes into.
pub(super) struct Extraction<'b> {
    pub pending: &'b mut PendingBatch,
    pub staging: &'b mut StagingArea,
    pub cache: &'b ContentCache,
    pub cancel: &'b dyn CancelCheck,
    pub completed: &'b mut Vec<Action>,
}

impl Extraction<'_> {
    /// Consume the archive stream. Returns how many requested hashes were
    /// satisfied. The stream is dropped (closing the transfer) on every path.
    pub fn run(&mut self, stream: Box<dyn Read>, url: &str) -> Result<usize, FetchError> {
        let mut archive = tar::Archive::new(stream);
        let entries = archive.entries().map_err(|e| classify_io_error(e, url))?;
        let mut extracted = 0;

        for entry in entries {
            if self.cancel.is_cancelled() {
                return Err(FetchError::Cancelled);
            }
            let mut entry = entry.map_err(|e| classify_io_error(e, url))?;
            let name = entry
                .path()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();

            if !entry.header().entry_type().is_file() {
                tracing::warn!(member = %name, "skipping non-file archive member");
                continue;
            }
            let hash = match ContentHash::parse(name.trim_start_matches("./")) {
                Ok(h) => h,
                Err(e) => {
                    tracing::warn!(member = %name, error = %e, "skipping archive member not named by hash");
                    continue;
                }
            };

            let expected = entry.size();
            let (file, staged) = self.staging.create(&hash)?;
            let copied = copy_member(&mut entry, file, &staged, url)?;
            if copied < expected {
                return Err(FetchError::TransferContent {
                    url: url.to_string(),
                    reason: format!("incomplete read: {copied} of {expected} bytes for {hash}"),
                });
            }

            let Some(group) = self.pending.get(&hash) else {
                tracing::warn!(hash = %hash, "discarding file that was not requested");
                self.staging.discard(&hash);
                continue;
            };
            verify_content(group.first(), &staged)?;

            let cached = self.cache.insert(&hash, &staged)?;
            self.staging.settle(&hash);
            if let Some(group) = self.pending.remove(&hash) {
                let opener = Opener::new(cached);
                for mut action in group.into_actions() {
                    action.opener = Some(opener.clone());
                    self.completed.push(action);
                }
            }
            extracted += 1;
        }

        Ok(extracted)
    }
}

/// Copy one member into its staged file. Read failures are transfer errors;
/// write failures are local I/O errors.
fn copy_member<R: Read>(
    entry: &mut R,
    file: File,
    staged: &Path,
    url: &str,
) -> Result<u64, FetchError> {
    let mut out = BufWriter::new(file);
    let mut buf = vec![0u8; COPY_BUF_SIZE];
    let mut total = 0u64;
    loop {
        let n = match entry.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(classify_io_error(e, url)),
        };
        out.write_all(&buf[..n])
            .map_err(|e| FetchError::io(staged, e))?;
        total += n as u64;
    }
    out.flush().map_err(|e| FetchError::io(staged, e))?;
    Ok(total)
}
