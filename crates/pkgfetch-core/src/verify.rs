//! Payload verification.
//!
//! If the action lists a compressed hash, the file is digested as stored.
//! Otherwise it is gunzipped and the decompressed bytes are digested against
//! the action's content hash. Either way the algorithm comes from the
//! expected hash. A file that fails is removed before the error is returned.

use std::fs;
use std::io;
use std::path::Path;

use crate::action::Action;
use crate::checksum::{digest_path, gunzip_digest_path, ContentHash};
use crate::error::FetchError;

/// Check the file at `path` against `action`'s expected hash.
pub fn verify_content(action: &Action, path: &Path) -> Result<(), FetchError> {
    let size = fs::metadata(path)
        .map_err(|e| FetchError::io(path, e))?
        .len();

    if let Some(expected) = action.chash {
        let computed =
            digest_path(expected.algorithm(), path).map_err(|e| FetchError::io(path, e))?;
        if computed != expected {
            return Err(reject(action, path, size, mismatch("chash", &expected, &computed)));
        }
        return Ok(());
    }

    let Some(expected) = action.hash else {
        return Err(reject(
            action,
            path,
            size,
            "action has no content hash to verify against".to_string(),
        ));
    };

    match gunzip_digest_path(expected.algorithm(), path) {
        Ok(computed) if computed == expected => Ok(()),
        Ok(computed) => Err(reject(action, path, size, mismatch("hash", &expected, &computed))),
        Err(e) if is_decode_error(&e) => {
            Err(reject(action, path, size, format!("decompression failure: {e}")))
        }
        Err(e) => Err(FetchError::io(path, e)),
    }
}

/// Errors the gzip decoder raises for bad or truncated streams. Anything
/// else came from reading the file itself.
fn is_decode_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::InvalidData | io::ErrorKind::InvalidInput | io::ErrorKind::UnexpectedEof
    )
}

fn mismatch(what: &str, expected: &ContentHash, computed: &ContentHash) -> String {
    format!("{what} failure: expected: {expected} computed: {computed}")
}

fn reject(action: &Action, path: &Path, size: u64, reason: String) -> FetchError {
    if let Err(e) = fs::remove_file(path) {
        tracing::warn!("could not remove rejected payload {}: {}", path.display(), e);
    }
    tracing::debug!(path = %path.display(), %reason, "payload rejected");
    FetchError::InvalidContent {
        path: action.path.clone(),
        reason,
        size,
    }
}
