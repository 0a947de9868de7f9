//! Error taxonomy for batched retrieval.
//!
//! Transfer errors carry the URL they came from and a human-readable reason.
//! Only `TransferTimedOut` and `TransferContent` are retryable; everything
//! else ends the batch operation that raised it.

use std::fmt;
use std::io;
use std::path::PathBuf;

use crate::action::ActionKind;

/// Why the staging directory could not be prepared.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StagingDirErrorKind {
    /// EACCES: the current user may not create it.
    Permissions,
    /// EROFS: the filesystem is mounted read-only.
    ReadOnly,
    Other,
}

impl fmt::Display for StagingDirErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StagingDirErrorKind::Permissions => write!(f, "permission denied"),
            StagingDirErrorKind::ReadOnly => write!(f, "read-only filesystem"),
            StagingDirErrorKind::Other => write!(f, "operation failed"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Timeout, or an HTTP status the retry table treats as transient.
    #[error("transfer from {url} timed out: {reason}")]
    TransferTimedOut { url: String, reason: String },

    /// Connection-level or incomplete-read failure.
    #[error("transfer from {url} failed: {reason}")]
    TransferContent { url: String, reason: String },

    /// Payload failed verification. The bad file has already been removed.
    #[error("invalid content for {}: {reason} ({size} bytes)", path.as_deref().unwrap_or("<unnamed>"))]
    InvalidContent {
        path: Option<String>,
        reason: String,
        size: u64,
    },

    /// The mirror cannot serve batch file lists, or the response was malformed.
    #[error("file list retrieval from {url} failed: {reason}")]
    FileListRetrieval { url: String, reason: String },

    #[error("batch is full: {queued_bytes} of {capacity_bytes} bytes queued")]
    BatchFull {
        queued_bytes: u64,
        capacity_bytes: u64,
    },

    #[error("{kind} action does not carry a content hash")]
    InvalidActionKind { kind: ActionKind },

    #[error("retrieval cancelled")]
    Cancelled,

    /// Retry budget exhausted; carries every distinct failure seen.
    #[error("{0}")]
    Failures(TransportFailures),

    #[error("cannot prepare staging directory {}: {kind}", path.display())]
    StagingDir {
        path: PathBuf,
        kind: StagingDirErrorKind,
        #[source]
        source: io::Error,
    },

    /// Local filesystem failure outside the staging directory setup.
    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FetchError {
    /// True for errors that justify trying again (possibly on another mirror).
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FetchError::TransferTimedOut { .. } | FetchError::TransferContent { .. }
        )
    }

    /// Two failures are the same if they are the same kind from the same URL
    /// for the same reason.
    pub fn same_failure(&self, other: &FetchError) -> bool {
        match (self, other) {
            (
                FetchError::TransferTimedOut { url: a, reason: ra },
                FetchError::TransferTimedOut { url: b, reason: rb },
            )
            | (
                FetchError::TransferContent { url: a, reason: ra },
                FetchError::TransferContent { url: b, reason: rb },
            )
            | (
                FetchError::FileListRetrieval { url: a, reason: ra },
                FetchError::FileListRetrieval { url: b, reason: rb },
            ) => a == b && ra == rb,
            _ => false,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        FetchError::Io {
            path: path.into(),
            source,
        }
    }
}

/// One distinct failure and how many times it was seen.
#[derive(Debug)]
pub struct FailureEntry {
    pub error: FetchError,
    pub count: u32,
}

/// Aggregate of retryable failures, deduplicated with a per-entry count.
#[derive(Debug, Default)]
pub struct TransportFailures {
    entries: Vec<FailureEntry>,
}

impl TransportFailures {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a failure; an equal one already present only has its count bumped.
    pub fn push(&mut self, error: FetchError) {
        if let Some(entry) = self
            .entries
            .iter_mut()
            .find(|e| e.error.same_failure(&error))
        {
            entry.count = entry.count.saturating_add(1);
            return;
        }
        self.entries.push(FailureEntry { error, count: 1 });
    }

    pub fn entries(&self) -> &[FailureEntry] {
        &self.entries
    }

    /// Number of distinct failures.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Total failures including repeats.
    pub fn total(&self) -> u32 {
        self.entries.iter().map(|e| e.count).sum()
    }
}

impl fmt::Display for TransportFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} transfer failures ({} distinct)",
            self.total(),
            self.len()
        )?;
        for entry in &self.entries {
            write!(f, "\n  {}", entry.error)?;
            if entry.count > 1 {
                write!(f, " (happened {} times)", entry.count)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timed_out(url: &str) -> FetchError {
        FetchError::TransferTimedOut {
            url: url.to_string(),
            reason: "HTTP 504".to_string(),
        }
    }

    #[test]
    fn only_transfer_errors_are_retryable() {
        assert!(timed_out("http://a/").is_retryable());
        assert!(FetchError::TransferContent {
            url: "http://a/".into(),
            reason: "recv".into()
        }
        .is_retryable());
        assert!(!FetchError::FileListRetrieval {
            url: "http://a/".into(),
            reason: "HTTP 500".into()
        }
        .is_retryable());
        assert!(!FetchError::Cancelled.is_retryable());
        assert!(!FetchError::InvalidContent {
            path: None,
            reason: "hash failure".into(),
            size: 1
        }
        .is_retryable());
    }

    #[test]
    fn failures_dedup_by_kind_url_and_reason() {
        let mut f = TransportFailures::new();
        f.push(timed_out("http://a/"));
        f.push(timed_out("http://a/"));
        f.push(timed_out("http://b/"));
        assert_eq!(f.len(), 2);
        assert_eq!(f.total(), 3);
        assert_eq!(f.entries()[0].count, 2);
        assert_eq!(f.entries()[1].count, 1);
    }

    #[test]
    fn failures_display_lists_repeats() {
        let mut f = TransportFailures::new();
        f.push(timed_out("http://a/"));
        f.push(timed_out("http://a/"));
        let text = f.to_string();
        assert!(text.contains("2 transfer failures (1 distinct)"));
        assert!(text.contains("happened 2 times"));
    }
}
