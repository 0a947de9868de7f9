//! Batched retrieval of payloads for a set of actions.
//!
//! Callers feed actions into a [`FileBatch`]. Actions whose payload is
//! already cached (and still verifies) complete immediately; the rest are
//! queued by content hash. When the queue reaches capacity, or on
//! [`FileBatch::flush`], the batch *drains*: it asks one endpoint for every
//! outstanding hash in a single request and extracts whatever comes back.
//!
//! A drain retries across endpoints while its budget lasts. It keeps using
//! the endpoint that last worked and moves to another after a retryable
//! failure. A drain that extracts nothing counts as a retryable failure, so
//! a server that keeps returning nothing cannot stall the batch forever.

mod extract;
mod pending;

pub use pending::{ActionGroup, PendingBatch};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::action::{Action, Opener};
use crate::cache::StagingArea;
use crate::control::CancelCheck;
use crate::error::FetchError;
use crate::fetcher::Fetcher;
use crate::mirror::{Mirror, MirrorSelection};
use crate::progress::ProgressSink;
use crate::retry::{Attempt, RetryBudget};
use crate::transport::{FileListRequest, Transport};
use crate::verify::verify_content;

use extract::Extraction;

pub struct FileBatch<'a, T: Transport> {
    /// Label for logs (e.g. the package being installed).
    scope: String,
    fetcher: &'a mut Fetcher<T>,
    progress: &'a mut dyn ProgressSink,
    cancel: Arc<dyn CancelCheck>,
    pending: PendingBatch,
    staging: StagingArea,
    current: MirrorSelection,
    completed: Vec<Action>,
}

impl<'a, T: Transport> FileBatch<'a, T> {
    pub(crate) fn new(
        fetcher: &'a mut Fetcher<T>,
        scope: String,
        progress: &'a mut dyn ProgressSink,
        cancel: Arc<dyn CancelCheck>,
        capacity_bytes: u64,
    ) -> Self {
        let staging = StagingArea::new(fetcher.staging_root());
        Self {
            scope,
            fetcher,
            progress,
            cancel,
            pending: PendingBatch::new(capacity_bytes),
            staging,
            current: MirrorSelection::default(),
            completed: Vec::new(),
        }
    }

    /// Add an action. A valid cached payload completes it at once (reported
    /// as progress); otherwise it is queued, draining first if the queue is
    /// already at capacity.
    pub fn add_action(&mut self, mut action: Action) -> Result<(), FetchError> {
        let Some(hash) = action.payload_hash() else {
            return Err(FetchError::InvalidActionKind { kind: action.kind });
        };

        if let Some(cached) = self.fetcher.cache().lookup(&hash) {
            match verify_content(&action, &cached) {
                Ok(()) => {
                    let bytes = action.transfer_size();
                    action.opener = Some(Opener::new(cached));
                    self.progress.download_add_progress(1, bytes);
                    self.completed.push(action);
                    return Ok(());
                }
                Err(FetchError::InvalidContent { reason, .. }) => {
                    tracing::info!(hash = %hash, %reason, "purged invalid cache entry");
                    // Drop copies under other layouts too.
                    if let Err(e) = self.fetcher.cache().remove(&hash) {
                        tracing::warn!(hash = %hash, error = %e, "could not purge cache entry");
                    }
                }
                Err(e) => return Err(e),
            }
        }

        while self.pending.is_full() {
            self.drain()?;
        }
        self.pending.enqueue(action)
    }

    /// Drain until nothing is outstanding, then hand back every completed
    /// action (cache hits included).
    pub fn flush(&mut self) -> Result<Vec<Action>, FetchError> {
        while !self.pending.is_empty() {
            self.drain()?;
        }
        Ok(self.take_completed())
    }

    /// Completed actions collected so far.
    pub fn take_completed(&mut self) -> Vec<Action> {
        std::mem::take(&mut self.completed)
    }

    pub fn pending(&self) -> &PendingBatch {
        &self.pending
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// One retrieval round for everything pending. On success at least one
    /// hash left the pending set.
    fn drain(&mut self) -> Result<(), FetchError> {
        let mut budget = RetryBudget::for_endpoints(
            self.fetcher.settings().max_timeout,
            self.fetcher.mirrors().mirror_count(),
        );
        let mut tried: HashSet<Mirror> = HashSet::new();
        let files_before = self.pending.effective_files();
        let bytes_before = self.pending.effective_bytes();

        loop {
            if self.cancel.is_cancelled() {
                self.report_progress(files_before, bytes_before);
                return Err(FetchError::Cancelled);
            }

            let mirror = match self.current.current() {
                Some(m) => m.clone(),
                None => self.fetcher.mirrors().select_next(&mut tried),
            };
            tried.insert(mirror.clone());
            self.current.select(mirror.clone());

            let started = Instant::now();
            match Attempt::from(self.attempt(&mirror)) {
                Attempt::Success(extracted) => {
                    self.fetcher
                        .mirrors_mut()
                        .record_success(&mirror, started.elapsed());
                    self.report_progress(files_before, bytes_before);
                    tracing::info!(
                        scope = %self.scope,
                        mirror = %mirror,
                        extracted,
                        outstanding = self.pending.len(),
                        "drained batch"
                    );
                    return Ok(());
                }
                Attempt::Retryable(err) if self.pending.is_empty() => {
                    // Everything arrived before the stream broke.
                    tracing::debug!(scope = %self.scope, mirror = %mirror, error = %err, "ignoring trailing transfer error");
                    self.fetcher
                        .mirrors_mut()
                        .record_success(&mirror, started.elapsed());
                    self.report_progress(files_before, bytes_before);
                    return Ok(());
                }
                Attempt::Retryable(err) => {
                    tracing::warn!(scope = %self.scope, mirror = %mirror, error = %err, "retrieval attempt failed");
                    self.fetcher.mirrors_mut().record_error(&mirror, &err);
                    self.current.clear_on_failure();
                    if let Err(exhausted) = budget.spend(err) {
                        self.report_progress(files_before, bytes_before);
                        return Err(exhausted);
                    }
                }
                Attempt::Fatal(err) => {
                    self.report_progress(files_before, bytes_before);
                    return Err(err);
                }
            }
        }
    }

    /// Request and extract once from `mirror`. Partial staged files are
    /// removed on every failure.
    fn attempt(&mut self, mirror: &Mirror) -> Result<usize, FetchError> {
        self.staging.ensure_dir()?;
        let url = mirror
            .filelist_url()
            .map(|u| u.to_string())
            .unwrap_or_else(|_| mirror.to_string());
        let request = FileListRequest {
            hashes: self.pending.hashes().collect(),
            uuid: self.fetcher.settings().uuid.as_deref(),
            cancel: Arc::clone(&self.cancel),
        };

        let outcome = match self.fetcher.transport().fetch_filelist(mirror, &request) {
            Ok(stream) => Extraction {
                pending: &mut self.pending,
                staging: &mut self.staging,
                cache: self.fetcher.cache(),
                cancel: &*self.cancel,
                completed: &mut self.completed,
            }
            .run(stream, &url),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(0) => {
                self.staging.cleanup_partial();
                Err(FetchError::TransferContent {
                    url,
                    reason: "response contained none of the requested files".to_string(),
                })
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.staging.cleanup_partial();
                Err(e)
            }
        }
    }

    /// Report what left the pending set since the counters were sampled.
    fn report_progress(&mut self, files_before: u64, bytes_before: u64) {
        let files = files_before.saturating_sub(self.pending.effective_files());
        let bytes = bytes_before.saturating_sub(self.pending.effective_bytes());
        if files > 0 || bytes > 0 {
            self.progress.download_add_progress(files, bytes);
        }
    }
}
