//! Progress reporting for retrieval (files and bytes done, rate, ETA).
//!
//! The batch reports deltas through [`ProgressSink`]; a cache hit reports one
//! file and its transfer size, a drain reports whatever it removed from the
//! pending set.

use std::time::Instant;

/// Receives progress deltas from a batch.
pub trait ProgressSink {
    fn download_add_progress(&mut self, files: u64, bytes: u64);
}

/// Discards progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn download_add_progress(&mut self, _files: u64, _bytes: u64) {}
}

/// Accumulates deltas and answers rate questions for the CLI.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started: Instant,
    files_done: u64,
    bytes_done: u64,
    total_bytes: Option<u64>,
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            files_done: 0,
            bytes_done: 0,
            total_bytes: None,
        }
    }

    /// Expected total, when the caller knows it up front.
    pub fn with_total_bytes(mut self, total: u64) -> Self {
        self.total_bytes = Some(total);
        self
    }

    pub fn files_done(&self) -> u64 {
        self.files_done
    }

    pub fn bytes_done(&self) -> u64 {
        self.bytes_done
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Snapshot for display.
    pub fn stats(&self) -> ProgressStats {
        ProgressStats {
            files_done: self.files_done,
            bytes_done: self.bytes_done,
            total_bytes: self.total_bytes,
            elapsed_secs: self.elapsed_secs(),
        }
    }
}

impl ProgressSink for ProgressTracker {
    fn download_add_progress(&mut self, files: u64, bytes: u64) {
        self.files_done = self.files_done.saturating_add(files);
        self.bytes_done = self.bytes_done.saturating_add(bytes);
        tracing::trace!(
            files_done = self.files_done,
            bytes_done = self.bytes_done,
            "progress"
        );
    }
}

/// Point-in-time progress.
#[derive(Debug, Clone)]
pub struct ProgressStats {
    pub files_done: u64,
    pub bytes_done: u64,
    pub total_bytes: Option<u64>,
    pub elapsed_secs: f64,
}

impl ProgressStats {
    /// Bytes per second (0 if elapsed is 0).
    pub fn bytes_per_sec(&self) -> f64 {
        if self.elapsed_secs <= 0.0 {
            return 0.0;
        }
        self.bytes_done as f64 / self.elapsed_secs
    }

    /// Estimated seconds remaining (None without a total or a rate).
    pub fn eta_secs(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let remaining = total.saturating_sub(self.bytes_done);
        if remaining == 0 {
            return Some(0.0);
        }
        let rate = self.bytes_per_sec();
        if rate <= 0.0 {
            return None;
        }
        Some(remaining as f64 / rate)
    }

    /// Fraction complete in [0.0, 1.0]; None without a total.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total_bytes?;
        if total == 0 {
            return Some(1.0);
        }
        Some((self.bytes_done as f64 / total as f64).min(1.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracker_accumulates_deltas() {
        let mut t = ProgressTracker::new().with_total_bytes(100);
        t.download_add_progress(1, 40);
        t.download_add_progress(2, 20);
        assert_eq!(t.files_done(), 3);
        assert_eq!(t.bytes_done(), 60);
        let s = t.stats();
        assert_eq!(s.fraction(), Some(0.6));
    }

    #[test]
    fn stats_rate_and_eta() {
        let s = ProgressStats {
            files_done: 1,
            bytes_done: 50,
            total_bytes: Some(150),
            elapsed_secs: 5.0,
        };
        assert!((s.bytes_per_sec() - 10.0).abs() < 1e-9);
        assert_eq!(s.eta_secs(), Some(10.0));

        let unknown = ProgressStats {
            total_bytes: None,
            ..s
        };
        assert_eq!(unknown.eta_secs(), None);
        assert_eq!(unknown.fraction(), None);
    }
}
