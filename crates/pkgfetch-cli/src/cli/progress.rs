//! Console progress line for `pkgfetch fetch`.

use pkgfetch_core::progress::{ProgressSink, ProgressTracker};
use std::time::{Duration, Instant};

const PRINT_INTERVAL: Duration = Duration::from_millis(500);

/// Wraps a tracker and prints at most every [`PRINT_INTERVAL`].
pub struct ConsoleProgress {
    tracker: ProgressTracker,
    last_print: Option<Instant>,
}

impl ConsoleProgress {
    pub fn new(tracker: ProgressTracker) -> Self {
        Self {
            tracker,
            last_print: None,
        }
    }

    pub fn tracker(&self) -> &ProgressTracker {
        &self.tracker
    }

    fn print_line(&self) {
        let stats = self.tracker.stats();
        let done_mib = stats.bytes_done as f64 / 1_048_576.0;
        let rate_mib = stats.bytes_per_sec() / 1_048_576.0;
        let pct = stats
            .fraction()
            .map(|f| format!("{:.1}%", f * 100.0))
            .unwrap_or_else(|| "?".to_string());
        let eta = stats
            .eta_secs()
            .map(|s| format!("{:.0}s", s))
            .unwrap_or_else(|| "?".to_string());
        eprint!(
            "\r  {} files  {:.1} MiB ({})  {:.2} MiB/s  ETA {}  ",
            stats.files_done, done_mib, pct, rate_mib, eta
        );
    }

    /// Print the final line and end it.
    pub fn finish(&self) {
        self.print_line();
        eprintln!();
    }
}

impl ProgressSink for ConsoleProgress {
    fn download_add_progress(&mut self, files: u64, bytes: u64) {
        self.tracker.download_add_progress(files, bytes);
        let now = Instant::now();
        let due = self
            .last_print
            .map_or(true, |last| now.duration_since(last) >= PRINT_INTERVAL);
        if due {
            self.print_line();
            self.last_print = Some(now);
        }
    }
}
