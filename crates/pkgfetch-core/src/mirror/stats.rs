//! Per-endpoint statistics.

use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default)]
pub struct MirrorStats {
    pub success_events: u32,
    pub error_events: u32,
    /// Subset of `error_events` that were timeouts.
    pub timeout_events: u32,
    pub last_success_at: Option<Instant>,
    pub last_error_at: Option<Instant>,
    pub last_latency: Option<Duration>,
    pub(super) total_latency: Duration,
}

impl MirrorStats {
    /// Mean time-to-completion of successful drains.
    pub fn mean_latency(&self) -> Option<Duration> {
        if self.success_events == 0 {
            return None;
        }
        Some(self.total_latency / self.success_events)
    }
}
