//! Repository endpoints and per-endpoint statistics.
//!
//! A `MirrorSet` holds the origin plus zero or more mirrors, records how each
//! endpoint behaved (successes, errors, latency) and picks the next endpoint
//! for a batch to try. Statistics can be persisted between runs.

mod endpoint;
mod persist;
mod selection;
mod stats;

pub use endpoint::Mirror;
pub use persist::PersistedMirrorStats;
pub use selection::MirrorSelection;
pub use stats::MirrorStats;

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::error::FetchError;

#[derive(Debug, Clone)]
pub struct MirrorSet {
    origin: Mirror,
    mirrors: Vec<Mirror>,
    stats: HashMap<String, MirrorStats>,
}

impl MirrorSet {
    /// Mirrors equal to the origin (or to each other) are dropped.
    pub fn new(origin: Mirror, mirrors: Vec<Mirror>) -> Self {
        let mut unique: Vec<Mirror> = Vec::with_capacity(mirrors.len());
        for m in mirrors {
            if m != origin && !unique.contains(&m) {
                unique.push(m);
            }
        }
        Self {
            origin,
            mirrors: unique,
            stats: HashMap::new(),
        }
    }

    pub fn origin(&self) -> &Mirror {
        &self.origin
    }

    /// Number of mirrors, not counting the origin.
    pub fn mirror_count(&self) -> usize {
        self.mirrors.len()
    }

    /// Origin first, then mirrors in configuration order.
    pub fn endpoints(&self) -> impl Iterator<Item = &Mirror> {
        std::iter::once(&self.origin).chain(self.mirrors.iter())
    }

    pub fn stats(&self, mirror: &Mirror) -> Option<&MirrorStats> {
        self.stats.get(mirror.key())
    }

    /// Pick the best-ranked endpoint not yet in `tried` and add it there.
    /// When every endpoint has been tried, `tried` starts over.
    pub fn select_next(&self, tried: &mut HashSet<Mirror>) -> Mirror {
        if self.endpoints().all(|m| tried.contains(m)) {
            tried.clear();
        }
        let chosen = self
            .endpoints()
            .enumerate()
            .filter(|(_, m)| !tried.contains(*m))
            .min_by_key(|(index, m)| self.rank(m, *index))
            .map(|(_, m)| m.clone())
            .unwrap_or_else(|| self.origin.clone());
        tried.insert(chosen.clone());
        chosen
    }

    /// Lower is better: failure ratio, then mean latency, then config order.
    /// Endpoints with no recorded latency sort after measured ones.
    fn rank(&self, mirror: &Mirror, index: usize) -> (u64, Duration, usize) {
        let Some(s) = self.stats(mirror) else {
            return (0, Duration::MAX, index);
        };
        let attempts = u64::from(s.success_events) + u64::from(s.error_events);
        let failure_per_mille = if attempts == 0 {
            0
        } else {
            u64::from(s.error_events) * 1000 / attempts
        };
        (
            failure_per_mille,
            s.mean_latency().unwrap_or(Duration::MAX),
            index,
        )
    }

    fn entry_mut(&mut self, mirror: &Mirror) -> &mut MirrorStats {
        self.stats.entry(mirror.key().to_string()).or_default()
    }

    /// Record a successful drain and how long it took.
    pub fn record_success(&mut self, mirror: &Mirror, latency: Duration) {
        let entry = self.entry_mut(mirror);
        entry.success_events = entry.success_events.saturating_add(1);
        entry.last_success_at = Some(Instant::now());
        entry.last_latency = Some(latency);
        entry.total_latency = entry.total_latency.saturating_add(latency);
    }

    /// Record a failed attempt against `mirror`.
    pub fn record_error(&mut self, mirror: &Mirror, error: &FetchError) {
        let entry = self.entry_mut(mirror);
        entry.error_events = entry.error_events.saturating_add(1);
        if matches!(error, FetchError::TransferTimedOut { .. }) {
            entry.timeout_events = entry.timeout_events.saturating_add(1);
        }
        entry.last_error_at = Some(Instant::now());
    }
}
