//! Persist mirror statistics (JSON under the XDG state dir) so ranking survives across runs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::{MirrorSet, MirrorStats};

/// Serializable per-endpoint entry (no Instant fields).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedEntry {
    pub success_events: u32,
    pub error_events: u32,
    #[serde(default)]
    pub timeout_events: u32,
    #[serde(default)]
    pub mean_latency_ms: Option<u64>,
}

/// Snapshot keyed by endpoint URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedMirrorStats {
    #[serde(default = "default_version")]
    pub version: u8,
    pub entries: HashMap<String, PersistedEntry>,
}

/// Whole milliseconds, clamped to `u64::MAX`.
pub(super) fn millis_saturating(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

fn default_version() -> u8 {
    1
}

impl MirrorSet {
    /// Default path: `~/.local/state/pkgfetch/mirrors.json`.
    pub fn default_stats_path() -> Result<PathBuf> {
        let xdg_dirs = xdg::BaseDirectories::with_prefix("pkgfetch")?;
        Ok(xdg_dirs.get_state_home().join("pkgfetch").join("mirrors.json"))
    }

    pub fn to_snapshot(&self) -> PersistedMirrorStats {
        let entries = self
            .stats
            .iter()
            .map(|(key, s)| {
                (
                    key.clone(),
                    PersistedEntry {
                        success_events: s.success_events,
                        error_events: s.error_events,
                        timeout_events: s.timeout_events,
                        mean_latency_ms: s.mean_latency().map(millis_saturating),
                    },
                )
            })
            .collect();
        PersistedMirrorStats {
            version: 1,
            entries,
        }
    }

    /// Replace in-memory counters with the snapshot's (entries are keyed by URL).
    pub fn apply_snapshot(&mut self, snapshot: PersistedMirrorStats) {
        for (key, pe) in snapshot.entries {
            let mean = Duration::from_millis(pe.mean_latency_ms.unwrap_or(0));
            let stats = MirrorStats {
                success_events: pe.success_events,
                error_events: pe.error_events,
                timeout_events: pe.timeout_events,
                last_success_at: None,
                last_error_at: None,
                last_latency: pe.mean_latency_ms.map(Duration::from_millis),
                total_latency: mean.saturating_mul(pe.success_events),
            };
            self.stats.insert(key, stats);
        }
    }

    /// Save statistics to `path` (creates the parent dir if needed).
    pub fn save_stats(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create dir: {}", parent.display()))?;
        }
        let json =
            serde_json::to_string_pretty(&self.to_snapshot()).context("serialize mirror stats")?;
        std::fs::write(path, json)
            .with_context(|| format!("write mirror stats: {}", path.display()))?;
        Ok(())
    }

    /// Read a snapshot from `path`; `None` when the file does not exist.
    pub fn read_snapshot(path: &Path) -> Result<Option<PersistedMirrorStats>> {
        let bytes = match std::fs::read(path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("read mirror stats: {}", path.display()))
            }
        };
        let snapshot = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse mirror stats: {}", path.display()))?;
        Ok(Some(snapshot))
    }

    /// Load statistics from `path`. A missing file is not an error; returns
    /// whether anything was loaded.
    pub fn load_stats(&mut self, path: &Path) -> Result<bool> {
        match Self::read_snapshot(path)? {
            Some(snapshot) => {
                self.apply_snapshot(snapshot);
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
