//! `pkgfetch mirrors` – show persisted mirror statistics.

use anyhow::Result;
use pkgfetch_core::mirror::MirrorSet;

pub fn run_mirrors() -> Result<()> {
    let path = MirrorSet::default_stats_path()?;
    let Some(snapshot) = MirrorSet::read_snapshot(&path)? else {
        println!("No mirror statistics recorded.");
        return Ok(());
    };

    let mut entries: Vec<_> = snapshot.entries.into_iter().collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    println!(
        "{:<8} {:<8} {:<8} {:<10} {}",
        "OK", "ERRORS", "TIMEOUTS", "LATENCY", "URL"
    );
    for (url, entry) in entries {
        let latency = entry
            .mean_latency_ms
            .map(|ms| format!("{ms}ms"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<8} {:<8} {:<8} {:<10} {}",
            entry.success_events, entry.error_events, entry.timeout_events, latency, url
        );
    }
    Ok(())
}
