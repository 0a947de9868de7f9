//! `pkgfetch fetch <manifest>` – retrieve payloads for a list of actions.

use anyhow::{Context, Result};
use pkgfetch_core::action::Action;
use pkgfetch_core::batch::FileBatch;
use pkgfetch_core::config::FetchConfig;
use pkgfetch_core::control::{CancelCheck, NeverCancel};
use pkgfetch_core::fetcher::Fetcher;
use pkgfetch_core::mirror::{Mirror, MirrorSet};
use pkgfetch_core::progress::ProgressTracker;
use pkgfetch_core::transport::Transport;
use pkgfetch_core::FetchError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::progress::ConsoleProgress;

#[derive(Debug)]
pub struct FetchArgs {
    pub manifest: PathBuf,
    pub origin: String,
    pub mirrors: Vec<String>,
    pub capacity: Option<u64>,
    /// Certificate and key paths applied to the origin and every mirror.
    pub client_cert: Option<(PathBuf, PathBuf)>,
    pub deadline: Option<u64>,
    pub no_stats: bool,
}

pub fn run_fetch(cfg: &FetchConfig, args: FetchArgs) -> Result<()> {
    let actions = read_manifest(&args.manifest)?;
    let mirrors = mirror_set(&args.origin, &args.mirrors, args.client_cert.as_ref())?;
    let stats_path = if args.no_stats {
        None
    } else {
        MirrorSet::default_stats_path().ok()
    };

    let mut fetcher = Fetcher::from_config(cfg, mirrors)?;
    if let Some(path) = &stats_path {
        match fetcher.mirrors_mut().load_stats(path) {
            Ok(true) => tracing::debug!("loaded mirror stats from {}", path.display()),
            Ok(false) => {}
            Err(e) => tracing::warn!("ignoring mirror stats: {:#}", e),
        }
    }

    let total: u64 = actions.iter().map(Action::transfer_size).sum();
    let mut progress = ConsoleProgress::new(ProgressTracker::new().with_total_bytes(total));
    let cancel: Arc<dyn CancelCheck> = match args.deadline {
        Some(secs) => {
            let until = Instant::now() + Duration::from_secs(secs);
            Arc::new(move || Instant::now() >= until)
        }
        None => Arc::new(NeverCancel),
    };
    let capacity = args.capacity.unwrap_or(cfg.batch_capacity_bytes);
    let scope = args
        .manifest
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "manifest".to_string());

    let outcome = {
        let mut batch = fetcher.batch_with_capacity(scope, &mut progress, cancel, capacity);
        add_all(&mut batch, actions)
    };
    progress.finish();

    if let Some(path) = &stats_path {
        if let Err(e) = fetcher.mirrors().save_stats(path) {
            tracing::warn!("could not save mirror stats: {:#}", e);
        }
    }

    let done = outcome?;
    for action in &done {
        let hash = action
            .payload_hash()
            .map(|h| h.to_string())
            .unwrap_or_default();
        let cached = action
            .opener
            .as_ref()
            .map(|o| o.path().display().to_string())
            .unwrap_or_default();
        println!(
            "{}  {}  {}",
            hash,
            action.path.as_deref().unwrap_or("-"),
            cached
        );
    }
    let stats = progress.tracker().stats();
    println!(
        "{} files, {} bytes in {:.1}s",
        stats.files_done, stats.bytes_done, stats.elapsed_secs
    );
    Ok(())
}

fn read_manifest(path: &Path) -> Result<Vec<Action>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read manifest: {}", path.display()))?;
    let actions = serde_json::from_str(&text)
        .with_context(|| format!("parse manifest: {}", path.display()))?;
    Ok(actions)
}

pub(crate) fn mirror_set(
    origin: &str,
    mirrors: &[String],
    client_cert: Option<&(PathBuf, PathBuf)>,
) -> Result<MirrorSet> {
    let endpoint = |s: &str, what: &str| -> Result<Mirror> {
        let m = Mirror::parse(s).with_context(|| format!("invalid {what} URL: {s}"))?;
        Ok(match client_cert {
            Some((cert, key)) => m.with_client_cert(cert, key),
            None => m,
        })
    };
    let origin = endpoint(origin, "origin")?;
    let mirrors = mirrors
        .iter()
        .map(|m| endpoint(m, "mirror"))
        .collect::<Result<Vec<_>>>()?;
    Ok(MirrorSet::new(origin, mirrors))
}

fn add_all<T: Transport>(
    batch: &mut FileBatch<'_, T>,
    actions: Vec<Action>,
) -> Result<Vec<Action>, FetchError> {
    for action in actions {
        batch.add_action(action)?;
    }
    batch.flush()
}
