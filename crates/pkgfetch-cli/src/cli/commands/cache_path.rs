//! `pkgfetch cache-path <hash>` – locate a payload in the cache.

use anyhow::{Context, Result};
use pkgfetch_core::cache::ContentCache;
use pkgfetch_core::checksum::ContentHash;
use pkgfetch_core::config::FetchConfig;

pub fn run_cache_path(cfg: &FetchConfig, hash: &str) -> Result<()> {
    let hash = ContentHash::parse(hash).with_context(|| format!("invalid hash: {hash}"))?;
    let cache = ContentCache::new(cfg.cache_root()?);
    match cache.lookup(&hash) {
        Some(path) => println!("{}", path.display()),
        None => println!("{} (not cached)", cache.path_for(&hash).display()),
    }
    Ok(())
}
