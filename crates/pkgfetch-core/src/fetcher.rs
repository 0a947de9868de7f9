//! Retrieval context shared by batches: transport, endpoints, cache and staging.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::batch::FileBatch;
use crate::cache::ContentCache;
use crate::config::{FetchConfig, DEFAULT_BATCH_CAPACITY_BYTES};
use crate::control::CancelCheck;
use crate::mirror::MirrorSet;
use crate::progress::ProgressSink;
use crate::transport::{CurlTransport, Transport};

/// Settings a batch reads from its fetcher.
#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Attempts per endpoint per drain.
    pub max_timeout: u32,
    /// Client identifier sent with requests, if any.
    pub uuid: Option<String>,
    pub batch_capacity_bytes: u64,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            max_timeout: 4,
            uuid: None,
            batch_capacity_bytes: DEFAULT_BATCH_CAPACITY_BYTES,
        }
    }
}

impl FetchSettings {
    pub fn from_config(cfg: &FetchConfig) -> Self {
        Self {
            max_timeout: cfg.max_timeout,
            uuid: cfg.uuid_to_send().map(str::to_string),
            batch_capacity_bytes: cfg.batch_capacity_bytes,
        }
    }
}

pub struct Fetcher<T: Transport = CurlTransport> {
    transport: T,
    mirrors: MirrorSet,
    cache: ContentCache,
    staging_root: PathBuf,
    settings: FetchSettings,
}

impl Fetcher<CurlTransport> {
    /// libcurl-backed fetcher with cache and staging paths from `cfg`.
    pub fn from_config(cfg: &FetchConfig, mirrors: MirrorSet) -> anyhow::Result<Self> {
        Ok(Self::new(
            CurlTransport::from_config(cfg),
            mirrors,
            ContentCache::new(cfg.cache_root()?),
            cfg.staging_root()?,
            FetchSettings::from_config(cfg),
        ))
    }
}

impl<T: Transport> Fetcher<T> {
    pub fn new(
        transport: T,
        mirrors: MirrorSet,
        cache: ContentCache,
        staging_root: impl Into<PathBuf>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            transport,
            mirrors,
            cache,
            staging_root: staging_root.into(),
            settings,
        }
    }

    /// Start a batch with the configured capacity.
    pub fn batch<'a>(
        &'a mut self,
        scope: impl Into<String>,
        progress: &'a mut dyn ProgressSink,
        cancel: Arc<dyn CancelCheck>,
    ) -> FileBatch<'a, T> {
        let capacity = self.settings.batch_capacity_bytes;
        self.batch_with_capacity(scope, progress, cancel, capacity)
    }

    /// Start a batch that drains once `capacity_bytes` of transfer size is queued.
    pub fn batch_with_capacity<'a>(
        &'a mut self,
        scope: impl Into<String>,
        progress: &'a mut dyn ProgressSink,
        cancel: Arc<dyn CancelCheck>,
        capacity_bytes: u64,
    ) -> FileBatch<'a, T> {
        FileBatch::new(self, scope.into(), progress, cancel, capacity_bytes)
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn mirrors(&self) -> &MirrorSet {
        &self.mirrors
    }

    pub fn mirrors_mut(&mut self) -> &mut MirrorSet {
        &mut self.mirrors
    }

    pub fn cache(&self) -> &ContentCache {
        &self.cache
    }

    pub fn staging_root(&self) -> &Path {
        &self.staging_root
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }
}
