use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use crate::retry::RetryTable;

/// Environment variables that override the matching config fields.
pub const ENV_MAX_TIMEOUT: &str = "PKG_CLIENT_MAX_TIMEOUT";
pub const ENV_CONNECT_TIMEOUT: &str = "PKG_CLIENT_CONNECT_TIMEOUT";
pub const ENV_LOWSPEED_TIMEOUT: &str = "PKG_CLIENT_LOWSPEED_TIMEOUT";

/// Default batch capacity: 1 MiB of queued transfer size.
pub const DEFAULT_BATCH_CAPACITY_BYTES: u64 = 1024 * 1024;

/// Global configuration loaded from `~/.config/pkgfetch/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Attempts per endpoint before a drain gives up (scaled by mirror count).
    pub max_timeout: u32,
    /// Seconds allowed for connection setup.
    pub connect_timeout_secs: u64,
    /// Seconds a transfer may stay below `lowspeed_limit` before it is aborted.
    pub lowspeed_timeout_secs: u64,
    /// Bytes per second considered "stalled".
    pub lowspeed_limit: u32,
    pub max_redirects: u32,
    /// Queued transfer size at which a batch drains before accepting more.
    pub batch_capacity_bytes: u64,
    /// Send the client UUID header with requests (when a UUID is set).
    #[serde(default = "default_send_uuid")]
    pub send_uuid: bool,
    #[serde(default)]
    pub client_uuid: Option<String>,
    /// Override for the download cache (default: XDG cache dir).
    #[serde(default)]
    pub cache_dir: Option<PathBuf>,
    /// Override for the staging dir (default: `incoming` next to the cache).
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    /// Which HTTP and curl codes are retried.
    #[serde(default)]
    pub retryable: RetryTable,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_timeout: 4,
            connect_timeout_secs: 60,
            lowspeed_timeout_secs: 30,
            lowspeed_limit: 1024,
            max_redirects: 5,
            batch_capacity_bytes: DEFAULT_BATCH_CAPACITY_BYTES,
            send_uuid: true,
            client_uuid: None,
            cache_dir: None,
            staging_dir: None,
            retryable: RetryTable::default(),
        }
    }
}

impl FetchConfig {
    /// Apply `PKG_CLIENT_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from any key lookup (the environment in production).
    /// A value that does not parse is logged and the configured value kept.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        override_from(&lookup, ENV_MAX_TIMEOUT, &mut self.max_timeout);
        override_from(&lookup, ENV_CONNECT_TIMEOUT, &mut self.connect_timeout_secs);
        override_from(&lookup, ENV_LOWSPEED_TIMEOUT, &mut self.lowspeed_timeout_secs);
    }

    /// UUID to send, if the client opted in and has one.
    pub fn uuid_to_send(&self) -> Option<&str> {
        if self.send_uuid {
            self.client_uuid.as_deref()
        } else {
            None
        }
    }

    /// Download cache root: configured, else `~/.cache/pkgfetch/file`.
    pub fn cache_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.cache_dir {
            return Ok(dir.clone());
        }
        Ok(default_cache_base()?.join("file"))
    }

    /// Staging root: configured, else `incoming` beside the default cache.
    /// Keep it on the same filesystem as the cache root.
    pub fn staging_root(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.staging_dir {
            return Ok(dir.clone());
        }
        match &self.cache_dir {
            Some(cache) => Ok(cache.join("incoming")),
            None => Ok(default_cache_base()?.join("incoming")),
        }
    }
}

fn override_from<F, T>(lookup: &F, key: &str, field: &mut T)
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(v) => *field = v,
        Err(_) => tracing::warn!("ignoring {key}={raw:?}: not a number, keeping {field}"),
    }
}

fn default_send_uuid() -> bool {
    true
}

fn default_cache_base() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pkgfetch")?;
    Ok(xdg_dirs.get_cache_home().join("pkgfetch"))
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("pkgfetch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
/// Environment overrides are applied on top.
pub fn load_or_init() -> Result<FetchConfig> {
    let path = config_path()?;
    let mut cfg = if !path.exists() {
        let default_cfg = FetchConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        default_cfg
    } else {
        let data = fs::read_to_string(&path)?;
        toml::from_str(&data).with_context(|| format!("parse config: {}", path.display()))?
    };
    cfg.apply_env_overrides();
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let cfg = FetchConfig::default();
        assert_eq!(cfg.max_timeout, 4);
        assert_eq!(cfg.batch_capacity_bytes, 1024 * 1024);
        assert!(cfg.send_uuid);
        assert_eq!(cfg.uuid_to_send(), None);
        assert!(cfg.retryable.is_retryable_http(502));
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = FetchConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: FetchConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.max_timeout, cfg.max_timeout);
        assert_eq!(parsed.connect_timeout_secs, cfg.connect_timeout_secs);
        assert_eq!(parsed.retryable, cfg.retryable);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_timeout = 2
            connect_timeout_secs = 10
            lowspeed_timeout_secs = 5
            lowspeed_limit = 512
            max_redirects = 3
            batch_capacity_bytes = 4096
            send_uuid = true
            client_uuid = "0f3c1e9a-5a1b-4c55-9d1e-2a7f4e0c8b11"
            cache_dir = "/var/cache/pkgfetch"

            [retryable]
            http_codes = [503]
            curl_codes = [28]
        "#;
        let cfg: FetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_timeout, 2);
        assert_eq!(cfg.batch_capacity_bytes, 4096);
        assert_eq!(cfg.uuid_to_send(), Some("0f3c1e9a-5a1b-4c55-9d1e-2a7f4e0c8b11"));
        assert!(cfg.retryable.is_retryable_http(503));
        assert!(!cfg.retryable.is_retryable_http(502));
        assert_eq!(
            cfg.staging_root().unwrap(),
            PathBuf::from("/var/cache/pkgfetch/incoming")
        );
    }

    #[test]
    fn missing_retry_table_uses_defaults() {
        let toml = r#"
            max_timeout = 4
            connect_timeout_secs = 60
            lowspeed_timeout_secs = 30
            lowspeed_limit = 1024
            max_redirects = 5
            batch_capacity_bytes = 1048576
        "#;
        let cfg: FetchConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.retryable, RetryTable::default());
        assert_eq!(cfg.uuid_to_send(), None);
    }

    #[test]
    fn env_overrides_apply_and_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            (ENV_MAX_TIMEOUT, "9"),
            (ENV_CONNECT_TIMEOUT, " 15 "),
        ]
        .into_iter()
        .collect();
        let mut cfg = FetchConfig::default();
        cfg.apply_overrides_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(cfg.max_timeout, 9);
        assert_eq!(cfg.connect_timeout_secs, 15);
        assert_eq!(cfg.lowspeed_timeout_secs, 30);

        let mut bad = FetchConfig::default();
        bad.lowspeed_timeout_secs = 12;
        bad.apply_overrides_from(|k| (k == ENV_LOWSPEED_TIMEOUT).then(|| "soon".to_string()));
        assert_eq!(bad.lowspeed_timeout_secs, 12);
    }
}
