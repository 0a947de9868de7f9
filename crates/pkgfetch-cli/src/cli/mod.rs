//! CLI for pkgfetch.

mod commands;
mod progress;

use anyhow::Result;
use clap::{Parser, Subcommand};
use pkgfetch_core::config;
use std::path::PathBuf;

use commands::{run_cache_path, run_checksum, run_fetch, run_mirrors, FetchArgs};

/// Top-level CLI for pkgfetch.
#[derive(Debug, Parser)]
#[command(name = "pkgfetch")]
#[command(about = "pkgfetch: batched, verified package payload retrieval", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Retrieve the payloads for every action in a manifest into the cache.
    Fetch {
        /// JSON file holding an array of actions.
        manifest: PathBuf,

        /// Repository base URL (e.g. http://pkg.example.com/release/).
        #[arg(long, value_name = "URL")]
        origin: String,

        /// Additional mirror base URL; repeat for several.
        #[arg(long = "mirror", value_name = "URL")]
        mirrors: Vec<String>,

        /// Drain once this many bytes of transfer size are queued (0 = unbounded).
        #[arg(long, value_name = "BYTES")]
        capacity: Option<u64>,

        /// Client certificate presented to every endpoint.
        #[arg(long, value_name = "PATH", requires = "ssl_key")]
        ssl_cert: Option<PathBuf>,

        /// Private key for --ssl-cert.
        #[arg(long, value_name = "PATH", requires = "ssl_cert")]
        ssl_key: Option<PathBuf>,

        /// Give up after this many seconds.
        #[arg(long, value_name = "SECS")]
        deadline: Option<u64>,

        /// Do not read or update persisted mirror statistics.
        #[arg(long)]
        no_stats: bool,
    },

    /// Print the content hash of a file.
    Checksum {
        /// Path to the file.
        path: PathBuf,

        /// Hash the gunzipped contents instead of the stored bytes.
        #[arg(long)]
        gunzip: bool,

        /// Use SHA-1 instead of SHA-256.
        #[arg(long)]
        sha1: bool,
    },

    /// Show where a payload lives (or would live) in the cache.
    CachePath {
        /// Content hash (40 or 64 hex characters).
        hash: String,
    },

    /// Show persisted mirror statistics.
    Mirrors,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        let cli = Cli::parse();
        let cfg = config::load_or_init()?;
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Fetch {
                manifest,
                origin,
                mirrors,
                capacity,
                ssl_cert,
                ssl_key,
                deadline,
                no_stats,
            } => run_fetch(
                &cfg,
                FetchArgs {
                    manifest,
                    origin,
                    mirrors,
                    capacity,
                    client_cert: ssl_cert.zip(ssl_key),
                    deadline,
                    no_stats,
                },
            )?,
            CliCommand::Checksum { path, gunzip, sha1 } => run_checksum(&path, gunzip, sha1)?,
            CliCommand::CachePath { hash } => run_cache_path(&cfg, &hash)?,
            CliCommand::Mirrors => run_mirrors()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
