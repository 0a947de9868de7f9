//! Tests for checksum, cache-path, mirrors.

use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::Path;

#[test]
fn cli_parse_checksum_defaults_to_sha256_of_stored_bytes() {
    match parse(&["pkgfetch", "checksum", "/tmp/payload"]) {
        CliCommand::Checksum { path, gunzip, sha1 } => {
            assert_eq!(path, Path::new("/tmp/payload"));
            assert!(!gunzip);
            assert!(!sha1);
        }
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_checksum_flags() {
    match parse(&["pkgfetch", "checksum", "p.gz", "--gunzip", "--sha1"]) {
        CliCommand::Checksum { gunzip, sha1, .. } => {
            assert!(gunzip);
            assert!(sha1);
        }
        _ => panic!("expected Checksum"),
    }
}

#[test]
fn cli_parse_cache_path() {
    let hash = "a9993e364706816aba3e25717850c26c9cd0d89d";
    match parse(&["pkgfetch", "cache-path", hash]) {
        CliCommand::CachePath { hash: h } => assert_eq!(h, hash),
        _ => panic!("expected CachePath"),
    }
}

#[test]
fn cli_parse_mirrors() {
    match parse(&["pkgfetch", "mirrors"]) {
        CliCommand::Mirrors => {}
        _ => panic!("expected Mirrors"),
    }
}

#[test]
fn cli_parse_unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["pkgfetch", "status"]).is_err());
}
