//! CLI command handlers. Each command is in its own file.

mod cache_path;
mod checksum;
mod fetch;
mod mirrors;

pub use cache_path::run_cache_path;
pub use checksum::run_checksum;
pub use fetch::{run_fetch, FetchArgs};
#[cfg(test)]
pub(crate) use fetch::mirror_set;
pub use mirrors::run_mirrors;
