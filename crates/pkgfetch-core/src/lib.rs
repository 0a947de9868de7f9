pub mod config;
pub mod logging;

pub mod action;
pub mod batch;
pub mod cache;
pub mod checksum;
pub mod control;
pub mod error;
pub mod fetcher;
pub mod mirror;
pub mod progress;
pub mod retry;
pub mod transport;
pub mod verify;

pub use error::FetchError;
