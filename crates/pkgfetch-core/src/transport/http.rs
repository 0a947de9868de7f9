//! libcurl transport.
//!
//! Each request runs on its own thread with a blocking `Easy` handle. The
//! write callback forwards body chunks through a bounded channel, so the
//! transfer stalls when the extractor falls behind instead of buffering the
//! whole archive. The progress callback aborts the transfer when the batch is
//! cancelled or the reader has been dropped.

use curl::easy::{Easy, List};
use std::cell::Cell;
use std::io::Read;
use std::path::PathBuf;
use std::str;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{sync_channel, SyncSender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::stream::{BodyReader, Event};
use super::{encode_filelist_body, user_agent, FileListRequest, Transport, UUID_HEADER};
use crate::config::FetchConfig;
use crate::control::CancelCheck;
use crate::error::FetchError;
use crate::mirror::Mirror;
use crate::retry::{classify_curl_error, classify_http_status, RetryTable};

/// Body chunks buffered between the transfer thread and the reader.
const CHANNEL_DEPTH: usize = 16;

/// libcurl options for file-list requests.
#[derive(Debug, Clone)]
pub struct TransportSettings {
    pub connect_timeout: Duration,
    /// Abort when throughput stays below `lowspeed_limit` for this long.
    pub lowspeed_timeout: Duration,
    /// Bytes per second.
    pub lowspeed_limit: u32,
    pub max_redirects: u32,
    pub user_agent: String,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(60),
            lowspeed_timeout: Duration::from_secs(30),
            lowspeed_limit: 1024,
            max_redirects: 5,
            user_agent: user_agent(),
        }
    }
}

/// [`Transport`] backed by libcurl.
#[derive(Debug, Clone, Default)]
pub struct CurlTransport {
    settings: TransportSettings,
    retryable: RetryTable,
}

impl CurlTransport {
    pub fn new(settings: TransportSettings, retryable: RetryTable) -> Self {
        Self {
            settings,
            retryable,
        }
    }

    pub fn from_config(cfg: &FetchConfig) -> Self {
        let settings = TransportSettings {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            lowspeed_timeout: Duration::from_secs(cfg.lowspeed_timeout_secs),
            lowspeed_limit: cfg.lowspeed_limit,
            max_redirects: cfg.max_redirects,
            user_agent: user_agent(),
        };
        Self::new(settings, cfg.retryable.clone())
    }

    pub fn settings(&self) -> &TransportSettings {
        &self.settings
    }
}

/// Everything the transfer thread needs, owned.
struct TransferJob {
    url: String,
    body: String,
    uuid: Option<String>,
    ssl_cert: Option<PathBuf>,
    ssl_key: Option<PathBuf>,
    settings: TransportSettings,
    retryable: RetryTable,
    cancel: Arc<dyn CancelCheck>,
    closed: Arc<AtomicBool>,
}

impl Transport for CurlTransport {
    fn fetch_filelist(
        &self,
        mirror: &Mirror,
        request: &FileListRequest<'_>,
    ) -> Result<Box<dyn Read>, FetchError> {
        let url = mirror
            .filelist_url()
            .map_err(|e| FetchError::FileListRetrieval {
                url: mirror.to_string(),
                reason: format!("invalid endpoint: {e}"),
            })?
            .to_string();

        let closed = Arc::new(AtomicBool::new(false));
        let job = TransferJob {
            url: url.clone(),
            body: encode_filelist_body(&request.hashes),
            uuid: request.uuid.map(str::to_string),
            ssl_cert: mirror.ssl_cert().cloned(),
            ssl_key: mirror.ssl_key().cloned(),
            settings: self.settings.clone(),
            retryable: self.retryable.clone(),
            cancel: Arc::clone(&request.cancel),
            closed: Arc::clone(&closed),
        };

        tracing::debug!(url = %url, files = request.hashes.len(), "requesting file list");

        let (tx, rx) = sync_channel(CHANNEL_DEPTH);
        thread::Builder::new()
            .name("pkgfetch-transfer".to_string())
            .spawn(move || run_transfer(job, tx))
            .map_err(|e| FetchError::TransferContent {
                url: url.clone(),
                reason: format!("cannot start transfer thread: {e}"),
            })?;

        match rx.recv() {
            Ok(Event::Status(200)) => Ok(Box::new(BodyReader::new(rx, closed))),
            Ok(Event::Status(code)) => {
                closed.store(true, Ordering::Relaxed);
                Err(classify_http_status(&self.retryable, code, &url))
            }
            Ok(Event::Failed(e)) => Err(e),
            Ok(Event::Data(_)) | Ok(Event::Done) => {
                closed.store(true, Ordering::Relaxed);
                Err(FetchError::FileListRetrieval {
                    url,
                    reason: "response carried no status".to_string(),
                })
            }
            Err(_) => Err(FetchError::TransferContent {
                url,
                reason: "transfer ended before a response arrived".to_string(),
            }),
        }
    }
}

fn run_transfer(job: TransferJob, tx: SyncSender<Event>) {
    let mut easy = Easy::new();
    let outcome = configure(&mut easy, &job).and_then(|()| perform(&mut easy, &job, &tx));
    match outcome {
        Ok(status_sent) => {
            if !status_sent {
                // Empty body: the write callback never ran.
                let code = easy.response_code().unwrap_or(0);
                let _ = tx.send(Event::Status(code));
            }
            let _ = tx.send(Event::Done);
        }
        Err(e) => {
            if job.closed.load(Ordering::Relaxed) {
                tracing::trace!(url = %job.url, "transfer stopped after reader closed");
                return;
            }
            let err = if e.is_aborted_by_callback() && job.cancel.is_cancelled() {
                FetchError::Cancelled
            } else {
                classify_curl_error(&job.retryable, &e, &job.url)
            };
            tracing::debug!(url = %job.url, error = %e, "transfer failed");
            let _ = tx.send(Event::Failed(err));
        }
    }
}

fn configure(easy: &mut Easy, job: &TransferJob) -> Result<(), curl::Error> {
    easy.url(&job.url)?;
    easy.post(true)?;
    easy.post_fields_copy(job.body.as_bytes())?;
    easy.useragent(&job.settings.user_agent)?;
    easy.follow_location(true)?;
    easy.max_redirections(job.settings.max_redirects)?;
    easy.connect_timeout(job.settings.connect_timeout)?;
    easy.low_speed_limit(job.settings.lowspeed_limit)?;
    easy.low_speed_time(job.settings.lowspeed_timeout)?;
    easy.progress(true)?;
    if let Some(cert) = &job.ssl_cert {
        easy.ssl_cert(cert)?;
    }
    if let Some(key) = &job.ssl_key {
        easy.ssl_key(key)?;
    }

    let mut headers = List::new();
    // Large bodies would otherwise wait on a 100-continue round trip.
    headers.append("Expect:")?;
    if let Some(uuid) = &job.uuid {
        headers.append(&format!("{UUID_HEADER}: {uuid}"))?;
    }
    easy.http_headers(headers)?;
    Ok(())
}

/// Runs the request. Returns whether the status was already sent (i.e. the
/// body callback ran at least once).
fn perform(easy: &mut Easy, job: &TransferJob, tx: &SyncSender<Event>) -> Result<bool, curl::Error> {
    let status = Cell::new(0u32);
    let status_sent = Cell::new(false);
    {
        let mut transfer = easy.transfer();
        transfer.header_function(|line| {
            if let Some(code) = parse_status_line(line) {
                status.set(code);
            }
            true
        })?;
        transfer.write_function(|data| {
            if !status_sent.get() {
                status_sent.set(true);
                if tx.send(Event::Status(status.get())).is_err() {
                    return Ok(0);
                }
            }
            if status.get() != 200 {
                // Error body: the caller has what it needs.
                return Ok(0);
            }
            match tx.send(Event::Data(data.to_vec())) {
                Ok(()) => Ok(data.len()),
                Err(_) => Ok(0), // reader dropped: abort transfer
            }
        })?;
        transfer.progress_function(|_, _, _, _| {
            !(job.cancel.is_cancelled() || job.closed.load(Ordering::Relaxed))
        })?;
        transfer.perform()?;
    }
    Ok(status_sent.get())
}

/// Status code from a header line like `HTTP/1.1 200 OK` or `HTTP/2 404`.
fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_lines() {
        assert_eq!(parse_status_line(b"HTTP/1.1 200 OK\r\n"), Some(200));
        assert_eq!(parse_status_line(b"HTTP/2 404\r\n"), Some(404));
        assert_eq!(parse_status_line(b"Content-Type: application/x-tar\r\n"), None);
        assert_eq!(parse_status_line(b"HTTP/1.1 abc\r\n"), None);
    }

    #[test]
    fn from_config_copies_timeouts_and_table() {
        let mut cfg = FetchConfig::default();
        cfg.connect_timeout_secs = 7;
        cfg.lowspeed_timeout_secs = 11;
        cfg.retryable.http_codes.insert(503);
        let t = CurlTransport::from_config(&cfg);
        assert_eq!(t.settings().connect_timeout, Duration::from_secs(7));
        assert_eq!(t.settings().lowspeed_timeout, Duration::from_secs(11));
        assert!(t.retryable.is_retryable_http(503));
    }
}
