//! Map HTTP status, curl errors and stream read errors onto `FetchError`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io;

use crate::error::FetchError;

// libcurl result codes (CURLcode).
pub(crate) const CURLE_COULDNT_RESOLVE_HOST: u32 = 6;
pub(crate) const CURLE_COULDNT_CONNECT: u32 = 7;
pub(crate) const CURLE_PARTIAL_FILE: u32 = 18;
pub(crate) const CURLE_OPERATION_TIMEDOUT: u32 = 28;
pub(crate) const CURLE_TOO_MANY_REDIRECTS: u32 = 47;
pub(crate) const CURLE_GOT_NOTHING: u32 = 52;
pub(crate) const CURLE_SEND_ERROR: u32 = 55;
pub(crate) const CURLE_RECV_ERROR: u32 = 56;
pub(crate) const CURLE_BAD_CONTENT_ENCODING: u32 = 61;

/// Codes that are worth retrying. Lives in config so operators can tune it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryTable {
    /// HTTP status codes treated as transient (mapped to a timeout).
    pub http_codes: BTreeSet<u32>,
    /// libcurl result codes treated as transient.
    pub curl_codes: BTreeSet<u32>,
}

impl Default for RetryTable {
    fn default() -> Self {
        Self {
            // not found (mirror catching up), request timeout, bad gateway, gateway timeout
            http_codes: [404, 408, 502, 504].into_iter().collect(),
            curl_codes: [
                CURLE_COULDNT_RESOLVE_HOST,
                CURLE_COULDNT_CONNECT,
                CURLE_PARTIAL_FILE,
                CURLE_OPERATION_TIMEDOUT,
                CURLE_TOO_MANY_REDIRECTS,
                CURLE_GOT_NOTHING,
                CURLE_SEND_ERROR,
                CURLE_RECV_ERROR,
                CURLE_BAD_CONTENT_ENCODING,
            ]
            .into_iter()
            .collect(),
        }
    }
}

impl RetryTable {
    pub fn is_retryable_http(&self, code: u32) -> bool {
        self.http_codes.contains(&code)
    }

    pub fn is_retryable_curl(&self, code: u32) -> bool {
        self.curl_codes.contains(&code)
    }
}

/// Classify a non-200 response status.
pub fn classify_http_status(table: &RetryTable, code: u32, url: &str) -> FetchError {
    if table.is_retryable_http(code) {
        FetchError::TransferTimedOut {
            url: url.to_string(),
            reason: format!("HTTP {code}"),
        }
    } else {
        FetchError::FileListRetrieval {
            url: url.to_string(),
            reason: format!("HTTP {code}: batch file retrieval not available"),
        }
    }
}

/// Classify a libcurl failure. Codes outside the table are not retried.
pub fn classify_curl_error(table: &RetryTable, e: &curl::Error, url: &str) -> FetchError {
    let url = url.to_string();
    let reason = e.to_string();
    if !table.is_retryable_curl(e.code() as u32) {
        return FetchError::FileListRetrieval { url, reason };
    }
    if e.is_operation_timedout() {
        FetchError::TransferTimedOut { url, reason }
    } else {
        FetchError::TransferContent { url, reason }
    }
}

/// Classify an error raised while reading or parsing the response stream.
///
/// Errors the transport already classified travel inside the `io::Error` and
/// are unwrapped unchanged. Truncation and socket errors are retryable;
/// anything else means the archive itself is malformed.
pub fn classify_io_error(err: io::Error, url: &str) -> FetchError {
    let kind = err.kind();
    let message = err.to_string();
    if let Some(Ok(inner)) = err.into_inner().map(|inner| inner.downcast::<FetchError>()) {
        return *inner;
    }
    let url = url.to_string();
    match kind {
        io::ErrorKind::TimedOut => FetchError::TransferTimedOut {
            url,
            reason: message,
        },
        io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe => FetchError::TransferContent {
            url,
            reason: format!("incomplete read: {message}"),
        },
        _ => FetchError::FileListRetrieval {
            url,
            reason: format!("malformed archive stream: {message}"),
        },
    }
}
