//! Batched file-list transport.
//!
//! One request asks a repository for many payloads at once: a form-encoded
//! POST to `{base}/filelist/0/` with one `File-Name-{i}={hash}` field per
//! requested hash. The response is a tar stream whose members are named by
//! content hash. The server may return any subset of what was asked for.

mod http;
mod stream;

pub use http::{CurlTransport, TransportSettings};

use std::io::Read;
use std::sync::Arc;

use crate::checksum::ContentHash;
use crate::control::CancelCheck;
use crate::error::FetchError;
use crate::mirror::Mirror;

/// Header carrying the client identifier, when the client opts in.
pub const UUID_HEADER: &str = "X-IPkg-UUID";

/// One batched request.
pub struct FileListRequest<'a> {
    pub hashes: Vec<ContentHash>,
    /// Sent as [`UUID_HEADER`] when present.
    pub uuid: Option<&'a str>,
    pub cancel: Arc<dyn CancelCheck>,
}

/// Opens the response stream for a file-list request.
///
/// A returned reader has already passed the status check (HTTP 200). Errors
/// are classified into the `FetchError` taxonomy; errors raised while the
/// caller reads the body travel inside `io::Error` and are recovered with
/// [`crate::retry::classify_io_error`]. Dropping the reader aborts the
/// transfer.
pub trait Transport {
    fn fetch_filelist(
        &self,
        mirror: &Mirror,
        request: &FileListRequest<'_>,
    ) -> Result<Box<dyn Read>, FetchError>;
}

/// Form-encoded request body: `File-Name-0=<hash>&File-Name-1=<hash>...`.
pub fn encode_filelist_body(hashes: &[ContentHash]) -> String {
    let mut form = url::form_urlencoded::Serializer::new(String::new());
    for (i, hash) in hashes.iter().enumerate() {
        form.append_pair(&format!("File-Name-{i}"), &hash.to_hex());
    }
    form.finish()
}

/// `User-Agent` sent with every request.
pub fn user_agent() -> String {
    format!("pkgfetch/{}", env!("CARGO_PKG_VERSION"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::HashAlgorithm;

    #[test]
    fn body_numbers_fields_in_order() {
        let a = HashAlgorithm::Sha1.digest(b"a");
        let b = HashAlgorithm::Sha1.digest(b"b");
        let body = encode_filelist_body(&[a, b]);
        assert_eq!(body, format!("File-Name-0={a}&File-Name-1={b}"));
    }

    #[test]
    fn body_parses_back_with_form_decoder() {
        let hashes: Vec<_> = (0u8..3).map(|i| HashAlgorithm::Sha256.digest(&[i])).collect();
        let body = encode_filelist_body(&hashes);
        let pairs: Vec<(String, String)> = url::form_urlencoded::parse(body.as_bytes())
            .into_owned()
            .collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[2].0, "File-Name-2");
        assert_eq!(pairs[2].1, hashes[2].to_hex());
    }

    #[test]
    fn user_agent_names_the_client() {
        assert!(user_agent().starts_with("pkgfetch/"));
    }
}
