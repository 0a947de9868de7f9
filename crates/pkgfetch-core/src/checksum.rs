//! Content hashes (SHA-1 / SHA-256) and digest helpers.
//!
//! A hash is identified by its algorithm and raw digest bytes. The algorithm of
//! an expected hash is inferred from its hex length (40 for SHA-1, 64 for
//! SHA-256); the same algorithm is then used to digest candidate content.

use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::str::FromStr;

const BUF_SIZE: usize = 64 * 1024;

/// Digest algorithm of a content hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
}

impl HashAlgorithm {
    /// Length of the hex form of a digest produced by this algorithm.
    pub fn hex_len(self) -> usize {
        match self {
            HashAlgorithm::Sha1 => 40,
            HashAlgorithm::Sha256 => 64,
        }
    }

    pub fn hasher(self) -> ContentHasher {
        match self {
            HashAlgorithm::Sha1 => ContentHasher::Sha1(Sha1::new()),
            HashAlgorithm::Sha256 => ContentHasher::Sha256(Sha256::new()),
        }
    }

    /// Digest an in-memory buffer.
    pub fn digest(self, data: &[u8]) -> ContentHash {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize()
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashAlgorithm::Sha1 => write!(f, "sha1"),
            HashAlgorithm::Sha256 => write!(f, "sha256"),
        }
    }
}

/// Incremental hasher for either algorithm.
pub enum ContentHasher {
    Sha1(Sha1),
    Sha256(Sha256),
}

impl ContentHasher {
    pub fn update(&mut self, data: &[u8]) {
        match self {
            ContentHasher::Sha1(h) => h.update(data),
            ContentHasher::Sha256(h) => h.update(data),
        }
    }

    pub fn finalize(self) -> ContentHash {
        match self {
            ContentHasher::Sha1(h) => ContentHash::Sha1(h.finalize().into()),
            ContentHasher::Sha256(h) => ContentHash::Sha256(h.finalize().into()),
        }
    }
}

/// Error parsing a hex content hash.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseHashError {
    #[error("hash has {0} hex digits, expected 40 (sha1) or 64 (sha256)")]
    Length(usize),
    #[error("hash is not valid hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

/// A content hash: the identity of a payload in the cache and on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ContentHash {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl ContentHash {
    /// Parse a hex digest; the algorithm follows from the length.
    pub fn parse(s: &str) -> Result<Self, ParseHashError> {
        let s = s.trim();
        match s.len() {
            40 => {
                let mut buf = [0u8; 20];
                hex::decode_to_slice(s, &mut buf)?;
                Ok(ContentHash::Sha1(buf))
            }
            64 => {
                let mut buf = [0u8; 32];
                hex::decode_to_slice(s, &mut buf)?;
                Ok(ContentHash::Sha256(buf))
            }
            n => Err(ParseHashError::Length(n)),
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        match self {
            ContentHash::Sha1(_) => HashAlgorithm::Sha1,
            ContentHash::Sha256(_) => HashAlgorithm::Sha256,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ContentHash::Sha1(b) => b,
            ContentHash::Sha256(b) => b,
        }
    }

    /// Lowercase hex form, as used for cache file names and request bodies.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentHash {
    type Err = ParseHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContentHash::parse(s)
    }
}

impl TryFrom<String> for ContentHash {
    type Error = ParseHashError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        ContentHash::parse(&s)
    }
}

impl From<ContentHash> for String {
    fn from(h: ContentHash) -> String {
        h.to_hex()
    }
}

/// Digest everything `reader` yields. Reads in chunks to keep memory bounded.
pub fn digest_reader<R: Read>(algorithm: HashAlgorithm, mut reader: R) -> io::Result<ContentHash> {
    let mut hasher = algorithm.hasher();
    let mut buf = vec![0u8; BUF_SIZE];
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize())
}

/// Digest a file as stored on disk.
pub fn digest_path(algorithm: HashAlgorithm, path: &Path) -> io::Result<ContentHash> {
    let f = File::open(path)?;
    digest_reader(algorithm, io::BufReader::new(f))
}

/// Digest the gzip-decompressed content of a file.
pub fn gunzip_digest_path(algorithm: HashAlgorithm, path: &Path) -> io::Result<ContentHash> {
    let f = File::open(path)?;
    digest_reader(
        algorithm,
        flate2::read::GzDecoder::new(io::BufReader::new(f)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const EMPTY_SHA1: &str = "da39a3ee5e6b4b0d3255bfef95601890afd80709";
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn parse_picks_algorithm_by_length() {
        let h1 = ContentHash::parse(EMPTY_SHA1).unwrap();
        assert_eq!(h1.algorithm(), HashAlgorithm::Sha1);
        let h2 = ContentHash::parse(EMPTY_SHA256).unwrap();
        assert_eq!(h2.algorithm(), HashAlgorithm::Sha256);
        assert_eq!(h2.to_hex(), EMPTY_SHA256);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!(ContentHash::parse("abcd"), Err(ParseHashError::Length(4)));
        let not_hex = "z".repeat(40);
        assert!(matches!(
            ContentHash::parse(&not_hex),
            Err(ParseHashError::Hex(_))
        ));
    }

    #[test]
    fn uppercase_hex_parses_to_same_hash() {
        let lower = ContentHash::parse(EMPTY_SHA1).unwrap();
        let upper = ContentHash::parse(&EMPTY_SHA1.to_uppercase()).unwrap();
        assert_eq!(lower, upper);
        assert_eq!(upper.to_string(), EMPTY_SHA1);
    }

    #[test]
    fn digest_path_empty_file() {
        let f = tempfile::NamedTempFile::new().unwrap();
        assert_eq!(
            digest_path(HashAlgorithm::Sha256, f.path()).unwrap().to_hex(),
            EMPTY_SHA256
        );
        assert_eq!(
            digest_path(HashAlgorithm::Sha1, f.path()).unwrap().to_hex(),
            EMPTY_SHA1
        );
    }

    #[test]
    fn digest_path_known_content() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"hello\n").unwrap();
        f.flush().unwrap();
        assert_eq!(
            digest_path(HashAlgorithm::Sha256, f.path()).unwrap().to_hex(),
            "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03"
        );
    }

    #[test]
    fn gunzip_digest_hashes_decompressed_bytes() {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
        enc.write_all(b"hello\n").unwrap();
        let gz = enc.finish().unwrap();

        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(&gz).unwrap();
        f.flush().unwrap();

        let got = gunzip_digest_path(HashAlgorithm::Sha1, f.path()).unwrap();
        assert_eq!(got, HashAlgorithm::Sha1.digest(b"hello\n"));
    }

    #[test]
    fn gunzip_digest_fails_on_plain_bytes() {
        let mut f = tempfile::NamedTempFile::new().unwrap();
        f.write_all(b"definitely not a gzip stream").unwrap();
        f.flush().unwrap();
        assert!(gunzip_digest_path(HashAlgorithm::Sha1, f.path()).is_err());
    }

    #[test]
    fn serde_uses_hex_string() {
        let h = ContentHash::parse(EMPTY_SHA1).unwrap();
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{EMPTY_SHA1}\""));
        let back: ContentHash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }
}
