//! Package actions that carry (or describe) payload content.
//!
//! An action names a payload by its content hash. Once the payload is present
//! in the cache, the action receives an [`Opener`] that yields a readable
//! handle on the cached file.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use crate::checksum::ContentHash;

/// Kind of package action. Only some kinds carry a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    File,
    License,
    Signature,
    Dir,
    Link,
    Hardlink,
    Depend,
    Set,
}

impl ActionKind {
    /// True if actions of this kind reference payload content by hash.
    pub fn carries_payload(self) -> bool {
        matches!(
            self,
            ActionKind::File | ActionKind::License | ActionKind::Signature
        )
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActionKind::File => "file",
            ActionKind::License => "license",
            ActionKind::Signature => "signature",
            ActionKind::Dir => "dir",
            ActionKind::Link => "link",
            ActionKind::Hardlink => "hardlink",
            ActionKind::Depend => "depend",
            ActionKind::Set => "set",
        };
        f.write_str(s)
    }
}

/// Deferred handle on a cached payload. Cloning shares the same cache path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Opener {
    path: PathBuf,
}

impl Opener {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the cached payload for reading.
    pub fn open(&self) -> io::Result<File> {
        File::open(&self.path)
    }
}

/// A package action as seen by the retrieval engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    pub kind: ActionKind,
    /// Hash of the uncompressed payload (the action's identity).
    #[serde(default)]
    pub hash: Option<ContentHash>,
    /// Hash of the compressed payload as transferred, if the manifest lists one.
    #[serde(default)]
    pub chash: Option<ContentHash>,
    /// Install path, used in diagnostics only.
    #[serde(default)]
    pub path: Option<String>,
    /// Uncompressed size in bytes.
    #[serde(default)]
    pub size: Option<u64>,
    /// Compressed (on-the-wire) size in bytes.
    #[serde(default)]
    pub csize: Option<u64>,
    #[serde(skip)]
    pub opener: Option<Opener>,
}

impl Action {
    /// Payload-bearing action with the given content hash.
    pub fn file(hash: ContentHash) -> Self {
        Self {
            kind: ActionKind::File,
            hash: Some(hash),
            chash: None,
            path: None,
            size: None,
            csize: None,
            opener: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_chash(mut self, chash: ContentHash) -> Self {
        self.chash = Some(chash);
        self
    }

    pub fn with_sizes(mut self, size: u64, csize: Option<u64>) -> Self {
        self.size = Some(size);
        self.csize = csize;
        self
    }

    /// Content hash if this action carries a payload.
    pub fn payload_hash(&self) -> Option<ContentHash> {
        if self.kind.carries_payload() {
            self.hash
        } else {
            None
        }
    }

    /// Bytes this action costs on the wire: compressed size, else size, else 0.
    pub fn transfer_size(&self) -> u64 {
        self.csize.or(self.size).unwrap_or(0)
    }
}
