//! Filesystem access interface consumed by the validation engine.
//!
//! The engine only ever lists directories and stats entries, in schema
//! traversal order. Backends decide everything else: timeouts, retries,
//! credentials and how "directories" are represented.

pub mod local;
pub mod memory;
pub mod resolve;

pub use local::LocalFileSystem;
pub use memory::MemoryObjectStore;
pub use resolve::resolve_location;

use crate::error::AccessError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a real filesystem entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry returned by a directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Base name of the entry
    pub name: String,

    pub kind: EntryKind,

    /// Full backend path of the entry
    pub path: String,

    /// The backend name was not valid UTF-8 and `name` is a lossy rendering
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub lossy_name: bool,
}

impl Entry {
    pub fn new(name: impl Into<String>, kind: EntryKind, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
            lossy_name: false,
        }
    }

    /// Entry whose real name could only be rendered lossily
    pub fn lossy(name: impl Into<String>, kind: EntryKind, path: impl Into<String>) -> Self {
        Self {
            lossy_name: true,
            ..Self::new(name, kind, path)
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// Result of `stat`; a missing path is reported with `exists = false`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub kind: Option<EntryKind>,
    pub size: u64,
    pub exists: bool,
}

impl EntryMetadata {
    pub fn present(kind: EntryKind, size: u64) -> Self {
        Self {
            kind: Some(kind),
            size,
            exists: true,
        }
    }

    pub fn missing() -> Self {
        Self {
            kind: None,
            size: 0,
            exists: false,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == Some(EntryKind::Directory)
    }
}

/// Uniform read-only access to local or remote storage.
///
/// Listings must be deterministic in the *set* of entries they return;
/// ordering is not guaranteed and callers must not rely on it.
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// List the direct children of a directory.
    async fn list_entries(&self, path: &str) -> Result<Vec<Entry>, AccessError>;

    /// Kind, size and existence of a single path.
    async fn stat(&self, path: &str) -> Result<EntryMetadata, AccessError>;

    /// Short backend label used in log lines.
    fn backend_name(&self) -> &'static str;
}
