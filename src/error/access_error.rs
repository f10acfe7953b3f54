use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

/// Failures reported by a filesystem backend.
///
/// A missing path is not an error for `stat`; backends return
/// `exists = false` instead and keep `NotFound` for listings.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccessError {
    #[error("Path not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not a directory: {0}")]
    NotADirectory(String),

    #[error("Backend unavailable for '{0}': {1}")]
    Unavailable(String, String),

    #[error("Unsupported filesystem scheme '{0}'")]
    UnsupportedScheme(String),

    #[error("I/O error on '{0}': {1}")]
    Io(String, String),
}

impl AccessError {
    /// Classify an I/O error raised while touching `path`.
    pub fn from_io(path: &str, error: io::Error) -> Self {
        match error.kind() {
            io::ErrorKind::NotFound => AccessError::NotFound(path.to_string()),
            io::ErrorKind::PermissionDenied => AccessError::PermissionDenied(path.to_string()),
            _ => AccessError::Io(path.to_string(), error.to_string()),
        }
    }

    /// The path the failure refers to, when there is one.
    pub fn path(&self) -> Option<&str> {
        match self {
            AccessError::NotFound(path)
            | AccessError::PermissionDenied(path)
            | AccessError::NotADirectory(path)
            | AccessError::Unavailable(path, _)
            | AccessError::Io(path, _) => Some(path),
            AccessError::UnsupportedScheme(_) => None,
        }
    }
}
