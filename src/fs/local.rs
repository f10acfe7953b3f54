use super::{Entry, EntryKind, EntryMetadata, FileSystem};
use crate::error::AccessError;
use crate::utils::PathUtils;
use async_trait::async_trait;
use log::{debug, warn};
use std::io;
use tokio::fs;

/// Local disk backend.
///
/// Symbolic links are followed. Anything that is not a directory after
/// following links (regular files, sockets, devices) is reported as a file.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn list_entries(&self, path: &str) -> Result<Vec<Entry>, AccessError> {
        debug!("Listing local directory: {}", path);
        let mut reader = fs::read_dir(path)
            .await
            .map_err(|e| AccessError::from_io(path, e))?;

        let mut entries = Vec::new();
        while let Some(dir_entry) = reader
            .next_entry()
            .await
            .map_err(|e| AccessError::from_io(path, e))?
        {
            let (name, lossy_name) = match dir_entry.file_name().into_string() {
                Ok(name) => (name, false),
                Err(raw) => {
                    let name = raw.to_string_lossy().into_owned();
                    warn!("Entry name in {} is not valid UTF-8: {:?}", path, raw);
                    (name, true)
                }
            };
            let entry_path = PathUtils::join(path, &name);
            let kind = match fs::metadata(dir_entry.path()).await {
                Ok(metadata) if metadata.is_dir() => EntryKind::Directory,
                Ok(_) => EntryKind::File,
                Err(e) => {
                    // Dangling symlinks still show up as entries.
                    warn!("Cannot resolve '{}', treating it as a file: {}", entry_path, e);
                    EntryKind::File
                }
            };
            entries.push(if lossy_name {
                Entry::lossy(name, kind, entry_path)
            } else {
                Entry::new(name, kind, entry_path)
            });
        }

        debug!("Found {} entries in {}", entries.len(), path);
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> Result<EntryMetadata, AccessError> {
        match fs::metadata(path).await {
            Ok(metadata) => {
                let kind = if metadata.is_dir() {
                    EntryKind::Directory
                } else {
                    EntryKind::File
                };
                Ok(EntryMetadata::present(kind, metadata.len()))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EntryMetadata::missing()),
            Err(e) => Err(AccessError::from_io(path, e)),
        }
    }

    fn backend_name(&self) -> &'static str {
        "local"
    }
}
