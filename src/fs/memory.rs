use super::{Entry, EntryKind, EntryMetadata, FileSystem};
use crate::error::AccessError;
use crate::utils::PathUtils;
use async_trait::async_trait;
use log::debug;
use std::collections::{BTreeMap, HashMap};

/// In-memory object store with blob-storage semantics.
///
/// Objects are flat keys (`dataset/2024-01-01/a.csv`). Directories are
/// implicit: any key prefix ending in `/` is a directory. A key that itself
/// ends in `/` is a directory marker and makes an empty directory visible.
#[derive(Debug, Clone, Default)]
pub struct MemoryObjectStore {
    objects: BTreeMap<String, u64>,
    failures: HashMap<String, AccessError>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from object keys, each with size 0.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut store = Self::new();
        for key in keys {
            store.insert(key.as_ref(), 0);
        }
        store
    }

    /// Build a store from a listing dump: one `key [size]` per line.
    ///
    /// Blank lines and lines starting with `#` are skipped.
    pub fn from_listing(listing: &str) -> Result<Self, AccessError> {
        let mut store = Self::new();
        for (index, line) in listing.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let key = parts.next().unwrap_or_default();
            let size = match parts.next() {
                Some(raw) => raw.parse::<u64>().map_err(|_| {
                    AccessError::Io(
                        "<listing>".to_string(),
                        format!("line {}: invalid object size '{}'", index + 1, raw),
                    )
                })?,
                None => 0,
            };
            store.insert(key, size);
        }
        debug!("Loaded {} objects from listing", store.objects.len());
        Ok(store)
    }

    /// Insert an object, or a directory marker when `key` ends with `/`.
    pub fn insert(&mut self, key: &str, size: u64) -> &mut Self {
        let normalized = PathUtils::normalize(key.trim_start_matches('/'));
        if normalized.is_empty() {
            return self;
        }
        let key = if key.ends_with('/') {
            format!("{}/", normalized)
        } else {
            normalized
        };
        self.objects.insert(key, size);
        self
    }

    /// Make every listing or stat of `path` fail with `error`.
    pub fn inject_failure(&mut self, path: &str, error: AccessError) -> &mut Self {
        self.failures.insert(Self::key_of(path), error);
        self
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    fn key_of(path: &str) -> String {
        PathUtils::normalize(path.trim_start_matches('/'))
    }

    fn check_failure(&self, key: &str) -> Result<(), AccessError> {
        match self.failures.get(key) {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn dir_prefix(key: &str) -> String {
        if key.is_empty() {
            String::new()
        } else {
            format!("{}/", key)
        }
    }

    fn has_children(&self, key: &str) -> bool {
        let prefix = Self::dir_prefix(key);
        self.objects
            .range(prefix.clone()..)
            .next()
            .map_or(false, |(candidate, _)| candidate.starts_with(&prefix))
    }
}

#[async_trait]
impl FileSystem for MemoryObjectStore {
    async fn list_entries(&self, path: &str) -> Result<Vec<Entry>, AccessError> {
        let key = Self::key_of(path);
        self.check_failure(&key)?;

        if self.objects.contains_key(&key) {
            return Err(AccessError::NotADirectory(path.to_string()));
        }

        let prefix = Self::dir_prefix(&key);
        let mut children: BTreeMap<String, EntryKind> = BTreeMap::new();
        let mut seen_prefix = key.is_empty();
        // Keys sharing the prefix form one contiguous range of the map
        let under_prefix = self
            .objects
            .range(prefix.clone()..)
            .map(|(object, _)| object)
            .take_while(|object| object.starts_with(&prefix));
        for object in under_prefix {
            let rest = &object[prefix.len()..];
            seen_prefix = true;
            if rest.is_empty() {
                // Marker of the listed directory itself
                continue;
            }
            match rest.split_once('/') {
                Some((dir, _)) => {
                    children.insert(dir.to_string(), EntryKind::Directory);
                }
                None => {
                    children.entry(rest.to_string()).or_insert(EntryKind::File);
                }
            }
        }

        if !seen_prefix {
            return Err(AccessError::NotFound(path.to_string()));
        }

        Ok(children
            .into_iter()
            .map(|(name, kind)| {
                let entry_path = PathUtils::join(path, &name);
                Entry::new(name, kind, entry_path)
            })
            .collect())
    }

    async fn stat(&self, path: &str) -> Result<EntryMetadata, AccessError> {
        let key = Self::key_of(path);
        self.check_failure(&key)?;

        if key.is_empty() {
            return Ok(EntryMetadata::present(EntryKind::Directory, 0));
        }
        if let Some(size) = self.objects.get(&key) {
            return Ok(EntryMetadata::present(EntryKind::File, *size));
        }
        if self.has_children(&key) {
            return Ok(EntryMetadata::present(EntryKind::Directory, 0));
        }
        Ok(EntryMetadata::missing())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
