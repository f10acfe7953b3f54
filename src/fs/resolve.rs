use super::{FileSystem, LocalFileSystem, MemoryObjectStore};
use crate::error::AccessError;
use crate::utils::PathUtils;
use log::{debug, info};
use std::sync::Arc;

/// Pick a backend for a dataset location.
///
/// - no scheme or `file://path` selects the local disk;
/// - `listing://dump.txt#prefix` loads an object-store listing dump into a
///   [`MemoryObjectStore`] and validates under `prefix`;
/// - any other scheme is rejected.
///
/// Returns the backend and the path to hand to the engine.
pub async fn resolve_location(
    location: &str,
) -> Result<(Arc<dyn FileSystem>, String), AccessError> {
    match PathUtils::split_scheme(location) {
        (None, path) | (Some("file"), path) => {
            debug!("Using local filesystem for {}", path);
            Ok((Arc::new(LocalFileSystem::new()), path.to_string()))
        }
        (Some("listing"), rest) => {
            let (listing_path, prefix) = rest.split_once('#').unwrap_or((rest, ""));
            let listing = tokio::fs::read_to_string(listing_path)
                .await
                .map_err(|e| AccessError::from_io(listing_path, e))?;
            let store = MemoryObjectStore::from_listing(&listing)?;
            info!(
                "Loaded {} objects from listing {} (prefix '{}')",
                store.len(),
                listing_path,
                prefix
            );
            Ok((Arc::new(store), prefix.to_string()))
        }
        (Some(scheme), _) => Err(AccessError::UnsupportedScheme(scheme.to_string())),
    }
}
