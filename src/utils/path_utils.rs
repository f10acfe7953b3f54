/// Backend-neutral helpers for `/`-separated entry paths.
///
/// Local and object-store backends both speak in forward-slash paths, so
/// none of these go through `std::path`.
pub struct PathUtils;

impl PathUtils {
    /// Join a directory path and an entry name.
    pub fn join(base: &str, name: &str) -> String {
        let name = name.trim_start_matches('/');
        if base.is_empty() {
            return name.to_string();
        }
        if base == "/" {
            return format!("/{}", name);
        }
        format!("{}/{}", base.trim_end_matches('/'), name)
    }

    /// Last component of a path, ignoring trailing separators.
    pub fn base_name(path: &str) -> &str {
        let trimmed = path.trim_end_matches('/');
        if trimmed.is_empty() {
            return path;
        }
        trimmed.rsplit('/').next().unwrap_or(trimmed)
    }

    /// Parent of a path, or `None` for a single component.
    pub fn parent(path: &str) -> Option<&str> {
        let trimmed = path.trim_end_matches('/');
        match trimmed.rfind('/') {
            Some(0) => Some("/"),
            Some(index) => Some(&trimmed[..index]),
            None => None,
        }
    }

    /// Split `scheme://rest` into its scheme and remainder.
    pub fn split_scheme(location: &str) -> (Option<&str>, &str) {
        match location.split_once("://") {
            Some((scheme, rest)) if !scheme.is_empty() => (Some(scheme), rest),
            _ => (None, location),
        }
    }

    /// Strip leading `./`, duplicate and trailing separators.
    pub fn normalize(path: &str) -> String {
        let absolute = path.starts_with('/');
        let parts: Vec<&str> = path
            .split('/')
            .filter(|part| !part.is_empty() && *part != ".")
            .collect();
        let joined = parts.join("/");
        if absolute {
            format!("/{}", joined)
        } else {
            joined
        }
    }
}
