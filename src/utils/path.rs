//! Path expansion utilities

use std::path::PathBuf;

/// Expand environment variables and tilde in a path string
pub fn expand_path(path: &str) -> crate::Result<PathBuf> {
    shellexpand::full(path)
        .map(|s| PathBuf::from(s.into_owned()))
        .map_err(|e| crate::Error::Config(format!("Failed to expand path '{}': {}", path, e)))
}

/// Expand an optional path, passing `None` through
pub fn expand_optional(path: Option<&str>) -> crate::Result<Option<PathBuf>> {
    path.map(expand_path).transpose()
}
