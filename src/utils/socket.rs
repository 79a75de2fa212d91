//! Local UNIX socket file management
//!
//! Stale socket removal, gnupg home creation, permission setting, and a
//! liveness probe used before replacing a socket file.

use std::fs;
use std::io;
use std::os::unix::fs::{DirBuilderExt, PermissionsExt};
use std::path::Path;
use tokio::net::UnixStream;

/// Error type for socket file operations
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("Refusing to replace symlink at {path}")]
    SymlinkDetected { path: String },

    #[error("Failed to check existing socket at {path}: {source}")]
    MetadataError { path: String, source: io::Error },

    #[error("Failed to remove existing socket at {path}: {source}")]
    RemoveError { path: String, source: io::Error },

    #[error("Failed to create directory {path}: {source}")]
    CreateDirError { path: String, source: io::Error },

    #[error("Failed to set permissions on {path}: {source}")]
    PermissionError { path: String, source: io::Error },
}

/// What a connect attempt found at a socket path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketProbe {
    /// Nothing at the path
    Absent,
    /// A file exists but nobody accepts on it
    Stale,
    /// Another process is accepting connections
    Live,
}

/// Remove an existing socket file if present.
///
/// Uses `symlink_metadata` so a symlink is never followed or removed.
///
/// # Errors
/// - `SymlinkDetected` if the path is a symbolic link
/// - `MetadataError` if metadata cannot be read (except NotFound)
/// - `RemoveError` if the file cannot be removed
pub fn remove_existing_socket(path: &Path) -> Result<(), SocketError> {
    match fs::symlink_metadata(path) {
        Ok(metadata) => {
            if metadata.file_type().is_symlink() {
                return Err(SocketError::SymlinkDetected {
                    path: path.display().to_string(),
                });
            }
            fs::remove_file(path).map_err(|e| SocketError::RemoveError {
                path: path.display().to_string(),
                source: e,
            })?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(SocketError::MetadataError {
                path: path.display().to_string(),
                source: e,
            });
        }
    }
    Ok(())
}

/// Ensure the directory holding a socket exists.
///
/// A missing directory is created owner-only (0700), as gpg expects of its
/// home. Existing directories are left alone.
pub fn ensure_socket_dir(path: &Path) -> Result<(), SocketError> {
    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::DirBuilder::new()
            .recursive(true)
            .mode(0o700)
            .create(parent)
            .map_err(|e| SocketError::CreateDirError {
                path: parent.display().to_string(),
                source: e,
            })?;
    }
    Ok(())
}

/// Set socket permissions to owner read/write only (0600).
pub fn set_socket_permissions(path: &Path) -> Result<(), SocketError> {
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
        SocketError::PermissionError {
            path: path.display().to_string(),
            source: e,
        }
    })
}

/// Prepare a path for socket binding.
///
/// Removes any leftover file from a previous run and creates the directory.
/// Call [`set_socket_permissions`] after binding.
pub fn prepare_socket_path(path: &Path) -> Result<(), SocketError> {
    remove_existing_socket(path)?;
    ensure_socket_dir(path)?;
    Ok(())
}

/// Check whether something is still serving a socket path.
///
/// There is no way to tell a live UNIX socket from a dead one other than
/// connecting to it. On a socket served by the bridge that connection is a
/// real client: it opens a relay session to the host agent.
pub async fn probe_socket(path: &Path) -> SocketProbe {
    match fs::symlink_metadata(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => return SocketProbe::Absent,
        _ => {}
    }
    match UnixStream::connect(path).await {
        Ok(_) => SocketProbe::Live,
        Err(_) => SocketProbe::Stale,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::tempdir;

    #[test]
    fn test_remove_existing_socket_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("S.gpg-agent");
        assert!(remove_existing_socket(&path).is_ok());
    }

    #[test]
    fn test_remove_existing_socket_regular_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("S.gpg-agent");
        fs::write(&path, b"stale").unwrap();
        assert!(remove_existing_socket(&path).is_ok());
        assert!(!path.exists());
    }

    #[test]
    fn test_remove_existing_socket_symlink_rejected() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("target");
        let link = dir.path().join("S.gpg-agent");
        fs::write(&target, b"target").unwrap();
        symlink(&target, &link).unwrap();

        let result = remove_existing_socket(&link);
        assert!(matches!(result, Err(SocketError::SymlinkDetected { .. })));
        assert!(link.symlink_metadata().is_ok());
    }

    #[test]
    fn test_ensure_socket_dir_creates_private_dir() {
        let dir = tempdir().unwrap();
        let path = dir.path().join(".gnupg").join("S.gpg-agent");
        assert!(ensure_socket_dir(&path).is_ok());

        let mode = fs::metadata(dir.path().join(".gnupg"))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o700);
    }

    #[test]
    fn test_ensure_socket_dir_leaves_existing_alone() {
        let dir = tempdir().unwrap();
        let gnupg = dir.path().join(".gnupg");
        fs::create_dir(&gnupg).unwrap();
        fs::set_permissions(&gnupg, fs::Permissions::from_mode(0o755)).unwrap();

        assert!(ensure_socket_dir(&gnupg.join("S.dirmngr")).is_ok());
        let mode = fs::metadata(&gnupg).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[test]
    fn test_set_socket_permissions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("S.gpg-agent");
        fs::write(&path, b"test").unwrap();
        assert!(set_socket_permissions(&path).is_ok());
        let perms = fs::metadata(&path).unwrap().permissions();
        assert_eq!(perms.mode() & 0o777, 0o600);
    }

    #[test]
    fn test_prepare_socket_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("gnupg").join("S.gpg-agent");
        fs::create_dir(dir.path().join("gnupg")).unwrap();
        fs::write(&path, b"old").unwrap();

        assert!(prepare_socket_path(&path).is_ok());
        assert!(!path.exists());
        assert!(dir.path().join("gnupg").exists());
    }

    #[tokio::test]
    async fn test_probe_socket_states() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("S.gpg-agent");
        assert_eq!(probe_socket(&path).await, SocketProbe::Absent);

        fs::write(&path, b"leftover").unwrap();
        assert_eq!(probe_socket(&path).await, SocketProbe::Stale);
        fs::remove_file(&path).unwrap();

        let listener = tokio::net::UnixListener::bind(&path).unwrap();
        assert_eq!(probe_socket(&path).await, SocketProbe::Live);

        // A bound-then-dropped listener leaves a dead socket file behind
        drop(listener);
        assert_eq!(probe_socket(&path).await, SocketProbe::Stale);
    }
}
