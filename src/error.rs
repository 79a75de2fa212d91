//! Error types for wsl-gpg-bridge

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for wsl-gpg-bridge
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unable to determine the Windows username: {0}")]
    UserNotDetected(String),

    #[error("Windows profile directory does not exist: {}", .0.display())]
    ProfileNotFound(PathBuf),

    #[error("Socket descriptor not found: {}", .0.display())]
    DescriptorNotFound(PathBuf),

    #[error("Malformed socket descriptor {}: {reason}", .path.display())]
    MalformedDescriptor { path: PathBuf, reason: String },

    #[error("Failed to connect to host agent on 127.0.0.1:{port}: {source}")]
    ConnectFailed {
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to bind listener at {}: {reason}", .path.display())]
    ListenerBindFailed { path: PathBuf, reason: String },

    #[error("Relay I/O error: {0}")]
    RelayIo(#[source] std::io::Error),

    #[error("Socket {} is already served by another process", .0.display())]
    SocketInUse(PathBuf),

    #[error("No gpg sockets found, make sure the gpg4win agent is running")]
    NoEndpoints,

    #[error("Socket error: {0}")]
    Socket(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Daemon error: {0}")]
    Daemon(String),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_failed_keeps_source() {
        use std::error::Error as _;
        let err = Error::ConnectFailed {
            port: 51234,
            source: std::io::ErrorKind::ConnectionRefused.into(),
        };
        assert!(err.to_string().contains("127.0.0.1:51234"));
        assert!(err.source().is_some());
    }

    #[test]
    fn test_display_mentions_path() {
        let err = Error::MalformedDescriptor {
            path: PathBuf::from("/mnt/c/S.gpg-agent"),
            reason: "bad port".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("/mnt/c/S.gpg-agent"));
        assert!(msg.contains("bad port"));
    }
}
