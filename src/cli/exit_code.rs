//! Exit code definitions for wsl-gpg-bridge
//!
//! Provides standardized exit codes for different error conditions.

use crate::error::Error;

/// Exit codes for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExitCode {
    /// Successful execution
    Success = 0,
    /// General/unspecified error
    GeneralError = 1,
    /// Configuration error (invalid config, missing required settings)
    ConfigError = 2,
    /// Socket error (socket in use, cannot bind, listeners died)
    SocketError = 3,
    /// Windows side unusable (user, profile or agent sockets missing)
    HostError = 4,
}

impl ExitCode {
    /// Pick the exit code for the first library error in the chain
    pub fn for_error(err: &anyhow::Error) -> Self {
        match err.chain().find_map(|e| e.downcast_ref::<Error>()) {
            Some(Error::Config(_)) => ExitCode::ConfigError,
            Some(
                Error::SocketInUse(_) | Error::ListenerBindFailed { .. } | Error::Socket(_),
            ) => ExitCode::SocketError,
            Some(
                Error::UserNotDetected(_)
                | Error::ProfileNotFound(_)
                | Error::NoEndpoints
                | Error::DescriptorNotFound(_)
                | Error::MalformedDescriptor { .. },
            ) => ExitCode::HostError,
            _ => ExitCode::GeneralError,
        }
    }
}

impl From<ExitCode> for u8 {
    fn from(code: ExitCode) -> Self {
        code as u8
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        std::process::ExitCode::from(code as u8)
    }
}
