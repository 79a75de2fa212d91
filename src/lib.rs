//! wsl-gpg-bridge - gpg4win sockets for WSL
//!
//! gpg4win's agent emulates UNIX sockets on Windows with a loopback TCP port
//! plus a nonce stored in a "socket" file. This library creates real UNIX
//! sockets in the local gnupg home and relays every connection to the Windows
//! agent, sending the nonce first, so gpg inside WSL talks to the gpg4win
//! agent unmodified.

pub mod assuan;
pub mod bridge;
pub mod cli;
pub mod config;
pub mod endpoint;
pub mod error;
pub mod logging;
pub mod service;
pub mod utils;

pub use error::{Error, Result};

/// Package version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name
pub const NAME: &str = env!("CARGO_PKG_NAME");
