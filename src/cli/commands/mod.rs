//! Command implementations for the wsl-gpg-bridge CLI

pub mod config;
pub mod run;
pub mod status;
pub mod stop;
pub mod version;
