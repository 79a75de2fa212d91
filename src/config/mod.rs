//! Configuration module for wsl-gpg-bridge
//!
//! This module handles loading and parsing of the optional configuration
//! file, including environment variable and tilde expansion of paths.

mod file;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::endpoint::{DEFAULT_USERS_DIR, EndpointKind};
use crate::utils::path::{expand_optional, expand_path};

pub use file::{
    ConfigFile, config_search_paths, find_config_file, load_config,
    load_config_from_path_or_default,
};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Windows user running gpg4win; detected when unset
    #[serde(default)]
    pub user: Option<String>,

    /// Windows users directory as mounted in WSL
    #[serde(default = "default_users_dir")]
    pub users_dir: String,

    /// Windows gnupg directory, bypassing user and profile lookup
    #[serde(default)]
    pub host_gnupg_dir: Option<String>,

    /// Local gnupg home (default: $GNUPGHOME or ~/.gnupg)
    #[serde(default)]
    pub gnupg_home: Option<String>,

    /// Endpoints to serve; empty means all
    #[serde(default)]
    pub endpoints: Vec<EndpointKind>,

    /// Skip sockets already served by another process
    #[serde(default)]
    pub ignore_existing: bool,

    /// PID file used in background mode
    #[serde(default)]
    pub pid_file: Option<String>,

    /// Log file used in background mode
    #[serde(default)]
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            user: None,
            users_dir: default_users_dir(),
            host_gnupg_dir: None,
            gnupg_home: None,
            endpoints: Vec::new(),
            ignore_existing: false,
            pid_file: None,
            log_file: None,
        }
    }
}

fn default_users_dir() -> String {
    DEFAULT_USERS_DIR.to_string()
}

impl Config {
    /// Expand environment variables and tilde in all paths
    pub fn expand_paths(&self) -> crate::Result<ExpandedConfig> {
        Ok(ExpandedConfig {
            user: self.user.clone(),
            users_dir: expand_path(&self.users_dir)?,
            host_gnupg_dir: expand_optional(self.host_gnupg_dir.as_deref())?,
            gnupg_home: expand_optional(self.gnupg_home.as_deref())?,
            endpoints: self.endpoints.clone(),
            ignore_existing: self.ignore_existing,
            pid_file: expand_optional(self.pid_file.as_deref())?,
            log_file: expand_optional(self.log_file.as_deref())?,
        })
    }
}

/// Configuration with all paths expanded
#[derive(Debug, Clone)]
pub struct ExpandedConfig {
    pub user: Option<String>,
    pub users_dir: PathBuf,
    pub host_gnupg_dir: Option<PathBuf>,
    pub gnupg_home: Option<PathBuf>,
    pub endpoints: Vec<EndpointKind>,
    pub ignore_existing: bool,
    pub pid_file: Option<PathBuf>,
    pub log_file: Option<PathBuf>,
}
