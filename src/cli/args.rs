//! Argument structures for CLI commands

use clap::Args;
use std::path::PathBuf;

use crate::config::ExpandedConfig;
use crate::endpoint::{EndpointKind, ResolveOptions, default_gnupg_home};
use crate::error::{Error, Result};

/// Where to find the Windows agent and where to put local sockets
#[derive(Args, Debug, Clone, Default)]
pub struct EndpointArgs {
    /// Windows username running gpg4win (default: autodetect via cmd.exe)
    #[arg(short, long, env = "WSLGPG_USER", value_name = "USERNAME")]
    pub user: Option<String>,

    /// Windows users directory [default: /mnt/c/Users]
    #[arg(long, value_name = "DIR")]
    pub users_dir: Option<PathBuf>,

    /// Windows gnupg directory holding the socket files
    ///
    /// Skips username detection and the profile lookup entirely.
    #[arg(long, value_name = "DIR")]
    pub host_gnupg_dir: Option<PathBuf>,

    /// Local gnupg home for the UNIX sockets [default: $GNUPGHOME or ~/.gnupg]
    #[arg(long, value_name = "DIR")]
    pub gnupg_home: Option<PathBuf>,

    /// Only serve these endpoints (repeatable, default: all)
    #[arg(short, long = "endpoint", value_enum, value_name = "NAME")]
    pub endpoints: Vec<EndpointKind>,
}

impl EndpointArgs {
    /// Merge with the configuration file; command-line values win
    pub fn resolve_options(&self, config: &ExpandedConfig) -> Result<ResolveOptions> {
        let gnupg_home = self
            .gnupg_home
            .clone()
            .or_else(|| config.gnupg_home.clone())
            .or_else(default_gnupg_home)
            .ok_or_else(|| {
                Error::Config(
                    "Cannot determine the local gnupg home, use --gnupg-home".to_string(),
                )
            })?;

        let kinds = if self.endpoints.is_empty() {
            config.endpoints.clone()
        } else {
            self.endpoints.clone()
        };

        Ok(ResolveOptions {
            user: self.user.clone().or_else(|| config.user.clone()),
            users_dir: self
                .users_dir
                .clone()
                .unwrap_or_else(|| config.users_dir.clone()),
            host_gnupg_dir: self
                .host_gnupg_dir
                .clone()
                .or_else(|| config.host_gnupg_dir.clone()),
            gnupg_home,
            kinds,
        })
    }
}

/// Arguments for the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub endpoints: EndpointArgs,

    /// Skip sockets already served by another process instead of failing
    #[arg(short, long)]
    pub ignore_existing: bool,

    /// Detach from the terminal once startup checks pass
    #[arg(short, long)]
    pub background: bool,

    /// PID file path [default in background: $XDG_RUNTIME_DIR/wsl-gpg-bridge.pid]
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Append logs of the background process to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

/// Arguments for the `stop` command
#[derive(Args, Debug, Clone)]
pub struct StopArgs {
    /// PID file path
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Send SIGKILL right away
    #[arg(short, long)]
    pub force: bool,

    /// Seconds to wait after SIGTERM before sending SIGKILL
    #[arg(short, long, default_value = "10")]
    pub timeout: u64,
}

/// Arguments for the `status` command
#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub endpoints: EndpointArgs,

    /// PID file path
    #[arg(long)]
    pub pid_file: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", value_parser = ["text", "json"])]
    pub format: String,
}

/// Arguments for the `config` command
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Validate configuration only
    #[arg(long)]
    pub validate: bool,

    /// Show example configuration
    #[arg(long)]
    pub example: bool,

    /// Show configuration search paths
    #[arg(long)]
    pub paths: bool,
}
