//! CLI module for wsl-gpg-bridge
//!
//! This module provides the command-line interface using clap derive macros.

pub mod args;
pub mod commands;
pub mod exit_code;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use args::{ConfigArgs, RunArgs, StatusArgs, StopArgs};

/// Proxy gpg4win agent sockets into WSL
#[derive(Parser, Debug)]
#[command(name = "wsl-gpg-bridge")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file path
    #[arg(long, global = true, env = "WSL_GPG_BRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress informational output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the sockets and proxy connections to the Windows agent
    Run(RunArgs),

    /// Stop a bridge started with `run --background`
    Stop(StopArgs),

    /// Show the background process and every endpoint
    Status(StatusArgs),

    /// Show or validate configuration
    Config(ConfigArgs),

    /// Show version information
    Version,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointKind;

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_run() {
        let cli = Cli::try_parse_from([
            "wsl-gpg-bridge",
            "-q",
            "run",
            "--user",
            "alice",
            "-e",
            "agent",
            "-e",
            "agent-ssh",
            "--background",
        ])
        .unwrap();

        assert!(cli.quiet);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert_eq!(args.endpoints.user.as_deref(), Some("alice"));
        assert_eq!(
            args.endpoints.endpoints,
            vec![EndpointKind::Agent, EndpointKind::AgentSsh]
        );
        assert!(args.background);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["wsl-gpg-bridge", "-v", "-q", "version"]).is_err());
    }

    #[test]
    fn test_unknown_endpoint_rejected() {
        assert!(Cli::try_parse_from(["wsl-gpg-bridge", "run", "-e", "keyboxd"]).is_err());
    }
}
