//! Stop command - stop a bridge running in the background

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

use crate::cli::args::StopArgs;
use crate::config::load_config_from_path_or_default;
use crate::service::{Daemon, StopOutcome};

/// Execute the stop command
pub async fn execute(args: StopArgs, config_path: Option<PathBuf>) -> Result<()> {
    let pid_file = match args.pid_file {
        Some(path) => path,
        None => load_config_from_path_or_default(config_path.as_deref())
            .context("Failed to load configuration")?
            .config
            .expand_paths()?
            .pid_file
            .unwrap_or_else(Daemon::default_pid_file),
    };

    let daemon = Daemon::with_pid_file(pid_file);
    info!(pid_file = %daemon.pid_file().display(), "Stopping bridge");

    match daemon
        .stop(Duration::from_secs(args.timeout), args.force)
        .await?
    {
        StopOutcome::Terminated(pid) => println!("Bridge stopped (PID {})", pid),
        StopOutcome::Killed(pid) => println!("Bridge killed (PID {})", pid),
        StopOutcome::WasNotRunning => {
            println!("Bridge was not running. PID file cleaned up.")
        }
    }

    Ok(())
}
