//! Run command - bridge the Windows agent sockets

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tokio::signal;
use tokio::signal::unix::SignalKind;
use tracing::{info, warn};

use crate::bridge::Supervisor;
use crate::cli::args::RunArgs;
use crate::config::load_config_from_path_or_default;
use crate::endpoint::EndpointSet;
use crate::service::Daemon;

/// Global flags forwarded to a background child
#[derive(Debug, Clone, Copy, Default)]
pub struct Verbosity {
    pub verbose: bool,
    pub quiet: bool,
}

/// Execute the run command
pub async fn execute(
    args: RunArgs,
    config_path: Option<PathBuf>,
    verbosity: Verbosity,
) -> Result<()> {
    let config_file = load_config_from_path_or_default(config_path.as_deref())
        .context("Failed to load configuration")?;
    if let Some(path) = &config_file.path {
        info!(path = %path.display(), "Using configuration file");
    }
    let config = config_file.config.expand_paths()?;

    let opts = args.endpoints.resolve_options(&config)?;
    let endpoints = EndpointSet::discover(&opts).await?;
    info!(
        user = endpoints.host_user().unwrap_or("-"),
        host_dir = %endpoints.host_gnupg_dir().display(),
        local_dir = %endpoints.local_gnupg_dir().display(),
        "Resolved endpoints"
    );

    let ignore_existing = args.ignore_existing || config.ignore_existing;
    let pid_file = args.pid_file.or(config.pid_file);
    let supervisor = Supervisor::new(endpoints.clone()).ignore_existing(ignore_existing);

    if args.background {
        // Fail here, while the operator can still see it
        supervisor.plan().await?;

        let daemon = Daemon::with_pid_file(pid_file.unwrap_or_else(Daemon::default_pid_file));
        let child_args = background_args(
            &endpoints,
            ignore_existing,
            daemon.pid_file(),
            config_path.as_deref(),
            verbosity,
        );
        let log_file = args.log_file.or(config.log_file);
        let pid = daemon.spawn(&child_args, log_file.as_deref())?;

        info!(pid, pid_file = %daemon.pid_file().display(), "Running in background");
        return Ok(());
    }

    let _pid_guard = match pid_file {
        Some(path) => {
            let daemon = Daemon::with_pid_file(path);
            daemon.record_current()?;
            Some(scopeguard::guard(daemon, |d| d.release()))
        }
        None => None,
    };

    let running = supervisor.start().await?;
    info!("Bridge started. Press Ctrl+C to stop.");
    running.run_until(shutdown_signal()).await?;

    Ok(())
}

/// Arguments that make a child run exactly the endpoints resolved here
///
/// The resolved Windows gnupg directory is passed so the child never has to
/// detect the user again.
fn background_args(
    endpoints: &EndpointSet,
    ignore_existing: bool,
    pid_file: &Path,
    config_path: Option<&Path>,
    verbosity: Verbosity,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "run".into(),
        "--host-gnupg-dir".into(),
        endpoints.host_gnupg_dir().into(),
        "--gnupg-home".into(),
        endpoints.local_gnupg_dir().into(),
        "--pid-file".into(),
        pid_file.into(),
    ];

    for endpoint in endpoints.endpoints() {
        args.push("--endpoint".into());
        args.push(endpoint.kind.name().into());
    }
    if ignore_existing {
        args.push("--ignore-existing".into());
    }
    if let Some(path) = config_path {
        args.push("--config".into());
        args.push(path.into());
    }
    if verbosity.verbose {
        args.push("--verbose".into());
    }
    if verbosity.quiet {
        args.push("--quiet".into());
    }
    args
}

/// Resolve on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let interrupt = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match signal::unix::signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = interrupt => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::{Cli, Commands};
    use crate::endpoint::{EndpointKind, ResolveOptions};
    use clap::Parser;

    #[test]
    fn test_background_args_round_trip() {
        let opts = ResolveOptions {
            user: None,
            users_dir: PathBuf::from("/mnt/c/Users"),
            host_gnupg_dir: Some(PathBuf::from("/mnt/c/Users/alice/AppData/Roaming/gnupg")),
            gnupg_home: PathBuf::from("/home/alice/.gnupg"),
            kinds: vec![EndpointKind::Agent, EndpointKind::AgentSsh],
        };
        let endpoints = EndpointSet::resolve(&opts, || unreachable!()).unwrap();

        let mut argv: Vec<OsString> = vec!["wsl-gpg-bridge".into()];
        argv.extend(background_args(
            &endpoints,
            true,
            Path::new("/run/user/1000/wsl-gpg-bridge.pid"),
            None,
            Verbosity {
                verbose: false,
                quiet: true,
            },
        ));

        let cli = Cli::try_parse_from(argv).unwrap();
        assert!(cli.quiet);
        let Commands::Run(args) = cli.command else {
            panic!("expected run");
        };
        assert!(!args.background);
        assert!(args.ignore_existing);
        assert_eq!(
            args.endpoints.host_gnupg_dir,
            opts.host_gnupg_dir
        );
        assert_eq!(args.endpoints.gnupg_home, Some(opts.gnupg_home.clone()));
        assert_eq!(args.endpoints.endpoints, opts.kinds);
        assert_eq!(
            args.pid_file,
            Some(PathBuf::from("/run/user/1000/wsl-gpg-bridge.pid"))
        );
    }
}
