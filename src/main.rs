//! wsl-gpg-bridge - gpg4win agent sockets for WSL

use anyhow::Result;
use clap::Parser;

use wsl_gpg_bridge::cli::commands::{self, run::Verbosity};
use wsl_gpg_bridge::cli::exit_code::ExitCode;
use wsl_gpg_bridge::cli::{Cli, Commands};
use wsl_gpg_bridge::logging;

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.quiet);

    match dispatch(cli).await {
        Ok(()) => ExitCode::Success.into(),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::for_error(&e).into()
        }
    }
}

async fn dispatch(cli: Cli) -> Result<()> {
    let verbosity = Verbosity {
        verbose: cli.verbose,
        quiet: cli.quiet,
    };

    match cli.command {
        Commands::Run(args) => commands::run::execute(args, cli.config, verbosity).await?,
        Commands::Stop(args) => commands::stop::execute(args, cli.config).await?,
        Commands::Status(args) => commands::status::execute(args, cli.config).await?,
        Commands::Config(args) => commands::config::execute(args, cli.config)?,
        Commands::Version => commands::version::print_version(cli.verbose),
    }

    Ok(())
}
