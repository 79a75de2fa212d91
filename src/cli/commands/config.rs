//! Config command - show or validate configuration

use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::cli::args::ConfigArgs;
use crate::config::{Config, config_search_paths, load_config_from_path_or_default};
use crate::error::Error;

/// Example configuration content
fn example_config() -> &'static str {
    r#"# wsl-gpg-bridge configuration file
#
# Every setting is optional. Command-line flags override these values.

# Windows user running gpg4win. Detected with cmd.exe when unset.
# user = "alice"

# Where WSL mounts the Windows users directory
# users_dir = "/mnt/c/Users"

# Windows gnupg directory holding the agent socket files.
# Skips the user and profile lookup entirely.
# host_gnupg_dir = "/mnt/c/Users/alice/AppData/Roaming/gnupg"

# Local gnupg home for the UNIX sockets (default: $GNUPGHOME or ~/.gnupg)
# gnupg_home = "~/.gnupg"

# Endpoints to serve (default: all)
#   agent, agent-extra, agent-browser, agent-ssh, scdaemon, dirmngr
# endpoints = ["agent", "agent-ssh"]

# Skip sockets another process is already serving instead of failing
# ignore_existing = false

# Used by `run --background`, `stop` and `status`
# pid_file = "$XDG_RUNTIME_DIR/wsl-gpg-bridge.pid"
# log_file = "~/.local/state/wsl-gpg-bridge.log"
"#
}

/// Execute the config command
pub fn execute(args: ConfigArgs, config_path: Option<PathBuf>) -> Result<()> {
    if args.paths {
        println!("Config search paths (in priority order):");
        for (i, cp) in config_search_paths().iter().enumerate() {
            let exists = if cp.path.exists() { "[exists]" } else { "" };
            println!("  {}. {} {}", i + 1, cp.description, exists);
            println!("     {}", cp.path.display());
        }
        return Ok(());
    }

    if args.example {
        print!("{}", example_config());
        return Ok(());
    }

    let config_file = load_config_from_path_or_default(config_path.as_deref())?;
    // Catches unset variables in paths
    config_file
        .config
        .expand_paths()
        .context("Configuration has invalid paths")?;

    match (&config_file.path, args.validate) {
        (Some(path), true) => {
            println!("Configuration file is valid: {}", path.display());
        }
        (None, true) => {
            return Err(Error::Config(
                "No configuration file found (use --paths for search locations)".to_string(),
            )
            .into());
        }
        (path, false) => {
            match path {
                Some(path) => println!("# Configuration from: {}", path.display()),
                None => println!("# No configuration file found, showing defaults"),
            }
            println!();
            print!("{}", render(&config_file.config)?);
        }
    }

    Ok(())
}

fn render(config: &Config) -> Result<String> {
    toml::to_string_pretty(config).context("Failed to render configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_example_config_parses() {
        let config: Config = toml::from_str(example_config()).unwrap();
        assert_eq!(config.users_dir, "/mnt/c/Users");
        assert!(config.endpoints.is_empty());
    }

    #[test]
    fn test_render_round_trips() {
        let config = Config {
            user: Some("alice".to_string()),
            endpoints: vec![crate::endpoint::EndpointKind::AgentSsh],
            ..Config::default()
        };
        let rendered = render(&config).unwrap();
        let parsed: Config = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed.user.as_deref(), Some("alice"));
        assert_eq!(parsed.endpoints, config.endpoints);
    }
}
