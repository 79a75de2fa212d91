//! Logging module for wsl-gpg-bridge
//!
//! Human-readable logs on stderr via tracing-subscriber. Verbosity comes from
//! the `--verbose`/`--quiet` flags and `RUST_LOG` overrides it.

use std::io::IsTerminal;
use tracing::Level;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

/// Logging configuration
#[derive(Debug, Clone, Default)]
pub struct LogConfig {
    /// Verbosity level adjustment: -1 for quiet, 0 for normal, +1 for verbose
    pub verbosity: i8,
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set verbose mode (+1 verbosity)
    pub fn verbose(mut self) -> Self {
        self.verbosity = 1;
        self
    }

    /// Set quiet mode (-1 verbosity)
    pub fn quiet(mut self) -> Self {
        self.verbosity = -1;
        self
    }

    /// Get the minimum log level based on verbosity
    fn min_level(&self) -> Level {
        match self.verbosity {
            v if v < 0 => Level::WARN, // quiet: no informational logging
            0 => Level::INFO,
            _ => Level::DEBUG,
        }
    }
}

/// Initialize the logging subsystem
///
/// # Arguments
/// * `verbose` - Enable verbose (debug) logging
/// * `quiet` - Enable quiet mode (warnings and errors only)
pub fn init(verbose: bool, quiet: bool) {
    let config = if quiet {
        LogConfig::new().quiet()
    } else if verbose {
        LogConfig::new().verbose()
    } else {
        LogConfig::new()
    };
    init_with_config(config);
}

/// Initialize logging with full configuration
///
/// Calling this more than once keeps the first subscriber.
pub fn init_with_config(config: LogConfig) {
    let env_filter = EnvFilter::builder()
        .with_default_directive(config.min_level().into())
        .from_env_lossy();

    // Background mode sends stderr to a file; keep escape codes out of it
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .with_target(false);

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.verbosity, 0);
        assert_eq!(config.min_level(), Level::INFO);
    }

    #[test]
    fn test_log_config_verbose() {
        let config = LogConfig::new().verbose();
        assert_eq!(config.verbosity, 1);
        assert_eq!(config.min_level(), Level::DEBUG);
    }

    #[test]
    fn test_log_config_quiet() {
        let config = LogConfig::new().quiet();
        assert_eq!(config.verbosity, -1);
        assert_eq!(config.min_level(), Level::WARN);
    }
}
