//! Configuration file discovery and loading
//!
//! This module provides functionality to find and load configuration files
//! from standard locations.

use std::path::{Path, PathBuf};

use super::Config;

/// Configuration file wrapper with path information
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Path where the configuration was loaded from, if any
    pub path: Option<PathBuf>,

    /// The parsed configuration
    pub config: Config,
}

/// Configuration file search path with description
#[derive(Debug, Clone)]
pub struct ConfigPath {
    /// The actual file path
    pub path: PathBuf,
    /// Human-readable description for display
    pub description: &'static str,
}

/// Standard configuration file name
const CONFIG_FILE_NAME: &str = "config.toml";

/// Application name for directory paths
const APP_NAME: &str = "wsl-gpg-bridge";

/// Get all configuration search paths with descriptions (in priority order)
///
/// Search order:
/// 1. `$XDG_CONFIG_HOME/wsl-gpg-bridge/config.toml` (if env var set)
/// 2. `~/.config/wsl-gpg-bridge/config.toml`
/// 3. `~/.wsl-gpg-bridge.toml`
pub fn config_search_paths() -> Vec<ConfigPath> {
    let mut paths = Vec::new();

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME")
        && !xdg.is_empty()
    {
        paths.push(ConfigPath {
            path: PathBuf::from(xdg).join(APP_NAME).join(CONFIG_FILE_NAME),
            description: "$XDG_CONFIG_HOME/wsl-gpg-bridge/config.toml",
        });
    }

    if let Some(home) = dirs::home_dir() {
        let dotconfig = home.join(".config").join(APP_NAME).join(CONFIG_FILE_NAME);
        if !paths.iter().any(|p| p.path == dotconfig) {
            paths.push(ConfigPath {
                path: dotconfig,
                description: "~/.config/wsl-gpg-bridge/config.toml",
            });
        }
        paths.push(ConfigPath {
            path: home.join(format!(".{}.toml", APP_NAME)),
            description: "~/.wsl-gpg-bridge.toml",
        });
    }

    paths
}

/// Find the configuration file in standard locations
///
/// Returns `None` if no configuration file is found.
pub fn find_config_file() -> Option<PathBuf> {
    for cp in config_search_paths() {
        if cp.path.is_file() {
            tracing::debug!(path = %cp.path.display(), "Found configuration file");
            return Some(cp.path);
        }
    }

    tracing::debug!("No configuration file found in standard locations");
    None
}

/// Load configuration from the specified path
pub fn load_config(path: &Path) -> crate::Result<ConfigFile> {
    tracing::debug!("Loading configuration from: {}", path.display());

    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to read configuration file '{}': {}",
            path.display(),
            e
        ))
    })?;

    let config: Config = toml::from_str(&content).map_err(|e| {
        crate::Error::Config(format!(
            "Failed to parse configuration file '{}': {}",
            path.display(),
            e
        ))
    })?;

    Ok(ConfigFile {
        path: Some(path.to_path_buf()),
        config,
    })
}

/// Load configuration from a specific path or fall back to default locations
///
/// An explicit path must exist. Without one, a missing file just means
/// defaults.
pub fn load_config_from_path_or_default(path: Option<&Path>) -> crate::Result<ConfigFile> {
    match path {
        Some(p) => load_config(p),
        None => match find_config_file() {
            Some(found) => load_config(&found),
            None => Ok(ConfigFile {
                path: None,
                config: Config::default(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_search_paths() {
        let paths = config_search_paths();
        assert!(!paths.is_empty());

        for cp in &paths {
            assert!(
                cp.path.is_absolute(),
                "Path should be absolute: {:?}",
                cp.path
            );
            assert!(!cp.description.is_empty());
        }

        assert!(
            paths
                .iter()
                .any(|p| p.path.ends_with(".wsl-gpg-bridge.toml"))
        );
    }

    #[test]
    fn test_load_config_valid() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
user = "alice"
endpoints = ["agent", "scdaemon"]
"#,
        )
        .unwrap();

        let config_file = load_config(&config_path).unwrap();
        assert_eq!(config_file.path.as_deref(), Some(config_path.as_path()));
        assert_eq!(config_file.config.user.as_deref(), Some("alice"));
        assert_eq!(config_file.config.endpoints.len(), 2);
        assert_eq!(config_file.config.users_dir, "/mnt/c/Users");
    }

    #[test]
    fn test_load_config_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "invalid toml { [ }").unwrap();

        let result = load_config(&config_path);
        assert!(matches!(result, Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_load_config_unknown_field() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.toml");
        std::fs::write(&config_path, "user = \"a\"\nupstream = \"/tmp/x\"\n").unwrap();

        assert!(load_config(&config_path).is_err(), "Should reject unknown fields");
    }

    #[test]
    fn test_explicit_path_must_exist() {
        let result = load_config_from_path_or_default(Some(Path::new("/nonexistent/c.toml")));
        assert!(result.is_err());
    }
}
