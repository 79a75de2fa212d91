//! Windows user lookup
//!
//! Interop lets WSL run `cmd.exe` directly; its environment carries the
//! Windows account name of whoever launched the distribution.

use crate::error::{Error, Result};
use std::process::Stdio;
use tokio::process::Command;
use tracing::debug;

/// Detect the Windows account name via `cmd.exe /c echo %USERNAME%`
pub async fn detect_windows_user() -> Result<String> {
    let output = Command::new("cmd.exe")
        .args(["/c", "echo %USERNAME%"])
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| Error::UserNotDetected(format!("failed to run cmd.exe: {}", e)))?;

    if !output.status.success() {
        return Err(Error::UserNotDetected(format!(
            "cmd.exe returned {}: {}",
            output.status,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    let user = parse_echo_output(&output.stdout)?;
    debug!(user = %user, "Detected Windows user");
    Ok(user)
}

/// Pick the account name out of `echo %USERNAME%` output
///
/// An unexpanded `%USERNAME%` means the variable was unset.
fn parse_echo_output(stdout: &[u8]) -> Result<String> {
    let user = String::from_utf8_lossy(stdout).trim().to_string();
    if user.is_empty() || user == "%USERNAME%" {
        return Err(Error::UserNotDetected(
            "cmd.exe did not report a username".to_string(),
        ));
    }
    Ok(user)
}

/// Whether an override is usable as-is
pub(crate) fn has_override(user_override: Option<&str>) -> bool {
    user_override.is_some_and(|user| !user.trim().is_empty())
}

/// Resolve the Windows user: explicit override first, detection otherwise
pub fn resolve_user<F>(user_override: Option<&str>, detect: F) -> Result<String>
where
    F: FnOnce() -> Result<String>,
{
    match user_override.map(str::trim) {
        Some(user) if !user.is_empty() => Ok(user.to_string()),
        _ => detect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_echo_output() {
        assert_eq!(parse_echo_output(b"alice\r\n").unwrap(), "alice");
        assert_eq!(parse_echo_output(b"  Jane Doe \r\n").unwrap(), "Jane Doe");
    }

    #[test]
    fn test_parse_echo_output_unset() {
        assert!(matches!(
            parse_echo_output(b"\r\n"),
            Err(Error::UserNotDetected(_))
        ));
        assert!(matches!(
            parse_echo_output(b"%USERNAME%\r\n"),
            Err(Error::UserNotDetected(_))
        ));
    }

    #[test]
    fn test_resolve_user_override_wins() {
        let user = resolve_user(Some("bob"), || panic!("detection must not run")).unwrap();
        assert_eq!(user, "bob");
    }

    #[test]
    fn test_resolve_user_blank_override_detects() {
        let user = resolve_user(Some("  "), || Ok("carol".to_string())).unwrap();
        assert_eq!(user, "carol");
    }

    #[test]
    fn test_resolve_user_detection_failure() {
        let result = resolve_user(None, || {
            Err(Error::UserNotDetected("no cmd.exe".to_string()))
        });
        assert!(matches!(result, Err(Error::UserNotDetected(_))));
    }
}
