//! Background mode for wsl-gpg-bridge
//!
//! - Spawn: re-execute the binary detached from the terminal and record its PID
//! - Stop: read the PID file and send SIGTERM, escalating to SIGKILL
//! - Status: check whether the recorded process is alive

use crate::error::{Error, Result};
use std::ffi::OsString;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::process::CommandExt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

/// Daemon status information
#[derive(Debug, Clone)]
pub struct DaemonStatus {
    /// Whether the daemon is running
    pub running: bool,
    /// Process ID recorded in the PID file
    pub pid: Option<u32>,
    /// PID file path
    pub pid_file: PathBuf,
}

/// How a stop request ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Process exited after SIGTERM
    Terminated(u32),
    /// Process had to be killed
    Killed(u32),
    /// PID file pointed at a dead process and was removed
    WasNotRunning,
}

/// Daemon manager keyed by PID file
#[derive(Debug)]
pub struct Daemon {
    pid_file: PathBuf,
}

impl Daemon {
    /// Create a new Daemon manager with a custom PID file path
    pub fn with_pid_file(pid_file: PathBuf) -> Self {
        Self { pid_file }
    }

    /// `$XDG_RUNTIME_DIR/wsl-gpg-bridge.pid`, falling back to the state dir
    /// and then `/tmp`
    pub fn default_pid_file() -> PathBuf {
        dirs::runtime_dir()
            .or_else(dirs::state_dir)
            .unwrap_or_else(|| PathBuf::from("/tmp"))
            .join("wsl-gpg-bridge.pid")
    }

    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Start this executable in the background with `args`
    ///
    /// The child gets its own session so it survives the terminal closing.
    /// Its stderr goes to `log_file` when given, otherwise nowhere.
    pub fn spawn(&self, args: &[OsString], log_file: Option<&Path>) -> Result<u32> {
        if let Ok(status) = self.status()
            && status.running
        {
            return Err(Error::Daemon(format!(
                "Already running with PID {}",
                status.pid.unwrap_or(0)
            )));
        }

        if let Some(parent) = self.pid_file.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Daemon(format!("Failed to create PID file directory: {}", e))
            })?;
        }

        let executable = std::env::current_exe()
            .map_err(|e| Error::Daemon(format!("Failed to get current executable path: {}", e)))?;

        let stderr = match log_file {
            Some(path) => OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map(Stdio::from)
                .map_err(|e| {
                    Error::Daemon(format!("Failed to open log file {}: {}", path.display(), e))
                })?,
            None => Stdio::null(),
        };

        let mut cmd = Command::new(&executable);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr);

        // SAFETY: setsid is async-signal-safe and touches no parent state
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(io::Error::last_os_error());
                }
                Ok(())
            });
        }

        let child = cmd
            .spawn()
            .map_err(|e| Error::Daemon(format!("Failed to start background process: {}", e)))?;
        let pid = child.id();

        fs::write(&self.pid_file, pid.to_string())
            .map_err(|e| Error::Daemon(format!("Failed to write PID file: {}", e)))?;

        tracing::debug!(pid, pid_file = %self.pid_file.display(), "Background process started");
        Ok(pid)
    }

    /// Check whether the recorded process is running
    pub fn status(&self) -> Result<DaemonStatus> {
        let pid = self.read_pid()?;
        Ok(DaemonStatus {
            running: pid.is_some_and(is_process_running),
            pid,
            pid_file: self.pid_file.clone(),
        })
    }

    /// Stop the recorded process
    ///
    /// Sends SIGTERM and waits up to `timeout` before sending SIGKILL. With
    /// `force` SIGKILL is sent right away.
    pub async fn stop(&self, timeout: Duration, force: bool) -> Result<StopOutcome> {
        let pid = self.read_pid()?.ok_or_else(|| {
            Error::Daemon(format!(
                "PID file not found: {}. Is the bridge running?",
                self.pid_file.display()
            ))
        })?;

        if !is_process_running(pid) {
            self.remove_pid_file();
            return Ok(StopOutcome::WasNotRunning);
        }

        let outcome = if force {
            send_signal(pid, libc::SIGKILL)?;
            StopOutcome::Killed(pid)
        } else {
            send_signal(pid, libc::SIGTERM)?;
            let poll_interval = Duration::from_millis(100);
            let mut elapsed = Duration::ZERO;
            while is_process_running(pid) && elapsed < timeout {
                tokio::time::sleep(poll_interval).await;
                elapsed += poll_interval;
            }

            if is_process_running(pid) {
                tracing::warn!(pid, "Process did not exit in time, sending SIGKILL");
                send_signal(pid, libc::SIGKILL)?;
                StopOutcome::Killed(pid)
            } else {
                StopOutcome::Terminated(pid)
            }
        };

        self.remove_pid_file();
        Ok(outcome)
    }

    /// Record the current process in the PID file
    pub fn record_current(&self) -> Result<()> {
        if let Some(parent) = self.pid_file.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::Daemon(format!("Failed to create PID file directory: {}", e))
            })?;
        }
        fs::write(&self.pid_file, std::process::id().to_string())
            .map_err(|e| Error::Daemon(format!("Failed to write PID file: {}", e)))
    }

    /// Remove the PID file if it records the current process
    pub fn release(&self) {
        if let Ok(Some(pid)) = self.read_pid()
            && pid == std::process::id()
        {
            self.remove_pid_file();
        }
    }

    fn read_pid(&self) -> Result<Option<u32>> {
        let content = match fs::read_to_string(&self.pid_file) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Daemon(format!("Failed to read PID file: {}", e))),
        };
        content
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::Daemon(format!("Invalid PID in file: {}", e)))
    }

    fn remove_pid_file(&self) {
        if let Err(e) = fs::remove_file(&self.pid_file)
            && e.kind() != io::ErrorKind::NotFound
        {
            tracing::warn!(pid_file = %self.pid_file.display(), error = %e, "Failed to remove PID file");
        }
    }
}

/// Check if a process exists (signal 0)
fn is_process_running(pid: u32) -> bool {
    let Ok(pid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: kill with signal 0 only performs the permission/existence check
    unsafe { libc::kill(pid, 0) == 0 }
}

fn send_signal(pid: u32, signal: libc::c_int) -> Result<()> {
    let raw = libc::pid_t::try_from(pid)
        .map_err(|_| Error::Daemon(format!("Invalid PID {}", pid)))?;
    // SAFETY: plain syscall on a PID we read from our own PID file
    if unsafe { libc::kill(raw, signal) } != 0 {
        return Err(Error::Daemon(format!(
            "Failed to send signal {} to process {}: {}",
            signal,
            pid,
            io::Error::last_os_error()
        )));
    }
    Ok(())
}
