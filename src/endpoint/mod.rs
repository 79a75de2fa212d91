//! Agent endpoints
//!
//! gpg4win publishes one emulated socket per daemon in the Windows gnupg
//! directory. Each one is bridged to a UNIX socket of the same name in the
//! local gnupg home so unmodified `gpg`, `gpg-connect-agent` and `ssh`
//! find them where they expect.

mod user;

pub use user::{detect_windows_user, resolve_user};

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where WSL mounts the Windows users directory by default
pub const DEFAULT_USERS_DIR: &str = "/mnt/c/Users";

/// gpg4win home relative to a Windows user profile
pub const HOST_GNUPG_SUBDIR: &str = "AppData/Roaming/gnupg";

/// Logical agent channel
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "kebab-case")]
pub enum EndpointKind {
    /// Main gpg-agent socket
    Agent,
    /// Restricted socket for remote forwarding
    AgentExtra,
    /// Restricted socket for browsers
    AgentBrowser,
    /// ssh-agent emulation
    AgentSsh,
    /// Smartcard daemon
    Scdaemon,
    /// Directory manager daemon
    Dirmngr,
}

impl EndpointKind {
    /// Every endpoint, in startup order
    pub const ALL: [EndpointKind; 6] = [
        EndpointKind::Agent,
        EndpointKind::AgentExtra,
        EndpointKind::AgentBrowser,
        EndpointKind::AgentSsh,
        EndpointKind::Scdaemon,
        EndpointKind::Dirmngr,
    ];

    /// Short name used in logs and on the command line
    pub fn name(self) -> &'static str {
        match self {
            EndpointKind::Agent => "agent",
            EndpointKind::AgentExtra => "agent-extra",
            EndpointKind::AgentBrowser => "agent-browser",
            EndpointKind::AgentSsh => "agent-ssh",
            EndpointKind::Scdaemon => "scdaemon",
            EndpointKind::Dirmngr => "dirmngr",
        }
    }

    /// Socket file name, identical on both sides
    pub fn file_name(self) -> &'static str {
        match self {
            EndpointKind::Agent => "S.gpg-agent",
            EndpointKind::AgentExtra => "S.gpg-agent.extra",
            EndpointKind::AgentBrowser => "S.gpg-agent.browser",
            EndpointKind::AgentSsh => "S.gpg-agent.ssh",
            EndpointKind::Scdaemon => "S.scdaemon",
            EndpointKind::Dirmngr => "S.dirmngr",
        }
    }
}

impl fmt::Display for EndpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One resolved endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Which agent channel this is
    pub kind: EndpointKind,
    /// Emulated socket file written by the Windows agent
    pub descriptor_path: PathBuf,
    /// UNIX socket served locally
    pub socket_path: PathBuf,
}

impl Endpoint {
    /// Build an endpoint from the two gnupg directories
    pub fn new(kind: EndpointKind, host_gnupg_dir: &Path, local_gnupg_dir: &Path) -> Self {
        Self {
            kind,
            descriptor_path: host_gnupg_dir.join(kind.file_name()),
            socket_path: local_gnupg_dir.join(kind.file_name()),
        }
    }
}

/// Inputs for endpoint resolution
#[derive(Debug, Clone)]
pub struct ResolveOptions {
    /// Windows user name; detected when absent
    pub user: Option<String>,
    /// Windows users directory as mounted in WSL
    pub users_dir: PathBuf,
    /// Explicit Windows gnupg directory, bypassing user lookup
    pub host_gnupg_dir: Option<PathBuf>,
    /// Local gnupg home receiving the UNIX sockets
    pub gnupg_home: PathBuf,
    /// Endpoints to serve; empty means all
    pub kinds: Vec<EndpointKind>,
}

impl ResolveOptions {
    /// Whether resolving has to ask Windows for the user name
    pub fn needs_user_lookup(&self) -> bool {
        self.host_gnupg_dir.is_none() && !user::has_override(self.user.as_deref())
    }
}

/// The fixed, ordered set of endpoints for this process
#[derive(Debug, Clone)]
pub struct EndpointSet {
    host_user: Option<String>,
    host_gnupg_dir: PathBuf,
    local_gnupg_dir: PathBuf,
    endpoints: Vec<Endpoint>,
}

impl EndpointSet {
    /// Resolve endpoints
    ///
    /// `detect` is only called when neither a user nor a Windows gnupg
    /// directory was given.
    ///
    /// # Errors
    /// - `UserNotDetected` if detection fails and no override was supplied
    /// - `ProfileNotFound` if the user's profile directory does not exist
    pub fn resolve<F>(opts: &ResolveOptions, detect: F) -> Result<Self>
    where
        F: FnOnce() -> Result<String>,
    {
        let (host_user, host_gnupg_dir) = match &opts.host_gnupg_dir {
            Some(dir) => (None, dir.clone()),
            None => {
                let user = resolve_user(opts.user.as_deref(), detect)?;
                let profile = opts.users_dir.join(&user);
                if !profile.is_dir() {
                    return Err(Error::ProfileNotFound(profile));
                }
                (Some(user), profile.join(HOST_GNUPG_SUBDIR))
            }
        };

        let endpoints = EndpointKind::ALL
            .iter()
            .filter(|kind| opts.kinds.is_empty() || opts.kinds.contains(*kind))
            .map(|kind| Endpoint::new(*kind, &host_gnupg_dir, &opts.gnupg_home))
            .collect();

        Ok(Self {
            host_user,
            host_gnupg_dir,
            local_gnupg_dir: opts.gnupg_home.clone(),
            endpoints,
        })
    }

    /// Resolve endpoints, detecting the Windows user with `cmd.exe` if needed
    pub async fn discover(opts: &ResolveOptions) -> Result<Self> {
        let detected = if opts.needs_user_lookup() {
            Some(detect_windows_user().await)
        } else {
            None
        };
        Self::resolve(opts, || {
            detected.unwrap_or_else(|| {
                Err(Error::UserNotDetected("no username available".to_string()))
            })
        })
    }

    /// Windows user the endpoints belong to, if it was looked up
    pub fn host_user(&self) -> Option<&str> {
        self.host_user.as_deref()
    }

    /// Windows gnupg directory holding the descriptor files
    pub fn host_gnupg_dir(&self) -> &Path {
        &self.host_gnupg_dir
    }

    /// Local gnupg home holding the UNIX sockets
    pub fn local_gnupg_dir(&self) -> &Path {
        &self.local_gnupg_dir
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl IntoIterator for EndpointSet {
    type Item = Endpoint;
    type IntoIter = std::vec::IntoIter<Endpoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.endpoints.into_iter()
    }
}

/// Default local gnupg home: `$GNUPGHOME`, else `~/.gnupg`
pub fn default_gnupg_home() -> Option<PathBuf> {
    std::env::var_os("GNUPGHOME")
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .or_else(|| dirs::home_dir().map(|h| h.join(".gnupg")))
}
