//! UNIX socket listener for one endpoint
//!
//! Binds the endpoint's socket path and spawns a relay session for every
//! accepted client, so a stalled client never holds up the next accept.

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use crate::utils::socket::{prepare_socket_path, remove_existing_socket, set_socket_permissions};
use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UnixListener;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, trace, warn};

use super::Relay;

/// Pause after a transient accept failure such as fd exhaustion
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Listener owning one endpoint's UNIX socket
pub struct Listener {
    endpoint: Arc<Endpoint>,
    /// The listener (created on bind)
    listener: Option<UnixListener>,
}

impl Listener {
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint: Arc::new(endpoint),
            listener: None,
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn socket_path(&self) -> &Path {
        &self.endpoint.socket_path
    }

    /// Bind the endpoint's socket path
    ///
    /// Any file left at the path by an earlier run is removed first.
    pub fn bind(&mut self) -> Result<()> {
        let path = &self.endpoint.socket_path;
        let bind_failed = |reason: String| Error::ListenerBindFailed {
            path: path.clone(),
            reason,
        };

        prepare_socket_path(path).map_err(|e| bind_failed(e.to_string()))?;
        let listener = UnixListener::bind(path).map_err(|e| bind_failed(e.to_string()))?;
        self.listener = Some(listener);
        set_socket_permissions(path).map_err(|e| bind_failed(e.to_string()))?;

        info!(endpoint = %self.endpoint.kind, path = %path.display(), "Listening");
        Ok(())
    }

    /// Accept clients until shutdown is signalled or the socket fails
    ///
    /// On return every session spawned by this listener has been aborted,
    /// which closes both of its sockets.
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> Result<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| Error::Socket("Listener is not bound".to_string()))?;

        let relay = Arc::new(Relay::new(Arc::clone(&self.endpoint)));
        let mut sessions = JoinSet::new();

        let result = loop {
            tokio::select! {
                // A dropped sender counts as shutdown
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        debug!(endpoint = %self.endpoint.kind, "Shutdown requested");
                        break Ok(());
                    }
                }

                accept_result = listener.accept() => match accept_result {
                    Ok((stream, _addr)) => {
                        trace!(endpoint = %self.endpoint.kind, "Accepted client connection");
                        let relay = Arc::clone(&relay);
                        sessions.spawn(async move {
                            if let Err(e) = relay.handle_client(stream).await {
                                log_session_error(relay.endpoint(), &e);
                            }
                        });
                    }
                    Err(e) if is_transient(&e) && self.socket_path().exists() => {
                        warn!(endpoint = %self.endpoint.kind, error = %e, "Accept failed, retrying");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                    Err(e) => {
                        error!(endpoint = %self.endpoint.kind, error = %e, "Listener failed");
                        break Err(Error::Socket(format!(
                            "Accept failed on {}: {}",
                            self.socket_path().display(),
                            e
                        )));
                    }
                },

                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined
                        && e.is_panic()
                    {
                        error!(endpoint = %self.endpoint.kind, "Relay session panicked");
                    }
                }
            }
        };

        if !sessions.is_empty() {
            debug!(
                endpoint = %self.endpoint.kind,
                sessions = sessions.len(),
                "Closing active sessions"
            );
        }
        sessions.abort_all();
        while sessions.join_next().await.is_some() {}

        result
    }

    /// Remove the socket file if this listener created it
    fn cleanup(&mut self) {
        if self.listener.take().is_none() {
            return;
        }
        let path = &self.endpoint.socket_path;
        match remove_existing_socket(path) {
            Ok(()) => debug!(path = %path.display(), "Removed socket file"),
            Err(e) => warn!(
                path = %path.display(),
                error = %e,
                "Failed to remove socket file during cleanup"
            ),
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Accept errors that leave the listening socket usable
fn is_transient(e: &io::Error) -> bool {
    match e.kind() {
        io::ErrorKind::Interrupted
        | io::ErrorKind::WouldBlock
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::ConnectionReset => true,
        _ => matches!(
            e.raw_os_error(),
            Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
        ),
    }
}

fn log_session_error(endpoint: &Endpoint, err: &Error) {
    match err {
        Error::DescriptorNotFound(_) => {
            info!(endpoint = %endpoint.kind, "Host agent is not running, closing client")
        }
        Error::MalformedDescriptor { .. } | Error::ConnectFailed { .. } => {
            warn!(endpoint = %endpoint.kind, error = %err, "Closing client")
        }
        // Peers resetting mid-session is routine
        _ => debug!(endpoint = %endpoint.kind, error = %err, "Session ended with error"),
    }
}
