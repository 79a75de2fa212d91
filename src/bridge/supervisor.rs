//! Proxy supervisor
//!
//! Turns the resolved endpoint set into running listeners and coordinates
//! their shutdown. Endpoints that cannot be served are skipped; only an
//! occupied socket path or having nothing to serve stops startup.

use crate::assuan::Descriptor;
use crate::endpoint::{Endpoint, EndpointKind, EndpointSet};
use crate::error::{Error, Result};
use crate::utils::socket::{SocketProbe, probe_socket};
use std::future::Future;
use std::path::PathBuf;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use super::Listener;

/// Builds and starts one listener per usable endpoint
pub struct Supervisor {
    endpoints: EndpointSet,
    ignore_existing: bool,
}

impl Supervisor {
    pub fn new(endpoints: EndpointSet) -> Self {
        Self {
            endpoints,
            ignore_existing: false,
        }
    }

    /// Skip endpoints whose socket is already served instead of failing
    pub fn ignore_existing(mut self, ignore: bool) -> Self {
        self.ignore_existing = ignore;
        self
    }

    /// Decide which endpoints to serve without binding anything
    ///
    /// # Errors
    /// - `SocketInUse` if a socket path is live and `ignore_existing` is off
    /// - `NoEndpoints` if no endpoint is left to serve
    pub async fn plan(&self) -> Result<Vec<Endpoint>> {
        let mut planned = Vec::new();

        for endpoint in self.endpoints.endpoints() {
            match Descriptor::read(&endpoint.descriptor_path).await {
                Ok(descriptor) => {
                    debug!(endpoint = %endpoint.kind, port = descriptor.port(), "Found socket descriptor");
                }
                Err(Error::DescriptorNotFound(path)) => {
                    info!(
                        endpoint = %endpoint.kind,
                        path = %path.display(),
                        "No socket descriptor, skipping"
                    );
                    continue;
                }
                // The host agent may rewrite it before the first client shows up
                Err(e) => {
                    warn!(endpoint = %endpoint.kind, error = %e, "Socket descriptor unusable for now");
                }
            }

            match probe_socket(&endpoint.socket_path).await {
                SocketProbe::Live if self.ignore_existing => {
                    info!(
                        endpoint = %endpoint.kind,
                        path = %endpoint.socket_path.display(),
                        "Socket already served by another process, skipping"
                    );
                    continue;
                }
                SocketProbe::Live => {
                    return Err(Error::SocketInUse(endpoint.socket_path.clone()));
                }
                SocketProbe::Stale => {
                    debug!(path = %endpoint.socket_path.display(), "Replacing stale socket file");
                }
                SocketProbe::Absent => {}
            }

            planned.push(endpoint.clone());
        }

        if planned.is_empty() {
            return Err(Error::NoEndpoints);
        }
        Ok(planned)
    }

    /// Bind every planned endpoint and start accepting
    ///
    /// An endpoint that fails to bind is logged and skipped.
    pub async fn start(self) -> Result<RunningSupervisor> {
        let mut bound = Vec::new();
        for endpoint in self.plan().await? {
            let mut listener = Listener::new(endpoint);
            match listener.bind() {
                Ok(()) => bound.push(listener),
                Err(e) => {
                    warn!(endpoint = %listener.endpoint().kind, error = %e, "Skipping endpoint")
                }
            }
        }

        if bound.is_empty() {
            return Err(Error::NoEndpoints);
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut listeners = JoinSet::new();
        let mut served = Vec::with_capacity(bound.len());

        for listener in bound {
            let kind = listener.endpoint().kind;
            served.push((kind, listener.socket_path().to_path_buf()));
            let shutdown_rx = shutdown_rx.clone();
            listeners.spawn(async move {
                let result = listener.run(shutdown_rx).await;
                // Removes the socket file before the task reports back
                drop(listener);
                (kind, result)
            });
        }

        info!(sockets = served.len(), "Proxying sockets");
        Ok(RunningSupervisor {
            shutdown_tx,
            listeners,
            served,
        })
    }
}

/// Handle to the running listeners
pub struct RunningSupervisor {
    shutdown_tx: watch::Sender<bool>,
    listeners: JoinSet<(EndpointKind, Result<()>)>,
    served: Vec<(EndpointKind, PathBuf)>,
}

impl RunningSupervisor {
    /// Endpoints being served and their socket paths
    pub fn served(&self) -> &[(EndpointKind, PathBuf)] {
        &self.served
    }

    /// Run until `stop` resolves, then shut down
    ///
    /// A listener that dies does not affect its siblings. If every listener
    /// is gone there is nothing left to do and an error is returned.
    pub async fn run_until<F>(mut self, stop: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(stop);

        let outcome = loop {
            tokio::select! {
                _ = &mut stop => {
                    info!("Received shutdown signal, stopping");
                    break Ok(());
                }
                joined = self.listeners.join_next() => match joined {
                    Some(joined) => log_listener_exit(joined),
                    None => {
                        error!("All listeners have stopped");
                        break Err(Error::Socket("All listeners have stopped".to_string()));
                    }
                },
            }
        };

        self.shutdown().await;
        outcome
    }

    /// Stop all listeners and wait until their sockets are removed
    pub async fn shutdown(mut self) {
        // Receivers only go away when their listener has already exited
        let _ = self.shutdown_tx.send(true);
        while let Some(joined) = self.listeners.join_next().await {
            log_listener_exit(joined);
        }
        info!("Shutdown complete");
    }
}

fn log_listener_exit(joined: std::result::Result<(EndpointKind, Result<()>), tokio::task::JoinError>) {
    match joined {
        Ok((kind, Ok(()))) => debug!(endpoint = %kind, "Listener closed"),
        Ok((kind, Err(e))) => warn!(endpoint = %kind, error = %e, "Listener stopped"),
        Err(e) => error!(error = %e, "Listener task failed"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::ResolveOptions;
    use std::path::Path;
    use tempfile::TempDir;

    fn endpoint_set(host: &Path, local: &Path, kinds: Vec<EndpointKind>) -> EndpointSet {
        let opts = ResolveOptions {
            user: None,
            users_dir: PathBuf::from("/nonexistent"),
            host_gnupg_dir: Some(host.to_path_buf()),
            gnupg_home: local.to_path_buf(),
            kinds,
        };
        EndpointSet::resolve(&opts, || unreachable!()).unwrap()
    }

    #[tokio::test]
    async fn test_plan_skips_missing_descriptors() {
        let host = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        std::fs::write(host.path().join("S.gpg-agent"), b"40000\n00").unwrap();

        let supervisor = Supervisor::new(endpoint_set(host.path(), local.path(), vec![]));
        let planned = supervisor.plan().await.unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].kind, EndpointKind::Agent);
    }

    #[tokio::test]
    async fn test_plan_keeps_malformed_descriptor() {
        let host = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        std::fs::write(host.path().join("S.dirmngr"), b"junk").unwrap();

        let supervisor = Supervisor::new(endpoint_set(host.path(), local.path(), vec![]));
        let planned = supervisor.plan().await.unwrap();
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].kind, EndpointKind::Dirmngr);
    }

    #[tokio::test]
    async fn test_plan_nothing_to_serve() {
        let host = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();

        let supervisor = Supervisor::new(endpoint_set(host.path(), local.path(), vec![]));
        assert!(matches!(supervisor.plan().await, Err(Error::NoEndpoints)));
    }

    #[tokio::test]
    async fn test_plan_live_socket() {
        let host = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        std::fs::write(host.path().join("S.gpg-agent"), b"40000\n00").unwrap();
        std::fs::write(host.path().join("S.scdaemon"), b"40001\n00").unwrap();
        let _native_agent =
            tokio::net::UnixListener::bind(local.path().join("S.gpg-agent")).unwrap();

        let set = endpoint_set(host.path(), local.path(), vec![]);
        let err = Supervisor::new(set.clone()).plan().await.unwrap_err();
        assert!(matches!(err, Error::SocketInUse(_)));

        let planned = Supervisor::new(set)
            .ignore_existing(true)
            .plan()
            .await
            .unwrap();
        let kinds: Vec<_> = planned.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EndpointKind::Scdaemon]);
    }

    #[tokio::test]
    async fn test_start_and_shutdown_removes_sockets() {
        let host = TempDir::new().unwrap();
        let local = TempDir::new().unwrap();
        std::fs::write(host.path().join("S.gpg-agent"), b"40000\n00").unwrap();
        std::fs::write(host.path().join("S.gpg-agent.ssh"), b"40001\n00").unwrap();

        let running = Supervisor::new(endpoint_set(host.path(), local.path(), vec![]))
            .start()
            .await
            .unwrap();
        let paths: Vec<_> = running.served().iter().map(|(_, p)| p.clone()).collect();
        assert_eq!(paths.len(), 2);
        assert!(paths.iter().all(|p| p.exists()));

        running.run_until(async {}).await.unwrap();
        assert!(paths.iter().all(|p| !p.exists()));
    }
}
