//! Relay sessions
//!
//! A session pairs one accepted UNIX connection with a fresh TCP connection
//! to the host agent. The nonce goes out first, then bytes are copied both
//! ways until either side finishes, at which point both sockets are closed.

use crate::assuan::Descriptor;
use crate::endpoint::Endpoint;
use crate::error::{Error, Result};
use std::io;
use std::net::Ipv4Addr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpStream, UnixStream};
use tokio::task::JoinSet;
use tracing::{debug, trace};

/// Upper bound for the loopback TCP handshake
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Copy direction within a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Local client to host agent
    ToAgent,
    /// Host agent to local client
    ToClient,
}

/// Per-endpoint session factory
pub struct Relay {
    endpoint: Arc<Endpoint>,
    session_counter: AtomicU64,
}

impl Relay {
    pub fn new(endpoint: Arc<Endpoint>) -> Self {
        Self {
            endpoint,
            session_counter: AtomicU64::new(0),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Run one session to completion
    ///
    /// Any error ends this session only. Dropping `client` on an early
    /// return is what closes the client connection.
    pub async fn handle_client(&self, client: UnixStream) -> Result<()> {
        let session = self.session_counter.fetch_add(1, Ordering::Relaxed);
        debug!(endpoint = %self.endpoint.kind, session, "Client connected");

        let result = self.handle_client_inner(client).await;

        debug!(endpoint = %self.endpoint.kind, session, "Session closed");
        result
    }

    async fn handle_client_inner(&self, client: UnixStream) -> Result<()> {
        let descriptor = Descriptor::read(&self.endpoint.descriptor_path).await?;
        let mut upstream = connect_host_agent(descriptor.port()).await?;
        trace!(
            endpoint = %self.endpoint.kind,
            port = descriptor.port(),
            "Connected to host agent"
        );

        send_preamble(&mut upstream, descriptor.key()).await?;
        pump(client, upstream).await
    }
}

/// Connect to the host agent's loopback port
pub async fn connect_host_agent(port: u16) -> Result<TcpStream> {
    let stream = tokio::time::timeout(
        CONNECT_TIMEOUT,
        TcpStream::connect((Ipv4Addr::LOCALHOST, port)),
    )
    .await
    .map_err(|_| Error::ConnectFailed {
        port,
        source: io::ErrorKind::TimedOut.into(),
    })?
    .map_err(|source| Error::ConnectFailed { port, source })?;

    stream.set_nodelay(true)?;
    Ok(stream)
}

/// Write the nonce as the very first bytes on the connection
async fn send_preamble(upstream: &mut TcpStream, key: &[u8]) -> Result<()> {
    upstream.write_all(key).await.map_err(Error::RelayIo)?;
    upstream.flush().await.map_err(Error::RelayIo)
}

/// Copy bytes both ways until one direction ends
///
/// Each direction runs as its own task. When the first one finishes the
/// other is aborted; dropping its stream halves closes both sockets. If the
/// caller is cancelled, dropping the `JoinSet` aborts both copies.
pub async fn pump(client: UnixStream, upstream: TcpStream) -> Result<()> {
    let (mut client_rd, mut client_wr) = client.into_split();
    let (mut upstream_rd, mut upstream_wr) = upstream.into_split();

    let mut directions = JoinSet::new();
    directions.spawn(async move {
        let copied = tokio::io::copy(&mut client_rd, &mut upstream_wr).await;
        (Direction::ToAgent, copied)
    });
    directions.spawn(async move {
        let copied = tokio::io::copy(&mut upstream_rd, &mut client_wr).await;
        (Direction::ToClient, copied)
    });

    let first = directions.join_next().await;
    directions.abort_all();
    while directions.join_next().await.is_some() {}

    match first {
        Some(Ok((direction, Ok(bytes)))) => {
            trace!(?direction, bytes, "Peer closed, session finished");
            Ok(())
        }
        Some(Ok((direction, Err(e)))) => {
            trace!(?direction, error = %e, "Copy failed");
            Err(Error::RelayIo(e))
        }
        Some(Err(e)) => Err(Error::RelayIo(io::Error::other(e))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::endpoint::EndpointKind;
    use std::path::Path;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    fn endpoint_in(dir: &Path) -> Arc<Endpoint> {
        Arc::new(Endpoint::new(
            EndpointKind::Agent,
            &dir.join("win"),
            &dir.join("local"),
        ))
    }

    #[tokio::test]
    async fn test_connect_refused() {
        // Grab a free port, then close it so nothing listens there
        let port = {
            let l = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
            l.local_addr().unwrap().port()
        };
        let err = connect_host_agent(port).await.unwrap_err();
        assert!(matches!(err, Error::ConnectFailed { port: p, .. } if p == port));
    }

    #[tokio::test]
    async fn test_missing_descriptor_closes_client() {
        let dir = tempdir().unwrap();
        let relay = Relay::new(endpoint_in(dir.path()));
        let (ours, mut theirs) = UnixStream::pair().unwrap();

        let err = relay.handle_client(ours).await.unwrap_err();
        assert!(matches!(err, Error::DescriptorNotFound(_)));

        // Client sees end-of-stream
        let mut buf = [0u8; 1];
        assert_eq!(theirs.read(&mut buf).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_preamble_then_payload() {
        let dir = tempdir().unwrap();
        let endpoint = endpoint_in(dir.path());
        std::fs::create_dir_all(dir.path().join("win")).unwrap();

        let agent = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = agent.local_addr().unwrap().port();
        std::fs::write(
            &endpoint.descriptor_path,
            format!("{}\nAABBCCDD", port),
        )
        .unwrap();

        let relay = Relay::new(endpoint);
        let (ours, mut client) = UnixStream::pair().unwrap();
        let session = tokio::spawn(async move { relay.handle_client(ours).await });

        let (mut upstream, _) = agent.accept().await.unwrap();
        client.write_all(b"GETINFO version\n").await.unwrap();

        let mut received = vec![0u8; 4 + 16];
        upstream.read_exact(&mut received).await.unwrap();
        assert_eq!(&received[..4], &[0xAA, 0xBB, 0xCC, 0xDD]);
        assert_eq!(&received[4..], b"GETINFO version\n");

        upstream.write_all(b"D 2.4.5\nOK\n").await.unwrap();
        let mut reply = vec![0u8; 11];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(&reply, b"D 2.4.5\nOK\n");

        // Agent hangs up: the client must see end-of-stream too
        drop(upstream);
        let mut buf = [0u8; 1];
        assert_eq!(client.read(&mut buf).await.unwrap(), 0);
        session.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_client_close_closes_upstream() {
        let agent = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let port = agent.local_addr().unwrap().port();

        let (ours, client) = UnixStream::pair().unwrap();
        let upstream = connect_host_agent(port).await.unwrap();
        let (mut agent_side, _) = agent.accept().await.unwrap();
        let session = tokio::spawn(pump(ours, upstream));

        drop(client);
        let mut buf = [0u8; 1];
        let n = tokio::time::timeout(Duration::from_secs(5), agent_side.read(&mut buf))
            .await
            .expect("upstream should be closed promptly")
            .unwrap();
        assert_eq!(n, 0);
        session.await.unwrap().unwrap();
    }
}
