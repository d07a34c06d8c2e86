//! UDP server loop
//!
//! Wraps the synchronous engine with a tokio UDP socket and the per-peer
//! session table the engine deliberately does not keep: every peer address
//! (TID) gets its own [`Session`], created on demand and dropped once the
//! peer goes idle again. Replies leave through the server's bound socket.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tftp_engine::{Resolver, Session, Transport};
use tokio::net::UdpSocket;

use crate::folder::FolderResolver;

/// Most peers served at once; packets from new peers are dropped beyond it.
pub const MAX_SESSIONS: usize = 256;

/// Transport sending replies to one fixed peer through a shared socket
///
/// Fire-and-forget by contract: a failed or would-block send is logged and
/// forgotten, matching what the engine expects of its transport.
pub struct SocketTransport {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

impl SocketTransport {
    /// Create a transport addressing `peer` through `socket`.
    pub fn new(socket: Arc<UdpSocket>, peer: SocketAddr) -> Self {
        Self { socket, peer }
    }
}

impl Transport for SocketTransport {
    fn send(&mut self, datagram: &[u8]) {
        if let Err(e) = self.socket.try_send_to(datagram, self.peer) {
            tracing::debug!(peer = %self.peer, error = %e, "failed to send reply");
        }
    }
}

/// TFTP server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            // 6969 for non-root testing; redirect or run as root for :69
            bind_address: "0.0.0.0:6969".to_string(),
        }
    }
}

/// Main TFTP server: one UDP socket, one engine session per peer
pub struct TftpServer<R: Resolver + Clone> {
    config: ServerConfig,
    resolver: R,
    socket: Option<Arc<UdpSocket>>,
}

impl<R: Resolver + Clone> TftpServer<R> {
    /// Create a new server with the given configuration and resolver.
    pub fn new(config: ServerConfig, resolver: R) -> Self {
        Self {
            config,
            resolver,
            socket: None,
        }
    }

    /// Create a new server with a custom bind address.
    pub fn with_resolver(bind_address: String, resolver: R) -> Self {
        Self::new(ServerConfig { bind_address }, resolver)
    }

    /// Get the server's configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the server socket, returning the local address
    ///
    /// Useful with an ephemeral port (`host:0`) to learn where the server
    /// actually listens. Idempotent: a bound server keeps its socket.
    pub async fn bind(&mut self) -> Result<SocketAddr> {
        if self.socket.is_none() {
            let socket = UdpSocket::bind(&self.config.bind_address)
                .await
                .context("Failed to bind TFTP server socket")?;
            self.socket = Some(Arc::new(socket));
        }
        self.local_addr().context("Failed to get local address")
    }

    /// Get the local address the server is bound to (if bound).
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }

    /// Bind (if not already bound) and run the main loop.
    pub async fn run(&mut self) -> Result<()> {
        let local_addr = self.bind().await?;
        tracing::info!("TFTP server listening on {}", local_addr);
        self.serve().await
    }

    /// Main server loop
    async fn serve(&self) -> Result<()> {
        let socket = self
            .socket
            .clone()
            .expect("Server must be bound before serving");

        let mut sessions: HashMap<SocketAddr, Session<SocketTransport, R>> = HashMap::new();
        let mut buffer = [0u8; 2048];

        loop {
            let (len, peer) = socket.recv_from(&mut buffer).await?;
            tracing::debug!(%peer, len, "received packet");

            if !sessions.contains_key(&peer) {
                if sessions.len() >= MAX_SESSIONS {
                    tracing::warn!(%peer, "session table full, dropping packet");
                    continue;
                }
                let transport = SocketTransport::new(socket.clone(), peer);
                sessions.insert(peer, Session::new(transport, self.resolver.clone()));
            }

            if let Some(session) = sessions.get_mut(&peer) {
                session.process(&buffer[..len]);
                // A session that ended up idle holds nothing worth keeping.
                if session.is_idle() {
                    sessions.remove(&peer);
                }
            }
        }
    }
}

/// Run a TFTP server publishing the files of `root`
///
/// Convenience wrapper that creates and runs a folder-backed server.
pub async fn run_folder_server(bind_address: String, root: PathBuf) -> Result<()> {
    tracing::info!("serving files from {}", root.display());
    let mut server = TftpServer::with_resolver(bind_address, FolderResolver::new(root));
    server.run().await
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tempfile::tempdir;

    use super::*;

    #[test]
    fn test_server_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address, "0.0.0.0:6969");
    }

    #[test]
    fn test_server_creation() {
        let resolver = FolderResolver::new("./tftp_root");
        let server = TftpServer::new(ServerConfig::default(), resolver);
        assert_eq!(server.config().bind_address, "0.0.0.0:6969");
        assert!(server.local_addr().is_none()); // Not bound yet

        let custom = TftpServer::with_resolver(
            "127.0.0.1:9999".to_string(),
            FolderResolver::new("/tmp/tftp"),
        );
        assert_eq!(custom.config().bind_address, "127.0.0.1:9999");
    }

    #[tokio::test]
    async fn test_server_bind_reports_address() {
        let temp_dir = tempdir().unwrap();
        let mut server = TftpServer::with_resolver(
            "127.0.0.1:0".to_string(),
            FolderResolver::new(temp_dir.path()),
        );

        let addr = server.bind().await.unwrap();
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_ne!(addr.port(), 0);
        assert_eq!(server.local_addr(), Some(addr));

        // Binding again keeps the same socket.
        assert_eq!(server.bind().await.unwrap(), addr);
    }

    #[tokio::test]
    async fn test_server_run_aborts_cleanly() {
        let temp_dir = tempdir().unwrap();
        let mut server = TftpServer::with_resolver(
            "127.0.0.1:0".to_string(),
            FolderResolver::new(temp_dir.path()),
        );

        let server_task = tokio::spawn(async move { server.run().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        server_task.abort();
        assert!(server_task.await.is_err());
    }
}
