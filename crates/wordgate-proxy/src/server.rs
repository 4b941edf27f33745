//! Proxy server: configuration, accept loop, and lifecycle.
//!
//! The accept loop is the only owner of the mutable [`PolicyStore`]. Each
//! iteration races the control channel against the client listener, so a
//! quiet operator never stalls accepts and a burst of clients never stalls
//! the operator. Every accepted connection gets a spawned worker with an
//! owned denylist snapshot; there is no lock anywhere on the request path.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

use wordgate_core::{PolicySnapshot, PolicyStore, DEFAULT_CAPACITY, DEFAULT_MAX_WORD_LEN};

use crate::control::{apply_command, ControlChannel};
use crate::error::{ProxyError, Result};
use crate::worker;

/// Default port browser clients connect to.
pub const DEFAULT_CLIENT_PORT: u16 = 9001;

/// Default port for the operator control connection.
pub const DEFAULT_CONTROL_PORT: u16 = 9000;

/// Default port used when connecting to origin servers.
pub const DEFAULT_ORIGIN_PORT: u16 = 80;

/// Default resource served in place of blocked requests.
pub const DEFAULT_ERROR_URL: &str = "http://blocked.example/error.html";

/// Proxy server configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Address browser clients connect to.
    pub client_addr: SocketAddr,
    /// Address the operator control connection uses.
    pub control_addr: SocketAddr,
    /// Port used for origin connections.
    pub origin_port: u16,
    /// URL substituted for blocked requests.
    pub error_url: String,
    /// Whether fetched HTML bodies are scanned as well.
    pub deep_inspection: bool,
    /// Maximum number of denylisted words.
    pub policy_capacity: usize,
    /// Maximum length of one denylisted word, in bytes.
    pub max_word_len: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            client_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_CLIENT_PORT)),
            control_addr: SocketAddr::from(([127, 0, 0, 1], DEFAULT_CONTROL_PORT)),
            origin_port: DEFAULT_ORIGIN_PORT,
            error_url: DEFAULT_ERROR_URL.to_string(),
            deep_inspection: false,
            policy_capacity: DEFAULT_CAPACITY,
            max_word_len: DEFAULT_MAX_WORD_LEN,
        }
    }
}

impl ProxyConfig {
    /// Creates a configuration with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client listen address.
    pub fn with_client_addr(mut self, addr: SocketAddr) -> Self {
        self.client_addr = addr;
        self
    }

    /// Sets the client port (uses 127.0.0.1 as host).
    pub fn with_client_port(mut self, port: u16) -> Self {
        self.client_addr = SocketAddr::from(([127, 0, 0, 1], port));
        self
    }

    /// Sets the control listen address.
    pub fn with_control_addr(mut self, addr: SocketAddr) -> Self {
        self.control_addr = addr;
        self
    }

    /// Sets the control port (uses 127.0.0.1 as host).
    pub fn with_control_port(mut self, port: u16) -> Self {
        self.control_addr = SocketAddr::from(([127, 0, 0, 1], port));
        self
    }

    /// Sets the origin HTTP port.
    pub fn with_origin_port(mut self, port: u16) -> Self {
        self.origin_port = port;
        self
    }

    /// Sets the error-page URL substituted for blocked requests.
    pub fn with_error_url(mut self, url: impl Into<String>) -> Self {
        self.error_url = url.into();
        self
    }

    /// Enables or disables deep inspection of fetched HTML bodies.
    pub fn with_deep_inspection(mut self, enabled: bool) -> Self {
        self.deep_inspection = enabled;
        self
    }

    /// Sets the denylist capacity and per-word length bounds.
    pub fn with_policy_limits(mut self, capacity: usize, max_word_len: usize) -> Self {
        self.policy_capacity = capacity;
        self.max_word_len = max_word_len;
        self
    }
}

/// The censoring forward proxy server.
pub struct ProxyServer {
    config: ProxyConfig,
}

impl ProxyServer {
    /// Creates a new proxy server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        Self { config }
    }

    /// Creates a proxy server with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(ProxyConfig::default())
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Binds the client and control listeners without serving yet.
    pub async fn bind(self) -> Result<BoundProxy> {
        let clients = TcpListener::bind(self.config.client_addr)
            .await
            .map_err(|e| ProxyError::Bind(self.config.client_addr, e))?;
        let control = TcpListener::bind(self.config.control_addr)
            .await
            .map_err(|e| ProxyError::Bind(self.config.control_addr, e))?;

        let client_addr = clients.local_addr()?;
        let control_addr = control.local_addr()?;
        tracing::info!("client listener bound on {}", client_addr);
        tracing::info!("control listener bound on {}", control_addr);

        Ok(BoundProxy {
            config: self.config,
            clients,
            control,
            client_addr,
            control_addr,
        })
    }

    /// Binds and runs the proxy.
    ///
    /// Blocks until the server is shut down or fails.
    pub async fn run(self) -> Result<()> {
        self.bind().await?.run().await
    }
}

/// A proxy whose listeners are bound but not yet serving.
///
/// Splitting bind from serve lets callers learn the actual addresses when
/// configured with port 0.
pub struct BoundProxy {
    config: ProxyConfig,
    clients: TcpListener,
    control: TcpListener,
    client_addr: SocketAddr,
    control_addr: SocketAddr,
}

impl BoundProxy {
    /// The address browser clients connect to.
    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// The address the operator control connection uses.
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Accepts the single control connection, then serves clients until
    /// shut down or failure.
    pub async fn run(self) -> Result<()> {
        tracing::info!("waiting for control connection on {}", self.control_addr);
        let control = ControlChannel::accept(&self.control).await?;

        tracing::info!("serving clients on {}", self.client_addr);
        serve(self.config, self.clients, control).await
    }

    /// Starts the proxy in the background.
    ///
    /// Returns a handle that can be used to stop it.
    pub fn start(self) -> ProxyHandle {
        let (shutdown_tx, mut shutdown_rx) = broadcast::channel::<()>(1);
        let client_addr = self.client_addr;
        let control_addr = self.control_addr;

        let handle = tokio::spawn(async move {
            tokio::select! {
                result = self.run() => {
                    if let Err(e) = result {
                        tracing::error!("proxy error: {}", e);
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("proxy shutdown signal received");
                }
            }
        });

        ProxyHandle {
            shutdown_tx,
            client_addr,
            control_addr,
            handle,
        }
    }
}

/// The accept loop: apply control commands, hand accepted clients to
/// workers with a snapshot of the store as it was at that moment.
async fn serve(config: ProxyConfig, clients: TcpListener, mut control: ControlChannel) -> Result<()> {
    let mut store = PolicyStore::with_limits(config.policy_capacity, config.max_word_len);
    let config = Arc::new(config);
    let mut control_open = true;

    loop {
        tokio::select! {
            command = control.recv(), if control_open => match command {
                Some(command) => apply_command(&mut store, command),
                None => {
                    control_open = false;
                    tracing::info!(
                        "control channel closed, denylist frozen with {} words",
                        store.len()
                    );
                }
            },
            accepted = clients.accept() => match accepted {
                Ok((client, peer)) => {
                    spawn_worker(client, peer, store.snapshot(), Arc::clone(&config));
                }
                Err(e) => tracing::warn!("client accept failed: {}", e),
            },
        }
    }
}

fn spawn_worker(
    client: TcpStream,
    peer: SocketAddr,
    snapshot: PolicySnapshot,
    config: Arc<ProxyConfig>,
) {
    tracing::debug!("accepted client connection from {}", peer);
    tokio::spawn(async move {
        if let Err(e) = worker::handle_client(client, snapshot, config).await {
            tracing::debug!("connection from {} ended: {}", peer, e);
        }
    });
}

/// Handle for controlling a running proxy server.
pub struct ProxyHandle {
    shutdown_tx: broadcast::Sender<()>,
    client_addr: SocketAddr,
    control_addr: SocketAddr,
    handle: tokio::task::JoinHandle<()>,
}

impl ProxyHandle {
    /// The address browser clients connect to.
    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// The address the operator control connection uses.
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Signals the proxy to shut down.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Waits for the proxy to finish.
    pub async fn wait(self) {
        let _ = self.handle.await;
    }

    /// Shuts down the proxy and waits for it to finish.
    pub async fn stop(self) {
        self.shutdown();
        self.wait().await;
    }
}
