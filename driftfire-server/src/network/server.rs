//! WebSocket Relay Server
//!
//! Async WebSocket server for multiplayer connections.
//! Each connection gets one handler task plus one writer task; all shared
//! state lives in the [`SessionRegistry`].
//!
//! Sessions whose TCP connection dies without a close frame or socket error
//! stay registered until the socket reports the failure. There is no
//! heartbeat reaping.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, OwnedSemaphorePermit, Semaphore};
use tokio::time::interval;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug, instrument};

use crate::core::spawn::{SpawnSphere, DEFAULT_SPAWN_RADIUS};
use crate::core::vec3::Transform;
use crate::network::protocol::{ClientMessage, ServerMessage, SessionId};
use crate::network::registry::{RegistryConfig, SessionRegistry, DEFAULT_MAX_LABEL_LEN};

/// Default listen port.
pub const DEFAULT_PORT: u16 = 3001;

/// How long a client gets to finish the WebSocket upgrade.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections, counting ones still handshaking.
    pub max_connections: usize,
    /// How often the online count is logged.
    pub stats_interval: Duration,
    /// Radius of the spawn sphere for new sessions.
    pub spawn_radius: f32,
    /// Labels longer than this are truncated.
    pub max_label_len: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), DEFAULT_PORT),
            max_connections: 1000,
            stats_interval: Duration::from_secs(30),
            spawn_radius: DEFAULT_SPAWN_RADIUS,
            max_label_len: DEFAULT_MAX_LABEL_LEN,
        }
    }
}

impl ServerConfig {
    /// Create config from environment variables.
    ///
    /// `WS_PORT` takes precedence over `PORT`; `BIND_HOST` sets the
    /// interface. Anything unset keeps its default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let lookup = |key: &str| std::env::var(key).ok();
        Self::from_lookup(lookup)
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let port = ["WS_PORT", "PORT"]
            .iter()
            .find_map(|var| lookup(var).map(|value| (*var, value)));
        if let Some((var, value)) = port {
            let port = value.trim().parse::<u16>().map_err(|_| ConfigError::InvalidPort {
                var: var.to_string(),
                value: value.clone(),
            })?;
            config.bind_addr.set_port(port);
        }

        if let Some(host) = lookup("BIND_HOST") {
            let ip = host
                .trim()
                .parse::<IpAddr>()
                .map_err(|_| ConfigError::InvalidAddress(host.clone()))?;
            config.bind_addr.set_ip(ip);
        }

        Ok(config)
    }

    fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            spawn: SpawnSphere::new(self.spawn_radius),
            max_label_len: self.max_label_len,
        }
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Port variable is not a valid port number.
    #[error("{var}={value:?} is not a valid port")]
    InvalidPort {
        /// Variable name.
        var: String,
        /// Offending value.
        value: String,
    },

    /// Bind host is not an IP address.
    #[error("Invalid bind address: {0}")]
    InvalidAddress(String),
}

/// Relay server errors.
#[derive(Debug, thiserror::Error)]
pub enum RelayServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),
}

/// The relay server.
pub struct RelayServer {
    /// Server configuration.
    config: ServerConfig,
    /// Bound listener.
    listener: TcpListener,
    /// Live sessions.
    registry: Arc<SessionRegistry>,
    /// One permit per accepted socket, held until its task ends.
    connection_slots: Arc<Semaphore>,
    /// Shutdown signal.
    shutdown_tx: broadcast::Sender<()>,
}

impl RelayServer {
    /// Bind the listen socket. Use port 0 to let the OS pick one.
    pub async fn bind(config: ServerConfig) -> Result<Self, RelayServerError> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let (shutdown_tx, _) = broadcast::channel(1);
        let registry = Arc::new(SessionRegistry::new(config.registry_config()));
        let connection_slots = Arc::new(Semaphore::new(config.max_connections.min(Semaphore::MAX_PERMITS)));

        Ok(Self {
            config,
            listener,
            registry,
            connection_slots,
            shutdown_tx,
        })
    }

    /// Address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr, RelayServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Shared handle to the session registry.
    pub fn registry(&self) -> Arc<SessionRegistry> {
        self.registry.clone()
    }

    /// Run the accept loop until [`RelayServer::shutdown`] is called.
    #[instrument(skip(self))]
    pub async fn run(&self) -> Result<(), RelayServerError> {
        info!("Relay server listening on {}", self.local_addr()?);

        let stats_registry = self.registry.clone();
        let stats_interval = self.config.stats_interval;
        let stats_handle = tokio::spawn(async move {
            Self::run_stats_loop(stats_registry, stats_interval).await;
        });

        let mut shutdown_rx = self.shutdown_tx.subscribe();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            let Ok(permit) = self.connection_slots.clone().try_acquire_owned() else {
                                warn!(
                                    "Connection limit of {} reached, rejecting {}",
                                    self.config.max_connections, addr
                                );
                                continue;
                            };

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr, permit);
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        stats_handle.abort();
        Ok(())
    }

    /// Handle a new WebSocket connection. `permit` is released when the
    /// connection task ends.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, permit: OwnedSemaphorePermit) {
        let registry = self.registry.clone();
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let _permit = permit;

            let ws_stream = match tokio::time::timeout(HANDSHAKE_TIMEOUT, accept_async(stream)).await {
                Ok(Ok(ws)) => ws,
                Ok(Err(e)) => {
                    error!("WebSocket handshake failed for {}: {}", addr, e);
                    return;
                }
                Err(_) => {
                    warn!("WebSocket handshake timed out for {}", addr);
                    return;
                }
            };

            let (mut ws_sender, mut ws_receiver) = ws_stream.split();
            let (msg_tx, mut msg_rx) = mpsc::unbounded_channel::<ServerMessage>();

            // Spawn message sender task
            let sender_task = tokio::spawn(async move {
                while let Some(msg) = msg_rx.recv().await {
                    let text = match msg.to_json() {
                        Ok(t) => t,
                        Err(e) => {
                            error!("Failed to serialize message: {}", e);
                            continue;
                        }
                    };
                    if ws_sender.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                let _ = ws_sender.close().await;
            });

            let id = registry.connect(msg_tx).await;
            debug!("Connection {} is session {}", addr, id);

            // Handle incoming messages
            loop {
                tokio::select! {
                    msg = ws_receiver.next() => {
                        match msg {
                            Some(Ok(Message::Text(text))) => {
                                let client_msg = match ClientMessage::from_json(&text) {
                                    Ok(m) => m,
                                    Err(e) => {
                                        debug!("Invalid message from {}: {}", id, e);
                                        continue;
                                    }
                                };
                                Self::handle_client_message(&registry, &id, client_msg).await;
                            }
                            Some(Ok(Message::Binary(data))) => {
                                debug!("Ignoring {}-byte binary frame from {}", data.len(), id);
                            }
                            Some(Ok(Message::Close(_))) | None => {
                                debug!("Client {} disconnected", id);
                                break;
                            }
                            Some(Err(e)) => {
                                warn!("WebSocket error for {}: {}", id, e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    _ = shutdown_rx.recv() => {
                        break;
                    }
                }
            }

            // Removing the session drops the registry's outbox clone, which
            // lets the writer drain and close the socket.
            registry.disconnect(&id).await;
            if tokio::time::timeout(Duration::from_secs(1), sender_task).await.is_err() {
                debug!("Writer for {} did not finish in time", id);
            }
        });
    }

    /// Apply one client message to the registry.
    async fn handle_client_message(registry: &SessionRegistry, id: &SessionId, msg: ClientMessage) {
        match msg {
            ClientMessage::TransformUpdate { position, rotation, roll } => {
                registry.update(id, Transform { position, rotation, roll }).await;
            }
            ClientMessage::ShotFired { position, direction } => {
                registry.shoot(id, position, direction).await;
            }
            ClientMessage::DamageDealt { victim_id, amount } => {
                registry.damage(id, victim_id, amount).await;
            }
            ClientMessage::LabelChanged { new_label } => {
                registry.relabel(id, &new_label).await;
            }
        }
    }

    /// Periodically log how many sessions are online.
    async fn run_stats_loop(registry: Arc<SessionRegistry>, period: Duration) {
        let mut interval = interval(period.max(Duration::from_secs(1)));
        // The first tick fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            info!("Online sessions: {}", registry.len().await);
        }
    }

    /// Trigger server shutdown.
    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());
    }

    /// Get active connection count.
    pub async fn connection_count(&self) -> usize {
        self.registry.len().await
    }
}
