//! WebSocket Game Server
//!
//! Accept loop and per-connection tasks. Connection tasks are producers
//! only: they decode frames into hub events and write whatever the hub
//! queues for them. All session state lives in the hub.

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{accept_async, tungstenite::Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{debug, error, info, instrument, warn};

use crate::core::ids::ConnectionId;
use crate::hub::{Hub, HubConfig, HubEvent};
use crate::network::protocol::{ClientMessage, DecodeError, ServerMessage};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address.
    pub bind_addr: SocketAddr,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Per-connection outbound buffer. A full buffer drops the connection.
    pub outbound_buffer: usize,
    /// Capacity of the hub's inbound queue.
    pub inbound_queue: usize,
    /// Match rules and timers.
    pub hub: HubConfig,
    /// Server version string.
    pub version: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            max_connections: 1000,
            outbound_buffer: 64,
            inbound_queue: 256,
            hub: HubConfig::default(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Game server errors.
#[derive(Debug, thiserror::Error)]
pub enum GameServerError {
    /// Failed to bind to address.
    #[error("Failed to bind: {0}")]
    BindFailed(#[from] std::io::Error),

    /// WebSocket error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// Connection limit reached.
    #[error("Connection limit reached")]
    ConnectionLimitReached,

    /// The hub queue is closed.
    #[error("Hub is not running")]
    HubUnavailable,

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Decrements the live connection count when a connection task ends.
struct ConnectionSlot(Arc<AtomicUsize>);

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// The game server.
pub struct GameServer {
    /// Server configuration.
    config: ServerConfig,
    /// Live connection count.
    connections: Arc<AtomicUsize>,
    /// Transport handle allocator.
    next_connection: AtomicU64,
    /// Shutdown flag. Stays raised once set.
    shutdown_tx: watch::Sender<bool>,
}

impl GameServer {
    /// Create a new game server.
    pub fn new(config: ServerConfig) -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            config,
            connections: Arc::new(AtomicUsize::new(0)),
            next_connection: AtomicU64::new(1),
            shutdown_tx,
        }
    }

    /// Bind the configured address and run until shutdown.
    pub async fn run(&self) -> Result<(), GameServerError> {
        let listener = TcpListener::bind(&self.config.bind_addr).await?;
        self.serve(listener).await
    }

    /// Run on an already bound listener until shutdown.
    #[instrument(skip_all)]
    pub async fn serve(&self, listener: TcpListener) -> Result<(), GameServerError> {
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let (events, hub_handle) = Hub::spawn(self.config.hub.clone(), self.config.inbound_queue);

        info!(
            "Bid duel server v{} listening on {}",
            self.config.version,
            listener.local_addr()?
        );

        while !*shutdown_rx.borrow_and_update() {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((stream, addr)) => {
                            if self.connections.load(Ordering::SeqCst) >= self.config.max_connections {
                                warn!("{}, rejecting {}", GameServerError::ConnectionLimitReached, addr);
                                continue;
                            }

                            debug!("New connection from {}", addr);
                            self.handle_connection(stream, addr, events.clone());
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                        }
                    }
                }
                _ = shutdown_rx.changed() => {}
            }
        }
        info!("Shutdown signal received");

        let reason = "Server shutting down".to_string();
        if events.send(HubEvent::Shutdown { reason }).await.is_err() {
            return Err(GameServerError::HubUnavailable);
        }
        hub_handle.await.map_err(|e| GameServerError::Internal(e.to_string()))
    }

    /// Spawn the task serving one WebSocket connection.
    fn handle_connection(&self, stream: TcpStream, addr: SocketAddr, events: mpsc::Sender<HubEvent>) {
        let connection = ConnectionId(self.next_connection.fetch_add(1, Ordering::SeqCst));
        let outbound_buffer = self.config.outbound_buffer;

        self.connections.fetch_add(1, Ordering::SeqCst);
        let slot = ConnectionSlot(self.connections.clone());

        tokio::spawn(async move {
            let _slot = slot;
            match serve_connection(stream, connection, events, outbound_buffer).await {
                Ok(()) => debug!("Client {} ({}) cleaned up", connection, addr),
                Err(e) => warn!("Client {} ({}) closed with error: {}", connection, addr, e),
            }
        });
    }

    /// Stop accepting, notify every user and stop the hub.
    pub fn shutdown(&self) {
        self.shutdown_tx.send_replace(true);
    }

    /// Get active connection count.
    pub fn connection_count(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }

    /// Server configuration.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

async fn serve_connection(
    stream: TcpStream,
    connection: ConnectionId,
    events: mpsc::Sender<HubEvent>,
    outbound_buffer: usize,
) -> Result<(), GameServerError> {
    let ws_stream = accept_async(stream).await?;
    let (mut ws_sender, mut ws_receiver) = ws_stream.split();
    let (outbound, mut outbound_rx) = mpsc::channel::<ServerMessage>(outbound_buffer);

    events.send(HubEvent::Connected { connection, outbound })
        .await
        .map_err(|_| GameServerError::HubUnavailable)?;

    // Ends when the hub drops the sender: disconnect, eviction or shutdown
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            let text = match msg.to_json() {
                Ok(t) => t,
                Err(e) => {
                    error!("Failed to serialize message: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(text)).await.is_err() {
                return;
            }
        }
        let _ = ws_sender.close().await;
    });

    let result = loop {
        tokio::select! {
            msg = ws_receiver.next() => {
                let event = match msg {
                    Some(Ok(Message::Text(text))) => match ClientMessage::decode(&text) {
                        Ok(message) => HubEvent::Message { connection, message },
                        Err(DecodeError::UnknownType(kind)) => {
                            debug!("Unknown message type {:?} from {}", kind, connection);
                            continue;
                        }
                        Err(DecodeError::Malformed(reason)) => {
                            HubEvent::Malformed { connection, reason }
                        }
                    },
                    Some(Ok(Message::Binary(_))) => HubEvent::Malformed {
                        connection,
                        reason: "binary frame".to_string(),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Client {} disconnected", connection);
                        break Ok(());
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => break Err(GameServerError::from(e)),
                };

                if events.send(event).await.is_err() {
                    break Err(GameServerError::HubUnavailable);
                }
            }
            _ = &mut writer => {
                debug!("Outbound channel for {} closed", connection);
                break Ok(());
            }
        }
    };

    let _ = events.send(HubEvent::Disconnected { connection }).await;
    writer.abort();
    result
}
