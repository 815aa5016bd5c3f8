//! TCP endpoint exposing local pools, and references to remote ones.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::codec::{Framed, FramedWrite};
use tracing::{debug, error, info, warn};

use super::wire::{line_codec, Frame, WireMessage, MAX_FRAME_LEN};
use super::Address;
use crate::error::RoiMillError;
use crate::pool::{Mailbox, PoolMessage, PoolRef};

type Registry = Arc<Mutex<HashMap<String, PoolRef>>>;

/// Listens for resolution requests and deliveries addressed to the pools
/// registered on it.
pub struct RemoteEndpoint {
    system: String,
    host: String,
    local_addr: SocketAddr,
    registry: Registry,
    task: JoinHandle<()>,
}

impl RemoteEndpoint {
    /// Binds the endpoint. Port `0` picks a free port.
    pub async fn bind(system: impl Into<String>, host: impl Into<String>, port: u16) -> Result<Self, RoiMillError> {
        Self::bind_with_limit(system, host, port, MAX_FRAME_LEN).await
    }

    /// Binds the endpoint, dropping any connection that sends a frame longer
    /// than `max_frame_len` bytes.
    pub async fn bind_with_limit(
        system: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        max_frame_len: usize,
    ) -> Result<Self, RoiMillError> {
        let system = system.into();
        let host = host.into();
        let listener = TcpListener::bind((host.as_str(), port)).await?;
        let local_addr = listener.local_addr()?;
        let registry: Registry = Arc::default();

        info!(system = %system, addr = %local_addr, "Remote endpoint listening");
        let task = tokio::spawn(accept_loop(
            listener,
            system.clone(),
            host.clone(),
            registry.clone(),
            max_frame_len,
        ));

        Ok(Self {
            system,
            host,
            local_addr,
            registry,
            task,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// The address a pool named `pool` has on this endpoint.
    pub fn address_of(&self, pool: &str) -> Address {
        Address::new(&self.system, &self.host, self.local_addr.port(), pool)
    }

    /// Exposes `pool` under its name and returns a reference carrying the
    /// resulting address.
    pub fn register(&self, pool: &PoolRef) -> PoolRef {
        let address = self.address_of(pool.name());
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pool.name().to_string(), pool.clone());
        info!(address = %address, "Registered pool");
        pool.clone().with_address(address)
    }

    /// Stops accepting connections.
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for RemoteEndpoint {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn accept_loop(listener: TcpListener, system: String, host: String, registry: Registry, max_frame_len: usize) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                debug!(peer = %peer, "Accepted connection");
                let port = listener.local_addr().map(|a| a.port()).unwrap_or_default();
                let context = Connection {
                    system: system.clone(),
                    host: host.clone(),
                    port,
                    registry: registry.clone(),
                    max_frame_len,
                };
                tokio::spawn(context.serve(stream));
            }
            Err(err) => warn!(error = %err, "Failed to accept connection"),
        }
    }
}

struct Connection {
    system: String,
    host: String,
    port: u16,
    registry: Registry,
    max_frame_len: usize,
}

impl Connection {
    fn lookup(&self, pool: &str) -> Option<PoolRef> {
        self.registry
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(pool)
            .cloned()
    }

    async fn serve(self, stream: TcpStream) {
        let mut framed = Framed::new(stream, line_codec(self.max_frame_len));
        while let Some(line) = framed.next().await {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    warn!(error = %err, "Dropping connection on unreadable frame");
                    break;
                }
            };
            let frame = match Frame::decode(&line) {
                Ok(frame) => frame,
                Err(err) => {
                    warn!(error = %err, "Ignoring malformed frame");
                    continue;
                }
            };
            match frame {
                Frame::Resolve { system, pool } => {
                    let reply = if system == self.system && self.lookup(&pool).is_some() {
                        Frame::Resolved {
                            address: Address::new(system, &self.host, self.port, pool),
                        }
                    } else {
                        Frame::NotFound { system, pool }
                    };
                    let sent = match reply.encode() {
                        Ok(text) => framed.send(text).await.map_err(|e| e.to_string()),
                        Err(err) => Err(err.to_string()),
                    };
                    if let Err(err) = sent {
                        warn!(error = %err, "Failed to answer resolve request");
                        break;
                    }
                }
                Frame::Deliver { pool, message } => self.deliver(&pool, message),
                other => warn!(frame = ?other, "Unexpected frame"),
            }
        }
    }

    fn deliver(&self, pool: &str, message: WireMessage) {
        let Some(target) = self.lookup(pool) else {
            warn!(pool, "Delivery for unknown pool");
            return;
        };
        let message = match message {
            WireMessage::Link { address } => PoolMessage::Link(connect(address)),
            WireMessage::Work { unit } => PoolMessage::Work(unit),
            WireMessage::Result { unit } => PoolMessage::external(unit),
            WireMessage::Shutdown => PoolMessage::Shutdown,
        };
        if let Err(err) = target.tell(message) {
            warn!(pool, error = %err, "Delivery failed");
        }
    }
}

struct RemoteMailbox(mpsc::UnboundedSender<PoolMessage>);

impl Mailbox for RemoteMailbox {
    fn deliver(&self, message: PoolMessage) -> Result<(), PoolMessage> {
        self.0.send(message).map_err(|e| e.0)
    }
}

/// Returns a reference to the pool at `address`.
///
/// The connection is opened in the background; if it cannot be opened or
/// breaks, the reference behaves like a stopped pool.
pub fn connect(address: Address) -> PoolRef {
    let (tx, rx) = mpsc::unbounded_channel();
    let pool = PoolRef::new(address.pool.as_str(), Arc::new(RemoteMailbox(tx))).with_address(address.clone());
    tokio::spawn(write_loop(address, rx));
    pool
}

async fn write_loop(address: Address, mut outbox: mpsc::UnboundedReceiver<PoolMessage>) {
    let stream = match TcpStream::connect(address.socket_addr()).await {
        Ok(stream) => stream,
        Err(err) => {
            error!(address = %address, error = %err, "Cannot connect to remote pool");
            return;
        }
    };
    let mut framed = FramedWrite::new(stream, line_codec(MAX_FRAME_LEN));
    while let Some(message) = outbox.recv().await {
        let message = match WireMessage::from_message(message) {
            Ok(message) => message,
            Err(err) => {
                warn!(address = %address, error = %err, "Message cannot cross the wire");
                continue;
            }
        };
        let frame = Frame::Deliver {
            pool: address.pool.clone(),
            message,
        };
        let line = match frame.encode() {
            Ok(line) if line.len() > MAX_FRAME_LEN => {
                warn!(address = %address, len = line.len(), "Frame too long for the wire, dropping it");
                continue;
            }
            Ok(line) => line,
            Err(err) => {
                warn!(address = %address, error = %err, "Failed to encode frame");
                continue;
            }
        };
        if let Err(err) = framed.send(line).await {
            error!(address = %address, error = %err, "Connection to remote pool lost");
            return;
        }
    }
}
