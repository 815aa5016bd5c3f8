//! Bounded-wait lookup of remote pools.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use super::endpoint::connect;
use super::wire::{line_codec, Frame, MAX_FRAME_LEN};
use super::Address;
use crate::pool::{PoolMessage, PoolRef};

/// Default bound on a single resolution.
pub const DEFAULT_RESOLVE_TIMEOUT: Duration = Duration::from_millis(5000);

const CONNECT_RETRY_INTERVAL: Duration = Duration::from_millis(200);

/// Looks up pool references at remote addresses.
///
/// A lookup either yields a reference or nothing. Timeouts and explicit
/// "not found" answers are both reported as `None`.
#[derive(Clone, Debug)]
pub struct RemoteEndpointResolver {
    timeout: Duration,
}

impl Default for RemoteEndpointResolver {
    fn default() -> Self {
        Self::new(DEFAULT_RESOLVE_TIMEOUT)
    }
}

impl RemoteEndpointResolver {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolves `address`, waiting at most the configured timeout.
    ///
    /// Refused connections are retried until the deadline, so with nothing
    /// listening this returns only once the full timeout has elapsed.
    pub async fn resolve(&self, address: &Address) -> Option<PoolRef> {
        match tokio::time::timeout(self.timeout, lookup(address)).await {
            Ok(Some(pool)) => {
                info!(address = %address, "Resolved remote pool");
                Some(pool)
            }
            Ok(None) => {
                warn!(address = %address, "Remote pool not found");
                None
            }
            Err(_) => {
                warn!(address = %address, timeout_ms = self.timeout.as_millis() as u64, "Timed out resolving remote pool");
                None
            }
        }
    }
}

async fn lookup(address: &Address) -> Option<PoolRef> {
    let stream = loop {
        match TcpStream::connect(address.socket_addr()).await {
            Ok(stream) => break stream,
            Err(err) => {
                debug!(address = %address, error = %err, "Endpoint not reachable yet");
                tokio::time::sleep(CONNECT_RETRY_INTERVAL).await;
            }
        }
    };

    let mut framed = Framed::new(stream, line_codec(MAX_FRAME_LEN));
    let request = Frame::Resolve {
        system: address.system.clone(),
        pool: address.pool.clone(),
    };
    let line = request.encode().ok()?;
    if let Err(err) = framed.send(line).await {
        warn!(address = %address, error = %err, "Failed to send resolve request");
        return None;
    }

    match framed.next().await {
        Some(Ok(line)) => match Frame::decode(&line) {
            Ok(Frame::Resolved { address }) => Some(connect(address)),
            Ok(Frame::NotFound { .. }) => None,
            Ok(other) => {
                warn!(frame = ?other, "Unexpected answer to resolve request");
                None
            }
            Err(err) => {
                warn!(error = %err, "Malformed answer to resolve request");
                None
            }
        },
        Some(Err(err)) => {
            warn!(error = %err, "Failed to read resolve answer");
            None
        }
        None => None,
    }
}

/// Resolves `address` on its own task and, when found, delivers it to
/// `pool` as a `Link` message.
///
/// The returned handle yields whether the link was sent.
pub fn link_when_resolved(pool: PoolRef, resolver: RemoteEndpointResolver, address: Address) -> JoinHandle<bool> {
    tokio::spawn(async move {
        let Some(target) = resolver.resolve(&address).await else {
            return false;
        };
        match pool.tell(PoolMessage::Link(target)) {
            Ok(()) => true,
            Err(err) => {
                warn!(pool = %pool.name(), error = %err, "Resolved link arrived after the pool stopped");
                false
            }
        }
    })
}
