//! Pools in other processes.
//!
//! Each process that hosts pools for others binds a [`RemoteEndpoint`] and
//! registers those pools on it. Peers find them with a
//! [`RemoteEndpointResolver`] and talk to them through ordinary
//! [`PoolRef`](crate::pool::PoolRef)s whose mailbox writes
//! newline-delimited JSON [`Frame`]s to a TCP stream.

mod address;
mod endpoint;
mod resolver;
mod wire;

pub use address::{Address, AddressError, PROTOCOL};
pub use endpoint::{connect, RemoteEndpoint};
pub use resolver::{link_when_resolved, RemoteEndpointResolver, DEFAULT_RESOLVE_TIMEOUT};
pub use wire::{Frame, WireMessage, MAX_FRAME_LEN};
