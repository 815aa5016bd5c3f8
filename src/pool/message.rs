//! Messages understood by every pool.

use super::PoolRef;
use crate::roi::WorkUnit;

/// Where a [`PoolMessage::Result`] came from, relative to the receiving pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    /// Produced by one of the receiving pool's own workers.
    Internal,
    /// Produced anywhere else, typically an upstream pool.
    External,
}

/// The pool protocol.
///
/// Control messages travel on the same ordered channel as work, so a
/// `Shutdown` sent after a unit is always handled after that unit.
#[derive(Clone, Debug)]
pub enum PoolMessage {
    /// Sets or replaces the downstream pool.
    Link(PoolRef),
    /// A unit to be processed by this pool's workers.
    Work(WorkUnit),
    /// A finished unit. Internal results are forwarded downstream, external
    /// ones are processed here first.
    Result { unit: WorkUnit, origin: Origin },
    /// Drain the workers, then propagate downstream.
    Shutdown,
}

impl PoolMessage {
    /// A result arriving from outside the receiving pool.
    pub fn external(unit: WorkUnit) -> Self {
        PoolMessage::Result {
            unit,
            origin: Origin::External,
        }
    }

    pub(crate) fn internal(unit: WorkUnit) -> Self {
        PoolMessage::Result {
            unit,
            origin: Origin::Internal,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            PoolMessage::Link(_) => "link",
            PoolMessage::Work(_) => "work",
            PoolMessage::Result { .. } => "result",
            PoolMessage::Shutdown => "shutdown",
        }
    }
}
