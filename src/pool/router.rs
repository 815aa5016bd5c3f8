//! Load balancing across a pool's workers.

use tokio::sync::mpsc::{self, error::SendError};

/// Picks the routee for the next item.
pub trait RoutingStrategy: Send + 'static {
    /// Returns an index in `0..routees`. Only called with `routees > 0`.
    fn select(&mut self, routees: usize) -> usize;
}

/// Cycles through routees in order.
#[derive(Debug, Default)]
pub struct RoundRobin {
    next: usize,
}

impl RoutingStrategy for RoundRobin {
    fn select(&mut self, routees: usize) -> usize {
        let idx = self.next % routees;
        self.next = self.next.wrapping_add(1);
        idx
    }
}

/// Dispatches items to worker queues.
///
/// A routee whose queue is closed is dropped from the set and the item is
/// offered to the next one.
pub struct Router<T> {
    routees: Vec<mpsc::UnboundedSender<T>>,
    strategy: Box<dyn RoutingStrategy>,
}

impl<T> Router<T> {
    pub fn new(routees: Vec<mpsc::UnboundedSender<T>>, strategy: Box<dyn RoutingStrategy>) -> Self {
        Self { routees, strategy }
    }

    /// Sends `item` to a live routee, or hands it back if none is left.
    pub fn route(&mut self, mut item: T) -> Result<(), T> {
        while !self.routees.is_empty() {
            let idx = self.strategy.select(self.routees.len());
            match self.routees[idx].send(item) {
                Ok(()) => return Ok(()),
                Err(SendError(back)) => {
                    self.routees.remove(idx);
                    item = back;
                }
            }
        }
        Err(item)
    }

    /// Closes every worker queue. Queued items are still delivered.
    pub fn close(&mut self) {
        self.routees.clear();
    }
}

#[cfg(test)]
impl<T> Router<T> {
    fn round_robin(routees: Vec<mpsc::UnboundedSender<T>>) -> Self {
        Self::new(routees, Box::<RoundRobin>::default())
    }

    fn len(&self) -> usize {
        self.routees.len()
    }
}
