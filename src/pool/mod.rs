//! Worker pools and the chaining protocol between them.
//!
//! A pool owns a fixed set of workers behind a [`Router`] and at most one
//! downstream link. Its processing loop handles [`PoolMessage`]s one at a
//! time:
//!
//! - `Work` and external `Result`s are routed to a worker.
//! - Internal `Result`s (a worker of this pool finished) go through the
//!   stage's bookkeeping and are forwarded downstream as external results,
//!   or dropped when the pool is unlinked.
//! - `Link` sets or replaces the downstream pool.
//! - `Shutdown` drains the workers, forwards `Shutdown` downstream and stops
//!   the loop.
//!
//! Workers run on the blocking thread pool and report completions back into
//! their own pool's mailbox, tagged [`Origin::Internal`].

mod message;
mod router;

pub use message::{Origin, PoolMessage};
pub use router::{RoundRobin, Router, RoutingStrategy};

use std::convert::Infallible;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::RoiMillError;
use crate::remote::Address;
use crate::roi::{MetadataError, WorkUnit};

/// Errors raised by the pool runtime.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("pool '{pool}' has stopped")]
    Stopped { pool: String },

    #[error("pool '{pool}' must be configured with at least one worker")]
    NoWorkers { pool: String },

    #[error("pool '{pool}' has no remote address and cannot be linked over the wire")]
    Unaddressable { pool: String },

    #[error("pool '{pool}' terminated abnormally: {message}")]
    Crashed { pool: String, message: String },
}

/// Errors raised by a worker while processing a single unit.
///
/// They are logged by the pool and never stop it.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("expected a {expected} payload")]
    UnexpectedPayload { expected: &'static str },

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Input(#[from] RoiMillError),
}

/// Lifecycle of a pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PoolState {
    Unlinked,
    Linked,
    Draining,
    Stopped,
}

/// Delivery endpoint behind a [`PoolRef`].
pub trait Mailbox: Send + Sync + 'static {
    /// Queues `message`, handing it back if the receiver is gone.
    fn deliver(&self, message: PoolMessage) -> Result<(), PoolMessage>;
}

/// A cloneable reference to a pool, local or remote.
#[derive(Clone)]
pub struct PoolRef {
    name: Arc<str>,
    address: Option<Address>,
    mailbox: Arc<dyn Mailbox>,
}

impl PoolRef {
    pub fn new(name: impl Into<Arc<str>>, mailbox: Arc<dyn Mailbox>) -> Self {
        Self {
            name: name.into(),
            address: None,
            mailbox,
        }
    }

    /// A reference backed by a plain channel, for pools implemented outside
    /// the pool runtime (and for observing a pool's output).
    pub fn channel(name: impl Into<Arc<str>>) -> (Self, mpsc::UnboundedReceiver<PoolMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(name, Arc::new(ChannelMailbox(tx))), rx)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The address under which the pool is reachable remotely, if any.
    pub fn address(&self) -> Option<&Address> {
        self.address.as_ref()
    }

    pub fn with_address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    /// Sends a message to the pool.
    pub fn tell(&self, message: PoolMessage) -> Result<(), PoolError> {
        self.mailbox.deliver(message).map_err(|_| PoolError::Stopped {
            pool: self.name.to_string(),
        })
    }
}

impl fmt::Debug for PoolRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolRef")
            .field("name", &self.name)
            .field("address", &self.address.as_ref().map(ToString::to_string))
            .finish()
    }
}

struct ChannelMailbox(mpsc::UnboundedSender<PoolMessage>);

impl Mailbox for ChannelMailbox {
    fn deliver(&self, message: PoolMessage) -> Result<(), PoolMessage> {
        self.0.send(message).map_err(|e| e.0)
    }
}

enum Mail {
    Message(PoolMessage),
    Retired(usize),
}

struct LocalMailbox(mpsc::UnboundedSender<Mail>);

impl Mailbox for LocalMailbox {
    fn deliver(&self, message: PoolMessage) -> Result<(), PoolMessage> {
        self.0.send(Mail::Message(message)).map_err(|e| match e.0 {
            Mail::Message(message) => message,
            Mail::Retired(_) => unreachable!("mailboxes only carry messages"),
        })
    }
}

/// Per-unit processing performed by one worker.
pub trait StageWorker: Send + 'static {
    /// Processes one unit and returns zero or more results.
    fn process(&mut self, unit: WorkUnit) -> Result<Vec<WorkUnit>, StageError>;
}

/// The stage-specific part of a pool.
pub trait Stage: Send + 'static {
    type Worker: StageWorker;
    /// Out-of-band requests served by the pool loop.
    type Command: Send + 'static;

    /// Creates worker number `index`.
    fn worker(&self, index: usize) -> Self::Worker;

    /// Bookkeeping on a unit completed by one of this pool's workers.
    ///
    /// Returning `None` ends the unit here instead of forwarding it.
    fn on_completed(&mut self, unit: WorkUnit) -> Option<WorkUnit> {
        Some(unit)
    }

    fn on_command(&mut self, command: Self::Command) {
        let _ = command;
    }

    /// Whether a drained pool passes `Shutdown` on to its downstream.
    fn propagates_shutdown(&self) -> bool {
        true
    }
}

/// Command type for stages that take none.
pub type NoCommand = Infallible;

/// Owner's handle on a running pool.
pub struct PoolHandle<S: Stage> {
    pool: PoolRef,
    commands: mpsc::UnboundedSender<S::Command>,
    state: watch::Receiver<PoolState>,
    task: JoinHandle<S>,
}

impl<S: Stage> PoolHandle<S> {
    pub fn pool_ref(&self) -> PoolRef {
        self.pool.clone()
    }

    pub fn name(&self) -> &str {
        self.pool.name()
    }

    pub fn tell(&self, message: PoolMessage) -> Result<(), PoolError> {
        self.pool.tell(message)
    }

    pub fn command(&self, command: S::Command) -> Result<(), PoolError> {
        self.commands.send(command).map_err(|_| PoolError::Stopped {
            pool: self.name().to_string(),
        })
    }

    pub fn state(&self) -> PoolState {
        *self.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<PoolState> {
        self.state.clone()
    }

    /// Waits for the loop to stop and returns the stage.
    pub async fn join(self) -> Result<S, PoolError> {
        let pool = self.pool.name().to_string();
        self.task.await.map_err(|e| PoolError::Crashed {
            pool,
            message: e.to_string(),
        })
    }
}

/// Starts a pool with `workers` workers running `stage`.
///
/// Must be called from within a tokio runtime.
pub fn spawn_pool<S: Stage>(name: impl Into<String>, workers: usize, stage: S) -> Result<PoolHandle<S>, PoolError> {
    spawn_pool_with(name, workers, stage, Box::<RoundRobin>::default())
}

/// Like [`spawn_pool`] with an explicit routing strategy.
pub fn spawn_pool_with<S: Stage>(
    name: impl Into<String>,
    workers: usize,
    stage: S,
    strategy: Box<dyn RoutingStrategy>,
) -> Result<PoolHandle<S>, PoolError> {
    let name = name.into();
    if workers == 0 {
        return Err(PoolError::NoWorkers { pool: name });
    }

    let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(PoolState::Unlinked);

    let mut routees = Vec::with_capacity(workers);
    for index in 0..workers {
        let (tx, rx) = mpsc::unbounded_channel();
        routees.push(tx);
        spawn_worker(&name, index, stage.worker(index), rx, inbox_tx.clone());
    }

    let pool = PoolRef::new(name.as_str(), Arc::new(LocalMailbox(inbox_tx)));
    let runtime = PoolLoop {
        name: name.clone(),
        stage,
        router: Router::new(routees, strategy),
        live_workers: workers,
        downstream: None,
        state: state_tx,
    };
    info!(pool = %name, workers, "Pool started");
    let task = tokio::spawn(runtime.run(inbox_rx, command_rx));

    Ok(PoolHandle {
        pool,
        commands: command_tx,
        state: state_rx,
        task,
    })
}

// Reports the worker's exit to its pool, including on panic.
struct RetireGuard {
    index: usize,
    inbox: mpsc::UnboundedSender<Mail>,
}

impl Drop for RetireGuard {
    fn drop(&mut self) {
        let _ = self.inbox.send(Mail::Retired(self.index));
    }
}

fn spawn_worker<W: StageWorker>(
    pool: &str,
    index: usize,
    mut worker: W,
    mut queue: mpsc::UnboundedReceiver<WorkUnit>,
    inbox: mpsc::UnboundedSender<Mail>,
) {
    let pool = pool.to_string();
    tokio::task::spawn_blocking(move || {
        let _guard = RetireGuard {
            index,
            inbox: inbox.clone(),
        };
        while let Some(unit) = queue.blocking_recv() {
            match worker.process(unit) {
                Ok(results) => {
                    for result in results {
                        if inbox.send(Mail::Message(PoolMessage::internal(result))).is_err() {
                            return;
                        }
                    }
                }
                Err(err) => error!(pool = %pool, worker = index, error = %err, "Worker failed on unit"),
            }
        }
    });
}

struct PoolLoop<S: Stage> {
    name: String,
    stage: S,
    router: Router<WorkUnit>,
    live_workers: usize,
    downstream: Option<PoolRef>,
    state: watch::Sender<PoolState>,
}

impl<S: Stage> PoolLoop<S> {
    async fn run(
        mut self,
        mut inbox: mpsc::UnboundedReceiver<Mail>,
        mut commands: mpsc::UnboundedReceiver<S::Command>,
    ) -> S {
        loop {
            tokio::select! {
                mail = inbox.recv() => match mail {
                    Some(Mail::Message(message)) => self.handle(message),
                    Some(Mail::Retired(index)) => self.retire(index),
                    None => break,
                },
                Some(command) = commands.recv() => self.stage.on_command(command),
            }
            if self.current() == PoolState::Stopped {
                break;
            }
        }
        self.state.send_replace(PoolState::Stopped);
        info!(pool = %self.name, "Pool stopped");
        self.stage
    }

    fn current(&self) -> PoolState {
        *self.state.borrow()
    }

    fn handle(&mut self, message: PoolMessage) {
        debug!(pool = %self.name, kind = message.kind(), "Handling message");
        match message {
            PoolMessage::Link(target) => {
                info!(pool = %self.name, downstream = %target.name(), "Linked");
                self.downstream = Some(target);
                if self.current() == PoolState::Unlinked {
                    self.state.send_replace(PoolState::Linked);
                }
            }
            PoolMessage::Work(unit)
            | PoolMessage::Result {
                unit,
                origin: Origin::External,
            } => self.dispatch(unit),
            PoolMessage::Result {
                unit,
                origin: Origin::Internal,
            } => {
                if let Some(unit) = self.stage.on_completed(unit) {
                    self.forward(unit);
                }
            }
            PoolMessage::Shutdown => self.drain(),
        }
    }

    fn dispatch(&mut self, unit: WorkUnit) {
        if self.current() == PoolState::Draining {
            warn!(pool = %self.name, "Dropping unit received while draining");
            return;
        }
        if self.router.route(unit).is_err() {
            error!(pool = %self.name, "No live workers, dropping unit");
        }
    }

    fn forward(&self, unit: WorkUnit) {
        match &self.downstream {
            Some(target) => {
                if let Err(err) = target.tell(PoolMessage::external(unit)) {
                    warn!(pool = %self.name, error = %err, "Failed to forward result");
                }
            }
            None => debug!(pool = %self.name, metadata = %unit.metadata, "Not linked, result is terminal"),
        }
    }

    fn drain(&mut self) {
        if self.current() == PoolState::Draining {
            return;
        }
        info!(pool = %self.name, "Draining");
        self.state.send_replace(PoolState::Draining);
        self.router.close();
        if self.live_workers == 0 {
            self.stop();
        }
    }

    fn retire(&mut self, index: usize) {
        self.live_workers = self.live_workers.saturating_sub(1);
        match self.current() {
            PoolState::Draining if self.live_workers == 0 => self.stop(),
            PoolState::Draining => {}
            _ => warn!(pool = %self.name, worker = index, "Worker exited unexpectedly"),
        }
    }

    fn stop(&mut self) {
        if !self.stage.propagates_shutdown() {
            debug!(pool = %self.name, "Leaving downstream running");
        } else if let Some(target) = &self.downstream {
            if let Err(err) = target.tell(PoolMessage::Shutdown) {
                debug!(pool = %self.name, error = %err, "Downstream already stopped");
            }
        }
        self.state.send_replace(PoolState::Stopped);
    }
}
