//! The receiving end of the pipeline.
//!
//! Workers only check that a unit is a region; the accumulation happens in
//! the pool's bookkeeping step, which is the single place that mutates the
//! [`ResultStore`].

use std::path::PathBuf;

use tokio::sync::oneshot;
use tracing::warn;

use crate::pool::{PoolError, PoolHandle, Stage, StageError, StageWorker};
use crate::roi::{Payload, Roi, WorkUnit};
use crate::store::{ResultStore, ResultsEntry};

/// Requests served by the consolidation pool loop.
#[derive(Debug)]
pub enum ConsolidationCommand {
    /// Creates the entry for a source and answers with its identity.
    Register {
        source_path: PathBuf,
        reply: oneshot::Sender<String>,
    },
    /// Removes and returns one entry.
    Take {
        key: String,
        reply: oneshot::Sender<Option<ResultsEntry>>,
    },
    /// Returns an entry that was taken but not consumed.
    Restore { entry: ResultsEntry },
    /// Lists the identities currently held.
    Keys { reply: oneshot::Sender<Vec<String>> },
    /// Counts the ROI collected so far.
    Collected { reply: oneshot::Sender<usize> },
}

#[derive(Debug, Default)]
pub struct ConsolidationStage {
    store: ResultStore,
}

impl ConsolidationStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self) -> &ResultStore {
        &self.store
    }

    pub fn into_store(self) -> ResultStore {
        self.store
    }
}

impl Stage for ConsolidationStage {
    type Worker = ConsolidationWorker;
    type Command = ConsolidationCommand;

    fn worker(&self, _index: usize) -> ConsolidationWorker {
        ConsolidationWorker
    }

    fn on_completed(&mut self, unit: WorkUnit) -> Option<WorkUnit> {
        if let Ok(roi) = Roi::try_from(unit.clone()) {
            self.store.append(roi);
        }
        Some(unit)
    }

    fn on_command(&mut self, command: ConsolidationCommand) {
        // A dropped receiver means the caller gave up waiting
        match command {
            ConsolidationCommand::Register { source_path, reply } => {
                let _ = reply.send(self.store.register(source_path));
            }
            ConsolidationCommand::Take { key, reply } => {
                let _ = reply.send(self.store.take(&key));
            }
            ConsolidationCommand::Restore { entry } => self.store.restore(entry),
            ConsolidationCommand::Keys { reply } => {
                let _ = reply.send(self.store.keys());
            }
            ConsolidationCommand::Collected { reply } => {
                let _ = reply.send(self.store.roi_count());
            }
        }
    }
}

pub struct ConsolidationWorker;

impl StageWorker for ConsolidationWorker {
    fn process(&mut self, unit: WorkUnit) -> Result<Vec<WorkUnit>, StageError> {
        match unit.payload {
            Payload::Region(_) => Ok(vec![unit]),
            _ => {
                warn!(metadata = %unit.metadata, "Consolidation received a non-region unit");
                Err(StageError::UnexpectedPayload { expected: "region" })
            }
        }
    }
}

impl PoolHandle<ConsolidationStage> {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> ConsolidationCommand) -> Result<T, PoolError> {
        let (reply, answer) = oneshot::channel();
        self.command(build(reply))?;
        answer.await.map_err(|_| PoolError::Stopped {
            pool: self.name().to_string(),
        })
    }

    /// Registers a source and returns its identity.
    pub async fn register(&self, source_path: impl Into<PathBuf>) -> Result<String, PoolError> {
        let source_path = source_path.into();
        self.request(|reply| ConsolidationCommand::Register { source_path, reply })
            .await
    }

    /// Pops the entry for `key`.
    pub async fn take(&self, key: impl Into<String>) -> Result<Option<ResultsEntry>, PoolError> {
        let key = key.into();
        self.request(|reply| ConsolidationCommand::Take { key, reply }).await
    }

    /// Hands a taken entry back to the store.
    pub fn restore(&self, entry: ResultsEntry) -> Result<(), PoolError> {
        self.command(ConsolidationCommand::Restore { entry })
    }

    pub async fn keys(&self) -> Result<Vec<String>, PoolError> {
        self.request(|reply| ConsolidationCommand::Keys { reply }).await
    }

    /// Number of ROI accumulated across all sources.
    pub async fn collected(&self) -> Result<usize, PoolError> {
        self.request(|reply| ConsolidationCommand::Collected { reply }).await
    }
}
