use crate::pool::{NoCommand, Stage, StageError, StageWorker};
use crate::roi::{read_dataset, Payload, WorkUnit};

/// Reads source files into datasets, keeping the ingestion metadata.
#[derive(Debug, Default)]
pub struct IngestStage {
    detached: bool,
}

impl IngestStage {
    pub fn new() -> Self {
        Self::default()
    }

    /// An ingestor feeding a pipeline it does not own: shutting it down
    /// finishes its own work but leaves the downstream running.
    pub fn detached() -> Self {
        Self { detached: true }
    }
}

impl Stage for IngestStage {
    type Worker = IngestWorker;
    type Command = NoCommand;

    fn worker(&self, _index: usize) -> IngestWorker {
        IngestWorker
    }

    fn propagates_shutdown(&self) -> bool {
        !self.detached
    }
}

pub struct IngestWorker;

impl StageWorker for IngestWorker {
    fn process(&mut self, unit: WorkUnit) -> Result<Vec<WorkUnit>, StageError> {
        let Payload::Source(path) = &unit.payload else {
            return Err(StageError::UnexpectedPayload { expected: "source" });
        };
        let dataset = read_dataset(path)?;
        tracing::debug!(
            path = %path.display(),
            width = dataset.width(),
            height = dataset.height(),
            "Ingested dataset"
        );
        Ok(vec![WorkUnit::new(Payload::Samples(dataset), unit.metadata)])
    }
}
