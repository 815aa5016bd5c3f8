//! All pools in one process.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::Config;
use crate::error::RoiMillError;
use crate::mill::Mill;
use crate::pool::{spawn_pool, PoolHandle, PoolMessage};
use crate::roi::{Metadata, WorkUnit, SOURCE_KEY};
use crate::stages::{ConsolidationStage, Detector, IngestStage, ThresholdDetector, INGESTOR_POOL, RECEIVER_POOL};
use crate::store::ResultStore;

/// `IngestorPool -> Mill -> ReceiverPool`, wired locally.
pub struct LocalPipeline {
    ingestor: PoolHandle<IngestStage>,
    mill: Mill,
    receiver: PoolHandle<ConsolidationStage>,
}

impl LocalPipeline {
    /// Loads the ROI bundle and starts every pool.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(config: &Config) -> Result<Self, RoiMillError> {
        let detector = ThresholdDetector::load(&config.roi.bundle)?;
        Self::with_detector(config, Arc::new(detector))
    }

    pub fn with_detector(config: &Config, detector: Arc<dyn Detector>) -> Result<Self, RoiMillError> {
        let receiver = spawn_pool(RECEIVER_POOL, config.receiver.number, ConsolidationStage::new())?;
        let mill = Mill::build(config, detector)?;
        let ingestor = spawn_pool(INGESTOR_POOL, config.ingestor.number, IngestStage::new())?;

        mill.link_tail(receiver.pool_ref())?;
        ingestor.tell(PoolMessage::Link(mill.head()))?;

        Ok(Self {
            ingestor,
            mill,
            receiver,
        })
    }

    /// Registers `path` with the receiver and submits it. Returns the
    /// source identity.
    pub async fn ingest(&self, path: &Path) -> Result<String, RoiMillError> {
        let identity = self.receiver.register(path).await?;
        let metadata = Metadata::new().with_tag(SOURCE_KEY, identity.as_str())?;
        self.ingestor.tell(PoolMessage::Work(WorkUnit::ingestion(path, metadata)))?;
        info!(path = %path.display(), source = %identity, "Submitted source");
        Ok(identity)
    }

    /// Shuts the chain down in pipeline order and returns the collected
    /// results once the receiver has drained.
    pub async fn finish(self) -> Result<ResultStore, RoiMillError> {
        self.ingestor.tell(PoolMessage::Shutdown)?;
        self.ingestor.join().await?;
        self.mill.join().await?;
        let stage = self.receiver.join().await?;
        Ok(stage.into_store())
    }
}
