//! The client side: feeds sources to a remote mill and collects its ROI.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Config;
use crate::error::RoiMillError;
use crate::output::{ResultWriter, WriteReport};
use crate::pool::{spawn_pool, PoolError, PoolHandle, PoolMessage};
use crate::remote::{RemoteEndpoint, RemoteEndpointResolver};
use crate::roi::{Metadata, WorkUnit, SOURCE_KEY};
use crate::stages::{ConsolidationStage, IngestStage, INGESTOR_POOL, RECEIVER_POOL};

/// Ingestor and receiver pools bound to a remote mill.
pub struct Feeder {
    ingestor: PoolHandle<IngestStage>,
    receiver: PoolHandle<ConsolidationStage>,
    endpoint: RemoteEndpoint,
    degraded: bool,
}

impl Feeder {
    /// Resolves the remote sink and source and starts the local pools.
    ///
    /// An unreachable sink is fatal and nothing is started. An unreachable
    /// source only means no results will come back.
    pub async fn connect(config: &Config) -> Result<Self, RoiMillError> {
        let resolver = RemoteEndpointResolver::new(config.resolver.timeout());

        let sink_address = config.ingestor.sink.address()?;
        let source_address = config.receiver.source.address()?;
        let Some(sink) = resolver.resolve(&sink_address).await else {
            return Err(RoiMillError::SinkUnavailable {
                address: sink_address.to_string(),
            });
        };

        let ingestor = spawn_pool(INGESTOR_POOL, config.ingestor.number, IngestStage::detached())?;
        let receiver = spawn_pool(RECEIVER_POOL, config.receiver.number, ConsolidationStage::new())?;
        ingestor.tell(PoolMessage::Link(sink))?;

        let endpoint = RemoteEndpoint::bind(
            &config.endpoint.system,
            &config.endpoint.hostname,
            config.endpoint.port,
        )
        .await?;
        let receiver_ref = endpoint.register(&receiver.pool_ref());

        let degraded = match resolver.resolve(&source_address).await {
            Some(source) => {
                source.tell(PoolMessage::Link(receiver_ref))?;
                false
            }
            None => {
                warn!(
                    address = %source_address,
                    "Unable to find remote system source, results will not be reported"
                );
                true
            }
        };

        info!(sink = %sink_address, degraded, "Feeder connected");
        Ok(Self {
            ingestor,
            receiver,
            endpoint,
            degraded,
        })
    }

    /// True when the source could not be resolved.
    pub fn is_degraded(&self) -> bool {
        self.degraded
    }

    pub fn endpoint(&self) -> &RemoteEndpoint {
        &self.endpoint
    }

    /// Registers `path` with the receiver and submits it for processing.
    pub async fn ingest(&self, path: &Path) -> Result<String, RoiMillError> {
        let identity = self.receiver.register(path).await?;
        let metadata = Metadata::new().with_tag(SOURCE_KEY, identity.as_str())?;
        self.ingestor.tell(PoolMessage::Work(WorkUnit::ingestion(path, metadata)))?;
        info!(path = %path.display(), source = %identity, "Submitted source");
        Ok(identity)
    }

    /// Number of ROI received from the mill so far.
    pub async fn collected(&self) -> Result<usize, PoolError> {
        self.receiver.collected().await
    }

    /// Pops every entry collected so far and writes it out.
    ///
    /// Entries that fail to write go back to the receiver.
    pub async fn write_results(&self, writer: &ResultWriter) -> Result<Vec<PathBuf>, RoiMillError> {
        let mut report = WriteReport::default();
        for key in self.receiver.keys().await? {
            let Some(entry) = self.receiver.take(key).await? else { continue };
            if let Err(entry) = report.record(writer, entry) {
                self.receiver.restore(entry)?;
            }
        }
        report.finish()
    }

    /// Drains the ingestor and stops the receiver. The remote mill is left
    /// running.
    pub async fn close(self) -> Result<(), PoolError> {
        self.ingestor.tell(PoolMessage::Shutdown)?;
        self.ingestor.join().await?;
        self.endpoint.shutdown();
        self.receiver.tell(PoolMessage::Shutdown)?;
        self.receiver.join().await?;
        Ok(())
    }
}
