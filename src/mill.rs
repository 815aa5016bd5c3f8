//! The detection side: pyramid, sliding window and finder pools.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::config::Config;
use crate::error::RoiMillError;
use crate::pool::{spawn_pool, PoolError, PoolHandle, PoolMessage, PoolRef, PoolState};
use crate::remote::RemoteEndpoint;
use crate::stages::{
    Detector, FinderStage, PyramidOperation, PyramidStage, SliderStage, SlidingWindow, ThresholdDetector,
    FINDER_POOL, PYRAMID_POOL, SLIDER_POOL,
};

/// The chain `PyramidPool -> SlidingWindowPool -> ROIFinderPool`.
pub struct Mill {
    pyramid: PoolHandle<PyramidStage>,
    slider: PoolHandle<SliderStage>,
    finder: PoolHandle<FinderStage>,
    endpoint: Option<RemoteEndpoint>,
}

impl Mill {
    /// Spawns and links the three pools. The finder stays unlinked until a
    /// consumer links itself.
    pub fn build(config: &Config, detector: Arc<dyn Detector>) -> Result<Self, RoiMillError> {
        let pyramid = spawn_pool(
            PYRAMID_POOL,
            config.pyramid.number,
            PyramidStage::new(PyramidOperation::new(
                config.pyramid.scalefactor,
                config.pyramid.windowsize,
            )),
        )?;
        let slider = spawn_pool(
            SLIDER_POOL,
            config.slider.number,
            SliderStage::new(SlidingWindow::new(
                config.slider.step,
                config.slider.window.width,
                config.slider.window.height,
            )),
        )?;
        let finder = spawn_pool(FINDER_POOL, config.roi.number, FinderStage::new(detector))?;

        pyramid.tell(PoolMessage::Link(slider.pool_ref()))?;
        slider.tell(PoolMessage::Link(finder.pool_ref()))?;

        Ok(Self {
            pyramid,
            slider,
            finder,
            endpoint: None,
        })
    }

    /// Loads the ROI bundle, builds the chain and exposes it on the
    /// configured endpoint.
    pub async fn start(config: &Config) -> Result<Self, RoiMillError> {
        let detector = ThresholdDetector::load(&config.roi.bundle)?;
        let mut mill = Self::build(config, Arc::new(detector))?;
        let endpoint = RemoteEndpoint::bind(
            &config.endpoint.system,
            &config.endpoint.hostname,
            config.endpoint.port,
        )
        .await?;
        mill.expose(endpoint);
        Ok(mill)
    }

    /// Registers every pool on `endpoint`.
    pub fn expose(&mut self, endpoint: RemoteEndpoint) {
        for pool in [self.pyramid.pool_ref(), self.slider.pool_ref(), self.finder.pool_ref()] {
            endpoint.register(&pool);
        }
        info!(addr = %endpoint.local_addr(), "Mill is accepting remote pools");
        self.endpoint = Some(endpoint);
    }

    pub fn endpoint(&self) -> Option<&RemoteEndpoint> {
        self.endpoint.as_ref()
    }

    /// The pool that accepts datasets.
    pub fn head(&self) -> PoolRef {
        self.pyramid.pool_ref()
    }

    /// The pool that emits ROI.
    pub fn tail(&self) -> PoolRef {
        self.finder.pool_ref()
    }

    /// Lifecycle of the tail pool; it turns `Linked` once a consumer has
    /// linked itself.
    pub fn watch_tail(&self) -> watch::Receiver<PoolState> {
        self.finder.watch_state()
    }

    pub fn link_tail(&self, target: PoolRef) -> Result<(), PoolError> {
        self.finder.tell(PoolMessage::Link(target))
    }

    /// Starts the ordered shutdown from the head.
    pub fn shutdown(&self) -> Result<(), PoolError> {
        self.pyramid.tell(PoolMessage::Shutdown)
    }

    /// Waits for every pool to stop.
    pub async fn join(self) -> Result<(), RoiMillError> {
        if let Some(endpoint) = &self.endpoint {
            endpoint.shutdown();
        }
        self.pyramid.join().await?;
        self.slider.join().await?;
        self.finder.join().await?;
        Ok(())
    }
}
