//! ROI detection on individual windows.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RoiMillError;
use crate::pool::{NoCommand, Stage, StageError, StageWorker};
use crate::roi::{Dataset, Payload, RegionBox, Roi, WorkUnit};

/// Decides whether a window contains a feature.
pub trait Detector: Send + Sync + 'static {
    /// Returns the detected region in window coordinates.
    fn detect(&self, window: &Dataset) -> Option<RegionBox>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Statistic {
    Mean,
    Max,
}

/// Flags a whole window when a summary statistic exceeds a threshold.
///
/// Loaded from a YAML bundle:
///
/// ```yaml
/// statistic: mean
/// threshold: 0.8
/// ```
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ThresholdDetector {
    pub statistic: Statistic,
    pub threshold: f64,
}

impl ThresholdDetector {
    pub fn load(path: &Path) -> Result<Self, RoiMillError> {
        let text = fs::read_to_string(path).map_err(|_| RoiMillError::MissingFile {
            path: path.to_path_buf(),
        })?;
        serde_yaml::from_str(&text).map_err(|source| RoiMillError::BundleParse {
            path: path.to_path_buf(),
            source,
        })
    }
}

impl Detector for ThresholdDetector {
    fn detect(&self, window: &Dataset) -> Option<RegionBox> {
        let value = match self.statistic {
            Statistic::Mean => window.mean()?,
            Statistic::Max => window.max()?,
        };
        (value > self.threshold).then(|| RegionBox::new(0, 0, window.width(), window.height()))
    }
}

pub struct FinderStage {
    detector: Arc<dyn Detector>,
}

impl FinderStage {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self { detector }
    }
}

impl Stage for FinderStage {
    type Worker = FinderWorker;
    type Command = NoCommand;

    fn worker(&self, _index: usize) -> FinderWorker {
        FinderWorker {
            detector: Arc::clone(&self.detector),
        }
    }
}

pub struct FinderWorker {
    detector: Arc<dyn Detector>,
}

impl StageWorker for FinderWorker {
    fn process(&mut self, unit: WorkUnit) -> Result<Vec<WorkUnit>, StageError> {
        let Payload::Samples(window) = &unit.payload else {
            return Err(StageError::UnexpectedPayload { expected: "samples" });
        };
        match self.detector.detect(window) {
            Some(region) => Ok(vec![Roi::new(region, unit.metadata).into()]),
            None => {
                debug!(metadata = %unit.metadata, "No flaw found");
                Ok(Vec::new())
            }
        }
    }
}
