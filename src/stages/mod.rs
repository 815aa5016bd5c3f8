//! Stage implementations plugged into the pool runtime.
//!
//! Only the consolidation stage carries state of its own; the others are
//! thin adapters around a fixed operation.

mod consolidation;
mod finder;
mod ingest;
mod pyramid;
mod slider;

pub use consolidation::{ConsolidationCommand, ConsolidationStage, ConsolidationWorker};
pub use finder::{Detector, FinderStage, FinderWorker, Statistic, ThresholdDetector};
pub use ingest::{IngestStage, IngestWorker};
pub use pyramid::{PyramidOperation, PyramidStage, PyramidWorker};
pub use slider::{SlidingWindow, SliderStage, SliderWorker};

/// Name under which the pyramid pool is exposed.
pub const PYRAMID_POOL: &str = "PyramidPool";
pub const SLIDER_POOL: &str = "SlidingWindowPool";
pub const FINDER_POOL: &str = "ROIFinderPool";
pub const INGESTOR_POOL: &str = "IngestorPool";
pub const RECEIVER_POOL: &str = "ReceiverPool";
