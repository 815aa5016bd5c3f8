//! Work units and regions of interest.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::coords::Coords;
use super::dataset::Dataset;
use super::metadata::Metadata;

/// The payload carried by a [`WorkUnit`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// A reference to a source file that has not been read yet.
    Source(PathBuf),
    /// Raw samples: a whole dataset, a pyramid level or a window.
    Samples(Dataset),
    /// A detection in stage-local coordinates.
    Region(RegionBox),
}

/// A unit of work flowing between pools.
///
/// Stages extend the metadata as the unit passes through; they never remove
/// tags.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorkUnit {
    pub payload: Payload,
    pub metadata: Metadata,
}

impl WorkUnit {
    pub fn new(payload: Payload, metadata: Metadata) -> Self {
        Self { payload, metadata }
    }

    /// Creates the ingestion unit for a source file.
    pub fn ingestion(source_path: impl Into<PathBuf>, metadata: Metadata) -> Self {
        Self::new(Payload::Source(source_path.into()), metadata)
    }
}

/// A bounding box in the coordinate space of the stage that produced it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionBox {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

impl RegionBox {
    pub fn new(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }
}

/// A detection result: a stage-local box plus the metadata it carried.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Roi {
    pub region: RegionBox,
    pub metadata: Metadata,
}

impl Roi {
    pub fn new(region: RegionBox, metadata: Metadata) -> Self {
        Self { region, metadata }
    }

    /// Absolute coordinates of this ROI in a `width x height` dataset.
    #[inline]
    pub fn coords(&self, width: usize, height: usize) -> Coords {
        Coords::decode(&self.metadata, width, height)
    }
}

impl TryFrom<WorkUnit> for Roi {
    type Error = WorkUnit;

    /// Converts a unit carrying a [`Payload::Region`]; any other unit is
    /// handed back unchanged.
    fn try_from(unit: WorkUnit) -> Result<Self, Self::Error> {
        match unit.payload {
            Payload::Region(region) => Ok(Roi::new(region, unit.metadata)),
            _ => Err(unit),
        }
    }
}

impl From<Roi> for WorkUnit {
    fn from(roi: Roi) -> Self {
        WorkUnit::new(Payload::Region(roi.region), roi.metadata)
    }
}
