//! Multi-resolution pyramid generation.

use crate::pool::{NoCommand, Stage, StageError, StageWorker};
use crate::roi::{Dataset, Payload, PyramidTag, WorkUnit, PYRAMID_KEY};

/// Pyramid parameters.
///
/// Level 0 is the dataset at full resolution. Level `k` is the dataset
/// decimated by `scale_factor * k`; levels are produced while both
/// dimensions stay at least `window_size`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PyramidOperation {
    pub scale_factor: usize,
    pub window_size: usize,
}

impl PyramidOperation {
    pub fn new(scale_factor: usize, window_size: usize) -> Self {
        Self {
            scale_factor,
            window_size,
        }
    }

    /// Builds every level of `dataset` together with its tag.
    pub fn levels(&self, dataset: &Dataset) -> Vec<(PyramidTag, Dataset)> {
        let window = self.window_size.max(1);
        let mut levels = vec![(
            PyramidTag {
                scale_factor: 1,
                window_size: self.window_size as i64,
                step: 1,
            },
            dataset.clone(),
        )];
        if self.scale_factor < 2 {
            return levels;
        }

        for step in 1.. {
            let factor = self.scale_factor * step;
            if dataset.width() / factor < window || dataset.height() / factor < window {
                break;
            }
            let tag = PyramidTag {
                scale_factor: self.scale_factor as i64,
                window_size: self.window_size as i64,
                step: step as i64,
            };
            levels.push((tag, dataset.decimate(factor)));
        }
        levels
    }
}

pub struct PyramidStage {
    operation: PyramidOperation,
}

impl PyramidStage {
    pub fn new(operation: PyramidOperation) -> Self {
        Self { operation }
    }
}

impl Stage for PyramidStage {
    type Worker = PyramidWorker;
    type Command = NoCommand;

    fn worker(&self, _index: usize) -> PyramidWorker {
        PyramidWorker {
            operation: self.operation,
        }
    }
}

pub struct PyramidWorker {
    operation: PyramidOperation,
}

impl StageWorker for PyramidWorker {
    fn process(&mut self, unit: WorkUnit) -> Result<Vec<WorkUnit>, StageError> {
        let Payload::Samples(dataset) = &unit.payload else {
            return Err(StageError::UnexpectedPayload { expected: "samples" });
        };
        self.operation
            .levels(dataset)
            .into_iter()
            .map(|(tag, level)| -> Result<WorkUnit, StageError> {
                let metadata = unit.metadata.clone().with_tag(PYRAMID_KEY, tag.to_string())?;
                Ok(WorkUnit::new(Payload::Samples(level), metadata))
            })
            .collect()
    }
}
