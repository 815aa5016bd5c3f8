use crate::pool::{NoCommand, Stage, StageError, StageWorker};
use crate::roi::{Dataset, Payload, WindowTag, WorkUnit, WINDOW_KEY};

/// Sliding window geometry, in the coordinates of the level being scanned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SlidingWindow {
    pub step: usize,
    pub width: usize,
    pub height: usize,
}

impl SlidingWindow {
    pub fn new(step: usize, width: usize, height: usize) -> Self {
        Self { step, width, height }
    }

    /// Cuts every full window out of `dataset`, row by row.
    ///
    /// A level smaller than the window yields nothing.
    pub fn windows(&self, dataset: &Dataset) -> Vec<(WindowTag, Dataset)> {
        let (w, h) = (self.width.max(1), self.height.max(1));
        if dataset.width() < w || dataset.height() < h {
            return Vec::new();
        }
        let step = self.step.max(1);
        let mut out = Vec::new();
        for y in (0..=dataset.height() - h).step_by(step) {
            for x in (0..=dataset.width() - w).step_by(step) {
                let tag = WindowTag {
                    x_offset: x as i64,
                    y_offset: y as i64,
                    width: w as i64,
                    height: h as i64,
                };
                out.push((tag, dataset.sub_window(x, y, w, h)));
            }
        }
        out
    }
}

pub struct SliderStage {
    window: SlidingWindow,
}

impl SliderStage {
    pub fn new(window: SlidingWindow) -> Self {
        Self { window }
    }
}

impl Stage for SliderStage {
    type Worker = SliderWorker;
    type Command = NoCommand;

    fn worker(&self, _index: usize) -> SliderWorker {
        SliderWorker { window: self.window }
    }
}

pub struct SliderWorker {
    window: SlidingWindow,
}

impl StageWorker for SliderWorker {
    fn process(&mut self, unit: WorkUnit) -> Result<Vec<WorkUnit>, StageError> {
        let Payload::Samples(level) = &unit.payload else {
            return Err(StageError::UnexpectedPayload { expected: "samples" });
        };
        let mut out = Vec::new();
        for (tag, window) in self.window.windows(level) {
            let metadata = unit.metadata.clone().with_tag(WINDOW_KEY, tag.to_string())?;
            out.push(WorkUnit::new(Payload::Samples(window), metadata));
        }
        Ok(out)
    }
}
