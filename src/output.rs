//! Writing consolidated results to the output folder.

use std::fs;
use std::path::PathBuf;

use tracing::{error, info};

use crate::config::Config;
use crate::consolidate::{RegionConsolidator, RenderMode};
use crate::error::RoiMillError;
use crate::roi::{read_dataset, write_dataset};
use crate::store::{ResultStore, ResultsEntry};

/// Renders result entries onto their source datasets and writes them to
/// `<folder>/<identity>.txt`.
#[derive(Clone, Debug)]
pub struct ResultWriter {
    pub consolidator: RegionConsolidator,
    pub mode: RenderMode,
    pub folder: PathBuf,
}

impl ResultWriter {
    /// Builds a writer from the configuration; `mode` overrides the
    /// configured render mode.
    pub fn from_config(config: &Config, mode: Option<RenderMode>) -> Result<Self, RoiMillError> {
        let mode = match mode {
            Some(mode) => mode,
            None => config.consolidation.mode.parse()?,
        };
        Ok(Self {
            consolidator: RegionConsolidator::new(
                config.consolidation.enhance_factor,
                config.consolidation.overlap_threshold,
            ),
            mode,
            folder: config.output.folder.clone(),
        })
    }

    pub fn write(&self, entry: &ResultsEntry) -> Result<PathBuf, RoiMillError> {
        let input = read_dataset(entry.source_path())?;
        let rendered = self.consolidator.generate(&input, entry.rois(), self.mode);
        fs::create_dir_all(&self.folder)?;
        let path = self.folder.join(format!("{}.txt", entry.identity()));
        write_dataset(&path, &rendered)?;
        info!(
            source = %entry.source_path().display(),
            rois = entry.rois().len(),
            mode = %self.mode,
            output = %path.display(),
            "Wrote results"
        );
        Ok(path)
    }

    /// Pops and writes every entry of `store`.
    ///
    /// An entry that fails to write is put back and the remaining entries
    /// are still written; the failures are reported together.
    pub fn write_store(&self, store: &mut ResultStore) -> Result<Vec<PathBuf>, RoiMillError> {
        let mut report = WriteReport::default();
        for key in store.keys() {
            let Some(entry) = store.take(&key) else { continue };
            if let Err(entry) = report.record(self, entry) {
                store.restore(entry);
            }
        }
        report.finish()
    }
}

/// Outcome of writing a batch of entries.
#[derive(Debug, Default)]
pub(crate) struct WriteReport {
    written: Vec<PathBuf>,
    failed: Vec<String>,
    first: Option<RoiMillError>,
}

impl WriteReport {
    /// Writes `entry`, handing it back when it could not be written.
    pub(crate) fn record(&mut self, writer: &ResultWriter, entry: ResultsEntry) -> Result<(), ResultsEntry> {
        match writer.write(&entry) {
            Ok(path) => {
                self.written.push(path);
                Ok(())
            }
            Err(err) => {
                error!(
                    source = %entry.identity(),
                    path = %entry.source_path().display(),
                    error = %err,
                    "Failed to write results, keeping them"
                );
                self.failed.push(entry.identity().to_string());
                self.first.get_or_insert(err);
                Err(entry)
            }
        }
    }

    pub(crate) fn finish(self) -> Result<Vec<PathBuf>, RoiMillError> {
        match self.first {
            None => Ok(self.written),
            Some(first) => Err(RoiMillError::ResultsUnwritten {
                failed: self.failed,
                written: self.written,
                first: Box::new(first),
            }),
        }
    }
}
