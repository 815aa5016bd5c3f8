//! Two-dimensional sample grids.
//!
//! A [`Dataset`] is the raw data scanned by the pipeline and the canvas the
//! consolidation results are rendered onto. On disk it is delimited text,
//! one row per line, comma or whitespace separated.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Read};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RoiMillError;

/// A row-major grid of `f64` samples.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    width: usize,
    height: usize,
    samples: Vec<f64>,
}

impl Dataset {
    /// Creates a zero-filled dataset.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            samples: vec![0.0; width * height],
        }
    }

    /// Builds a dataset from rows of equal length.
    ///
    /// Returns `None` if the rows are ragged.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Option<Self> {
        let height = rows.len();
        let width = rows.first().map(Vec::len).unwrap_or(0);
        if rows.iter().any(|r| r.len() != width) {
            return None;
        }
        Some(Self {
            width,
            height,
            samples: rows.into_iter().flatten().collect(),
        })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Returns true if the dataset holds no samples.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the sample at `(x, y)`, or `None` outside the grid.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<f64> {
        if x < self.width && y < self.height {
            Some(self.samples[y * self.width + x])
        } else {
            None
        }
    }

    /// Sets the sample at `(x, y)`. Writes outside the grid are ignored.
    #[inline]
    pub fn set(&mut self, x: usize, y: usize, value: f64) -> bool {
        if x < self.width && y < self.height {
            self.samples[y * self.width + x] = value;
            true
        } else {
            false
        }
    }

    /// Returns the largest sample, or `None` for an empty dataset.
    pub fn max(&self) -> Option<f64> {
        self.samples.iter().copied().reduce(f64::max)
    }

    /// Returns the mean sample, or `None` for an empty dataset.
    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        Some(self.samples.iter().sum::<f64>() / self.samples.len() as f64)
    }

    /// Copies out the `width x height` window whose top-left corner is `(x, y)`.
    ///
    /// The window is truncated at the dataset edges.
    pub fn sub_window(&self, x: usize, y: usize, width: usize, height: usize) -> Dataset {
        let x_end = (x + width).min(self.width);
        let y_end = (y + height).min(self.height);
        let w = x_end.saturating_sub(x);
        let h = y_end.saturating_sub(y);
        let mut samples = Vec::with_capacity(w * h);
        for row in y..y_end {
            let start = row * self.width + x;
            samples.extend_from_slice(&self.samples[start..start + w]);
        }
        Dataset {
            width: w,
            height: h,
            samples,
        }
    }

    /// Reduces resolution by `factor`, replacing each `factor x factor`
    /// block with its mean. Partial blocks at the edges are dropped.
    pub fn decimate(&self, factor: usize) -> Dataset {
        if factor <= 1 {
            return self.clone();
        }
        let w = self.width / factor;
        let h = self.height / factor;
        let mut out = Dataset::new(w, h);
        let block = (factor * factor) as f64;
        for by in 0..h {
            for bx in 0..w {
                let mut sum = 0.0;
                for y in by * factor..(by + 1) * factor {
                    let start = y * self.width + bx * factor;
                    sum += self.samples[start..start + factor].iter().sum::<f64>();
                }
                out.samples[by * w + bx] = sum / block;
            }
        }
        out
    }

    /// Iterates over rows.
    pub fn rows(&self) -> impl Iterator<Item = &[f64]> {
        // chunks_exact panics on a zero chunk size
        self.samples.chunks_exact(self.width.max(1)).take(self.height)
    }
}

/// Reads a dataset from a delimited text file.
///
/// Rows may be comma separated or whitespace separated; blank lines are
/// ignored.
pub fn read_dataset(path: &Path) -> Result<Dataset, RoiMillError> {
    let file = File::open(path).map_err(|_| RoiMillError::MissingFile {
        path: path.to_path_buf(),
    })?;
    parse_dataset(BufReader::new(file), path)
}

/// Fuzz-only entrypoint for dataset parsing from raw bytes.
#[cfg(feature = "fuzzing")]
pub fn fuzz_parse_dataset(data: &[u8]) -> Result<(), RoiMillError> {
    let _ = parse_dataset(data, Path::new("<fuzz>"))?;
    Ok(())
}

fn parse_dataset<R: BufRead>(mut reader: R, path: &Path) -> Result<Dataset, RoiMillError> {
    // Sniff the delimiter from the first non-blank line
    let mut first = String::new();
    while first.trim().is_empty() {
        first.clear();
        if reader.read_line(&mut first)? == 0 {
            return Ok(Dataset::default());
        }
    }
    let delimiter = if first.contains(',') { b',' } else { b' ' };
    let chained = std::io::Cursor::new(first.into_bytes()).chain(reader);

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .from_reader(chained);

    let mut rows = Vec::new();
    for (line, record) in csv_reader.records().enumerate() {
        let record = record.map_err(|source| RoiMillError::DatasetParse {
            path: path.to_path_buf(),
            source,
        })?;
        let mut row = Vec::with_capacity(record.len());
        for field in record.iter().filter(|f| !f.is_empty()) {
            let value = field.parse::<f64>().map_err(|_| RoiMillError::DatasetShape {
                path: path.to_path_buf(),
                message: format!("row {}: '{}' is not a number", line + 1, field),
            })?;
            row.push(value);
        }
        if !row.is_empty() {
            rows.push(row);
        }
    }

    Dataset::from_rows(rows).ok_or_else(|| RoiMillError::DatasetShape {
        path: path.to_path_buf(),
        message: "rows have differing lengths".into(),
    })
}

/// Writes a dataset as comma separated text.
pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<(), RoiMillError> {
    let file = File::create(path)?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(BufWriter::new(file));
    let wrap = |source: csv::Error| RoiMillError::DatasetWrite {
        path: path.to_path_buf(),
        source,
    };
    for row in dataset.rows() {
        writer
            .write_record(row.iter().map(|v| v.to_string()))
            .map_err(wrap)?;
    }
    writer.flush()?;
    Ok(())
}
