use std::path::PathBuf;
use thiserror::Error;

use crate::pool::PoolError;
use crate::remote::AddressError;
use crate::roi::MetadataError;

/// The main error type for roimill operations.
#[derive(Debug, Error)]
pub enum RoiMillError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Required file {path} is missing or unreadable")]
    MissingFile { path: PathBuf },

    #[error("Failed to parse configuration from {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to parse ROI bundle from {path}: {source}")]
    BundleParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Failed to read dataset from {path}: {source}")]
    DatasetParse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Invalid dataset in {path}: {message}")]
    DatasetShape { path: PathBuf, message: String },

    #[error("Failed to write dataset to {path}: {source}")]
    DatasetWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Failed to write results for {} source(s), first error: {first}", .failed.len())]
    ResultsUnwritten {
        /// Identities whose entries were kept for another attempt.
        failed: Vec<String>,
        /// Outputs written before and after the failures.
        written: Vec<PathBuf>,
        #[source]
        first: Box<RoiMillError>,
    },

    #[error("Unable to find remote system sink {address}")]
    SinkUnavailable { address: String },

    #[error("Invalid pool address: {0}")]
    InvalidAddress(#[from] AddressError),

    #[error("Unsupported render mode: {0}")]
    UnsupportedMode(String),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Pool(#[from] PoolError),
}
