//! Error taxonomy for the segmentation pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the pipeline stages.
///
/// Everything except [`PipelineError::DegenerateFeature`] aborts the batch run.
/// A degenerate feature is reported and the affected dimension is left unscaled.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("unsupported table format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("feature '{feature}' has zero variance (constant value {value})")]
    DegenerateFeature { feature: &'static str, value: f64 },

    #[error("{rows} clusterable listings is fewer than the {clusters} clusters requested")]
    InsufficientData { rows: usize, clusters: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("feature scaling failed: {0}")]
    Scaling(String),

    #[error("clustering failed: {0}")]
    Clustering(String),

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("data frame error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl PipelineError {
    /// Wrap any displayable failure that happened while persisting `path`.
    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        PipelineError::Write {
            path: path.into(),
            source: std::io::Error::new(std::io::ErrorKind::Other, err.to_string()),
        }
    }
}

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, PipelineError>;
