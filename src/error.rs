//! Error types for the analysis pipeline.

use crate::types::Field;
use thiserror::Error;

/// Common result type for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors surfaced by the pipeline stages.
///
/// An empty filter result is deliberately *not* represented here: zero
/// matching rows is a valid terminal state and downstream stages produce
/// empty layers and series for it.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Failed to construct the HTTP client
    #[error("failed to initialize HTTP client: {0}")]
    HttpClient(String),

    /// Transport-level failure fetching a remote resource
    #[error("network error fetching {url}: {message}")]
    Network { url: String, message: String },

    /// The fetched bytes were not parseable as delimited tabular text
    #[error("failed to parse CSV from {url}: {source}")]
    CsvParse {
        url: String,
        #[source]
        source: csv::Error,
    },

    /// The basemap archive could not be opened or read
    #[error("basemap archive from {url} is corrupt: {message}")]
    ArchiveCorrupt { url: String, message: String },

    /// The basemap archive opened fine but holds no complete geometry file set
    #[error("no complete shapefile set (.shp/.shx/.dbf) in archive from {url}; entries: {entries:?}")]
    MissingShapefileSet { url: String, entries: Vec<String> },

    /// Required canonical fields are absent from the CSV header row
    #[error("missing required fields {missing:?}; columns present: {available:?}")]
    Schema {
        missing: Vec<Field>,
        available: Vec<String>,
    },

    /// Invalid filter specification (too many active fields, inverted range, ...)
    #[error("invalid filter: {0}")]
    Filter(String),

    #[error(transparent)]
    Clustering(#[from] ClusteringError),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the clustering stage.
///
/// These abort only cluster-dependent outputs; upstream filtered data and
/// field-colored map views remain valid.
#[derive(Error, Debug)]
pub enum ClusteringError {
    #[error("clustering requires at least {needed} eligible rows, found {available}")]
    InsufficientRows { needed: usize, available: usize },
}
