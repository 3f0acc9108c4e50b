//! Error types for the invoice2csv library.
//!
//! Three error types reflect the three failure granularities of the pipeline:
//!
//! * [`PipelineError`] — **Fatal**: the run cannot proceed or its results
//!   cannot be persisted (input directory missing, bad configuration, CSV
//!   write failure). Returned from the top-level pipeline and report
//!   functions.
//!
//! * [`TableExtractError`] — **File-level**: table extraction failed for one
//!   PDF. Absorbed at the file boundary into an Error outcome; the file stays
//!   in the input directory for inspection and the run continues.
//!
//! * [`OracleError`] — **Table-level**: the LLM transport failed for one
//!   table. Absorbed inside [`crate::client::LineItemExtractor`] and degraded
//!   to zero items; the file itself is still considered processed.
//!
//! The separation keeps the blast radius of each failure explicit: a garbled
//! oracle response never costs more than one table, a corrupt PDF never costs
//! more than one file, and only persistence problems abort the run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the invoice2csv library.
///
/// File- and table-level failures use [`TableExtractError`] and
/// [`OracleError`] and are absorbed into per-file outcomes rather than
/// propagated here.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// The configured input directory does not exist.
    #[error("Input directory not found: '{path}'\nCheck the path exists and is readable.")]
    InputDirMissing { path: PathBuf },

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not write the line-item dataset CSV.
    #[error("Failed to write dataset '{path}': {source}")]
    DatasetWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Could not write the processing report CSV.
    #[error("Failed to write report '{path}': {source}")]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    /// Filesystem error outside the CSV writers (directory creation, rename).
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file-level failure: table extraction raised for one PDF.
///
/// Recorded as that file's Error outcome; the file is not archived.
#[derive(Debug, Error)]
pub enum TableExtractError {
    /// The file vanished between enumeration and extraction.
    #[error("PDF file not found: '{path}'")]
    NotFound { path: PathBuf },

    /// The extraction backend failed on this file.
    #[error("Failed to extract tables from '{path}': {detail}")]
    Failed { path: PathBuf, detail: String },
}

/// A table-level failure: the oracle transport call did not produce text.
///
/// Never propagates past [`crate::client::LineItemExtractor`] — it degrades
/// to an empty item list for the affected table.
#[derive(Debug, Error)]
pub enum OracleError {
    /// The HTTP request itself failed (connect, timeout, TLS).
    #[error("Oracle request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API answered with a non-success status.
    #[error("Oracle API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// The response decoded but carried no message content.
    #[error("Oracle response contained no message content")]
    MissingContent,
}
