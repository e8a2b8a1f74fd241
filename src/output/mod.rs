//! Output module for leaf records and run reports
//!
//! This module handles:
//! - Collecting leaf records under the run's record limit
//! - Writing the collected records as CSV
//! - Printing the run summary

mod csv_writer;
mod record;
mod sink;
mod summary;

pub use csv_writer::{write_csv, CSV_HEADER};
pub use record::{LeafRecord, NOT_AVAILABLE};
pub use sink::{Admission, Sink};
pub use summary::{print_summary, RunSummary};

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while writing output
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Output IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type alias for output operations
pub type OutputResult<T> = std::result::Result<T, OutputError>;
