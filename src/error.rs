//! Error types for ingestion and analysis.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while turning raw tabular input into a [`crate::transaction_table::TransactionTable`].
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum IngestError {
    #[error("missing required column(s): {0}")]
    MissingColumns(String),

    #[error("could not parse CSV: {0}")]
    MalformedCsv(String),

    #[error("upload exceeds maximum size of {0} bytes")]
    TooLarge(usize),

    #[error("only .csv files are accepted")]
    UnsupportedFileType,
}

/// Errors raised while running the analysis pipeline over an already-ingested table.
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum AnalysisError {
    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error("analysis failed: {0}")]
    Failed(String),
}
