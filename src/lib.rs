//! # Fraud Ring Detector
//!
//! Graph-based analytics over a batch of financial transactions: builds a
//! directed multigraph of money movement, then runs three detectors over it
//! — circular flows, structuring ("smurfing"), and shell/pass-through
//! chains — before scoring every touched account and grouping detections
//! into fraud rings.
//!
//! ## Pipeline
//!
//! ```text
//! CSV bytes -> TransactionTable -> Graph -> detectors -> fp_filter -> scoring -> AnalysisResult
//! ```
//!
//! [`ingest::table_from_csv`] and [`transaction_table::TransactionTable`] own
//! the parsing and normalization boundary; [`scoring::analyze`] is the single
//! entry point that runs the rest of the pipeline.

pub mod config;
pub mod cycle_detector;
pub mod error;
pub mod fp_filter;
pub mod graph;
pub mod ingest;
pub mod scoring;
pub mod server;
pub mod shell_detector;
pub mod smurfing_detector;
pub mod transaction;
pub mod transaction_table;

pub use config::PipelineConfig;
pub use error::{AnalysisError, IngestError};
pub use scoring::{analyze, analyze_with_config, AnalysisResult, FraudRing, RingType, SuspiciousAccount, Summary};
pub use transaction::{AccountType, Transaction};
pub use transaction_table::TransactionTable;

/// Parse a CSV upload and run the full detection pipeline over it.
pub fn analyze_csv(bytes: &[u8]) -> Result<AnalysisResult, AnalysisError> {
    let table = ingest::table_from_csv(bytes)?;
    Ok(scoring::analyze(&table))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyze_csv_runs_the_full_pipeline() {
        let csv = "sender,receiver,amount,timestamp\n\
                    A,B,1000.0,2024-01-01T00:00:00Z\n\
                    B,C,950.0,2024-01-01T10:00:00Z\n\
                    C,A,900.0,2024-01-01T20:00:00Z\n";
        let result = analyze_csv(csv.as_bytes()).unwrap();
        assert_eq!(result.summary.num_cycles, 1);
        assert_eq!(result.summary.total_transactions, 3);
    }

    #[test]
    fn analyze_csv_rejects_missing_columns() {
        let csv = "sender,receiver\nA,B\n";
        let err = analyze_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, AnalysisError::Ingest(IngestError::MissingColumns(_))));
    }
}
