//! CSV ingestion — the thin adapter over [`TransactionTable`].
//!
//! UTF-8, comma-separated, header row required. This module owns nothing
//! about fraud semantics; it only turns bytes into rows for
//! [`TransactionTable::from_records`].

use crate::error::IngestError;
use crate::transaction_table::TransactionTable;

pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Parse a CSV byte buffer into a [`TransactionTable`].
pub fn table_from_csv(bytes: &[u8]) -> Result<TransactionTable, IngestError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| IngestError::MalformedCsv(e.to_string()))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| IngestError::MalformedCsv(e.to_string()))?;
        rows.push(record.iter().map(|f| f.to_string()).collect());
    }

    TransactionTable::from_records(&headers, rows)
}

/// Validate the filename and size of an uploaded file before parsing it.
pub fn validate_upload(filename: &str, size: usize) -> Result<(), IngestError> {
    if !filename.to_lowercase().ends_with(".csv") {
        return Err(IngestError::UnsupportedFileType);
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(IngestError::TooLarge(MAX_UPLOAD_BYTES));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let csv = "sender,receiver,amount,timestamp\nA,B,100.0,2024-01-01T00:00:00Z\n";
        let table = table_from_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.transactions[0].sender, "A");
    }

    #[test]
    fn missing_columns_is_rejected() {
        let csv = "sender,receiver\nA,B\n";
        let err = table_from_csv(csv.as_bytes()).unwrap_err();
        assert!(matches!(err, IngestError::MissingColumns(_)));
    }

    #[test]
    fn rejects_non_csv_filename() {
        assert!(validate_upload("data.txt", 10).is_err());
        assert!(validate_upload("DATA.CSV", 10).is_ok());
    }

    #[test]
    fn rejects_oversize_upload() {
        assert!(validate_upload("data.csv", MAX_UPLOAD_BYTES + 1).is_err());
    }
}
