//! Transaction Table — normalizes raw tabular rows into a sorted, typed relation.
//!
//! This is the leaf component: every other module operates on a
//! [`TransactionTable`], never on raw strings.

use crate::error::IngestError;
use crate::transaction::Transaction;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const REQUIRED_COLUMNS: &[&str] = &["sender", "receiver", "amount", "timestamp"];

/// A normalized, timestamp-sorted (ascending, stable) collection of transactions.
#[derive(Debug, Clone, Default)]
pub struct TransactionTable {
    pub transactions: Vec<Transaction>,
}

impl TransactionTable {
    /// Build a table from a header row and a set of raw string rows.
    ///
    /// Column aliases (`sender_id`→`sender`, `receiver_id`→`receiver`) are applied
    /// before the required-column check. Rows with an unparseable timestamp are
    /// dropped; rows with a non-numeric amount are kept with `amount = 0.0`.
    pub fn from_records(
        headers: &[String],
        rows: Vec<Vec<String>>,
    ) -> Result<Self, IngestError> {
        let headers = normalize_headers(headers);

        let missing: Vec<&str> = REQUIRED_COLUMNS
            .iter()
            .filter(|c| !headers.iter().any(|h| h == *c))
            .copied()
            .collect();
        if !missing.is_empty() {
            return Err(IngestError::MissingColumns(missing.join(", ")));
        }

        let col = |name: &str| headers.iter().position(|h| h == name).unwrap();
        let sender_idx = col("sender");
        let receiver_idx = col("receiver");
        let amount_idx = col("amount");
        let timestamp_idx = col("timestamp");
        let txn_id_idx = headers.iter().position(|h| h == "transaction_id");

        let mut transactions = Vec::with_capacity(rows.len());
        for row in rows {
            let timestamp = match row.get(timestamp_idx).and_then(|s| parse_timestamp(s)) {
                Some(ts) => ts,
                None => continue,
            };
            let sender = row.get(sender_idx).cloned().unwrap_or_default();
            let receiver = row.get(receiver_idx).cloned().unwrap_or_default();
            let amount = row
                .get(amount_idx)
                .and_then(|s| s.trim().parse::<f64>().ok())
                .unwrap_or(0.0);
            let transaction_id = txn_id_idx
                .and_then(|i| row.get(i))
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty());

            transactions.push(Transaction {
                transaction_id,
                sender,
                receiver,
                amount,
                timestamp,
            });
        }

        // Vec::sort_by_key is a stable sort.
        transactions.sort_by_key(|t| t.timestamp);

        Ok(Self { transactions })
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn total_volume(&self) -> f64 {
        self.transactions.iter().map(|t| t.amount).sum()
    }
}

fn normalize_headers(headers: &[String]) -> Vec<String> {
    headers
        .iter()
        .map(|h| match h.trim().to_lowercase().as_str() {
            "sender_id" => "sender".to_string(),
            "receiver_id" => "receiver".to_string(),
            other => other.to_string(),
        })
        .collect()
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(ndt, Utc));
        }
    }
    if let Ok(nd) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(DateTime::from_naive_utc_and_offset(
            nd.and_hms_opt(0, 0, 0).unwrap(),
            Utc,
        ));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    fn row(cols: &[&str]) -> Vec<String> {
        cols.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn missing_required_column_is_an_error() {
        let err = TransactionTable::from_records(
            &headers(&["sender", "receiver", "amount"]),
            vec![row(&["A", "B", "100"])],
        )
        .unwrap_err();
        assert!(matches!(err, IngestError::MissingColumns(_)));
    }

    #[test]
    fn aliases_sender_id_and_receiver_id() {
        let table = TransactionTable::from_records(
            &headers(&["sender_id", "receiver_id", "amount", "timestamp"]),
            vec![row(&["A", "B", "100", "2024-01-01T00:00:00Z"])],
        )
        .unwrap();
        assert_eq!(table.transactions[0].sender, "A");
        assert_eq!(table.transactions[0].receiver, "B");
    }

    #[test]
    fn unparseable_timestamp_drops_the_row() {
        let table = TransactionTable::from_records(
            &headers(&["sender", "receiver", "amount", "timestamp"]),
            vec![
                row(&["A", "B", "100", "not-a-date"]),
                row(&["A", "B", "200", "2024-01-01T00:00:00Z"]),
            ],
        )
        .unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.transactions[0].amount, 200.0);
    }

    #[test]
    fn unparseable_amount_becomes_zero() {
        let table = TransactionTable::from_records(
            &headers(&["sender", "receiver", "amount", "timestamp"]),
            vec![row(&["A", "B", "oops", "2024-01-01T00:00:00Z"])],
        )
        .unwrap();
        assert_eq!(table.transactions[0].amount, 0.0);
    }

    #[test]
    fn rows_are_stable_sorted_by_timestamp() {
        let table = TransactionTable::from_records(
            &headers(&["sender", "receiver", "amount", "timestamp"]),
            vec![
                row(&["A", "B", "3", "2024-01-03T00:00:00Z"]),
                row(&["A", "B", "1", "2024-01-01T00:00:00Z"]),
                row(&["A", "B", "2", "2024-01-02T00:00:00Z"]),
            ],
        )
        .unwrap();
        let amounts: Vec<f64> = table.transactions.iter().map(|t| t.amount).collect();
        assert_eq!(amounts, vec![1.0, 2.0, 3.0]);
    }
}
