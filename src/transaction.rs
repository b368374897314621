//! Core transaction type shared by ingestion, the graph builder and every detector.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single money movement between two accounts.
///
/// `sender == receiver` rows are dropped before graph construction (see
/// [`crate::graph::Graph::build`]) but a `Transaction` itself does not forbid them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub transaction_id: Option<String>,
    pub sender: String,
    pub receiver: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
}

/// Closed enumeration of account kinds, derived from graph aggregates.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AccountType {
    Individual,
    Business,
}

impl std::fmt::Display for AccountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AccountType::Individual => write!(f, "individual"),
            AccountType::Business => write!(f, "business"),
        }
    }
}
