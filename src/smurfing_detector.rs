//! Structuring ("smurfing") detection — per-account fan-in / fan-out sliding
//! window over a 72-hour default horizon, looking for many small transfers
//! funneled through (fan-in) or scattered from (fan-out) a single account.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::Graph;

pub const DEFAULT_WINDOW_HOURS: i64 = 72;
pub const DEFAULT_MIN_UNIQUE_COUNTERPARTIES: usize = 10;

#[derive(Debug, Clone)]
pub struct SmurfingDetectorConfig {
    pub window_hours: i64,
    pub min_unique_counterparties: usize,
}

impl Default for SmurfingDetectorConfig {
    fn default() -> Self {
        Self {
            window_hours: DEFAULT_WINDOW_HOURS,
            min_unique_counterparties: DEFAULT_MIN_UNIQUE_COUNTERPARTIES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FanDirection {
    In,
    Out,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmurfingResult {
    pub account: String,
    pub direction: FanDirection,
    pub unique_counterparties: usize,
    pub counterparties: Vec<String>,
    pub total_amount: f64,
    pub velocity: f64,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    /// Assigned by the scoring/aggregation stage; empty until then.
    pub ring_id: String,
}

/// Run both fan-in and fan-out detection over every account in the graph.
pub fn detect_smurfing(graph: &Graph, config: &SmurfingDetectorConfig) -> Vec<SmurfingResult> {
    let mut results = Vec::new();
    for account in graph.account_ids() {
        if let Some(r) = detect_fan(graph, account, FanDirection::In, config) {
            results.push(r);
        }
        if let Some(r) = detect_fan(graph, account, FanDirection::Out, config) {
            results.push(r);
        }
    }
    results
}

fn detect_fan(
    graph: &Graph,
    account: &str,
    direction: FanDirection,
    config: &SmurfingDetectorConfig,
) -> Option<SmurfingResult> {
    let mut events: Vec<(DateTime<Utc>, String, f64)> = match direction {
        FanDirection::In => graph
            .predecessors(account)
            .flat_map(|counterparty| graph.edges_between(counterparty, account))
            .map(|e| (e.timestamp, e.from.clone(), e.amount))
            .collect(),
        FanDirection::Out => graph
            .successors(account)
            .flat_map(|counterparty| graph.edges_between(account, counterparty))
            .map(|e| (e.timestamp, e.to.clone(), e.amount))
            .collect(),
    };

    if events.len() < config.min_unique_counterparties {
        return None;
    }
    events.sort_by_key(|(ts, _, _)| *ts);

    let window = Duration::hours(config.window_hours);
    let mut left = 0usize;
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut window_amount = 0.0;

    let mut best_unique = 0usize;
    let mut best_start = events[0].0;
    let mut best_end = events[0].0;
    let mut best_amount = 0.0;
    let mut best_counterparties: Vec<String> = Vec::new();

    for right in 0..events.len() {
        let (ts, counterparty, amount) = (&events[right].0, events[right].1.as_str(), events[right].2);
        *counts.entry(counterparty).or_insert(0) += 1;
        window_amount += amount;

        while *ts - events[left].0 > window {
            let (_, left_cp, left_amount) = &events[left];
            if let Some(c) = counts.get_mut(left_cp.as_str()) {
                *c -= 1;
                if *c == 0 {
                    counts.remove(left_cp.as_str());
                }
            }
            window_amount -= left_amount;
            left += 1;
        }

        let unique = counts.len();
        if unique > best_unique {
            best_unique = unique;
            best_start = events[left].0;
            best_end = *ts;
            best_amount = window_amount;
            best_counterparties = counts.keys().map(|s| s.to_string()).collect();
        }
    }

    if best_unique < config.min_unique_counterparties {
        return None;
    }

    let hours_span = (best_end - best_start).num_seconds() as f64 / 3600.0;
    let velocity = best_amount / hours_span.max(1.0);

    Some(SmurfingResult {
        account: account.to_string(),
        direction,
        unique_counterparties: best_unique,
        counterparties: best_counterparties,
        total_amount: best_amount,
        velocity,
        window_start: best_start,
        window_end: best_end,
        ring_id: String::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction_table::TransactionTable;

    fn table(rows: &[(&str, &str, f64, &str)]) -> TransactionTable {
        let headers = vec![
            "sender".to_string(),
            "receiver".to_string(),
            "amount".to_string(),
            "timestamp".to_string(),
        ];
        let rows = rows
            .iter()
            .map(|(s, r, a, ts)| vec![s.to_string(), r.to_string(), a.to_string(), ts.to_string()])
            .collect();
        TransactionTable::from_records(&headers, rows).unwrap()
    }

    #[test]
    fn detects_fan_in_from_many_unique_senders() {
        let rows: Vec<(String, String, f64, String)> = (0..10)
            .map(|i| {
                (
                    format!("SENDER{i}"),
                    "HUB".to_string(),
                    100.0,
                    format!("2024-01-01T{:02}:00:00Z", i * 2),
                )
            })
            .collect();
        let rows: Vec<(&str, &str, f64, &str)> = rows
            .iter()
            .map(|(s, r, a, ts)| (s.as_str(), r.as_str(), *a, ts.as_str()))
            .collect();
        let t = table(&rows);
        let g = Graph::build(&t);
        let results = detect_smurfing(&g, &SmurfingDetectorConfig::default());
        let hub_in = results
            .iter()
            .find(|r| r.account == "HUB" && r.direction == FanDirection::In)
            .unwrap();
        assert_eq!(hub_in.unique_counterparties, 10);
        assert_eq!(hub_in.total_amount, 1000.0);
    }

    #[test]
    fn detects_fan_out_to_many_unique_receivers() {
        let rows: Vec<(String, String, f64, String)> = (0..10)
            .map(|i| {
                (
                    "HUB".to_string(),
                    format!("RECEIVER{i}"),
                    50.0,
                    format!("2024-01-01T{:02}:00:00Z", i * 2),
                )
            })
            .collect();
        let rows: Vec<(&str, &str, f64, &str)> = rows
            .iter()
            .map(|(s, r, a, ts)| (s.as_str(), r.as_str(), *a, ts.as_str()))
            .collect();
        let t = table(&rows);
        let g = Graph::build(&t);
        let results = detect_smurfing(&g, &SmurfingDetectorConfig::default());
        let hub_out = results
            .iter()
            .find(|r| r.account == "HUB" && r.direction == FanDirection::Out)
            .unwrap();
        assert_eq!(hub_out.unique_counterparties, 10);
    }

    #[test]
    fn window_expiry_drops_stale_counterparties() {
        let t = table(&[
            ("A", "HUB", 10.0, "2024-01-01T00:00:00Z"),
            ("B", "HUB", 10.0, "2024-01-01T01:00:00Z"),
            ("C", "HUB", 10.0, "2024-01-05T00:00:00Z"),
            ("D", "HUB", 10.0, "2024-01-05T01:00:00Z"),
        ]);
        let g = Graph::build(&t);
        let config = SmurfingDetectorConfig {
            min_unique_counterparties: 2,
            ..Default::default()
        };
        let results = detect_smurfing(&g, &config);
        let hub_in = results
            .iter()
            .find(|r| r.account == "HUB" && r.direction == FanDirection::In)
            .unwrap();
        // the two windows of 2 unique senders each never merge into one of 4
        assert_eq!(hub_in.unique_counterparties, 2);
    }

    #[test]
    fn below_threshold_is_not_reported() {
        let t = table(&[
            ("A", "HUB", 10.0, "2024-01-01T00:00:00Z"),
            ("B", "HUB", 10.0, "2024-01-01T01:00:00Z"),
        ]);
        let g = Graph::build(&t);
        let results = detect_smurfing(&g, &SmurfingDetectorConfig::default());
        assert!(!results.iter().any(|r| r.account == "HUB"));
    }
}
