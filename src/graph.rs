//! Graph Builder — turns a [`TransactionTable`] into a directed multigraph
//! plus the per-account aggregates every detector and filter reads from.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::transaction::{AccountType, Transaction};
use crate::transaction_table::TransactionTable;

/// `(corp|inc|llc|ltd|co\b|merchant|store|shop|pay|bank|services)`, case-insensitive.
/// Shared by the graph builder's `account_type` classification and the FP
/// filter's established-business check (spec ties both to the same pattern).
static BUSINESS_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(corp|inc|llc|ltd|co\b|merchant|store|shop|pay|bank|services)").unwrap()
});

pub fn looks_like_business_name(account_id: &str) -> bool {
    BUSINESS_NAME_RE.is_match(account_id)
}

/// One transaction-derived edge in the multigraph.
#[derive(Debug, Clone)]
pub struct Edge {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub timestamp: DateTime<Utc>,
    pub transaction_id: String,
}

/// Per-account aggregate attributes, as carried by a graph node.
#[derive(Debug, Clone)]
pub struct NodeAggregate {
    pub total_inflow: f64,
    pub total_outflow: f64,
    pub in_count: usize,
    pub out_count: usize,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub account_type: AccountType,
}

impl NodeAggregate {
    pub fn transaction_count(&self) -> usize {
        self.in_count + self.out_count
    }
}

/// Directed multigraph over account ids, plus the "simple projection"
/// (parallel edges collapsed) used by the cycle and shell detectors.
pub struct Graph {
    nodes: HashMap<String, NodeAggregate>,
    edges: Vec<Edge>,
    by_pair: HashMap<(String, String), Vec<usize>>,
    successors: HashMap<String, HashSet<String>>,
    predecessors: HashMap<String, HashSet<String>>,
}

impl Graph {
    /// Build the graph and per-account aggregates from a normalized table.
    ///
    /// Self-loops (`sender == receiver`) are dropped before aggregation.
    pub fn build(table: &TransactionTable) -> Self {
        let mut inflow_sum: HashMap<&str, f64> = HashMap::new();
        let mut inflow_count: HashMap<&str, usize> = HashMap::new();
        let mut outflow_sum: HashMap<&str, f64> = HashMap::new();
        let mut outflow_count: HashMap<&str, usize> = HashMap::new();
        let mut first_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();
        let mut last_seen: HashMap<&str, DateTime<Utc>> = HashMap::new();

        let touch_seen = |first: &mut HashMap<&str, DateTime<Utc>>,
                           last: &mut HashMap<&str, DateTime<Utc>>,
                           id: &str,
                           ts: DateTime<Utc>| {
            first
                .entry(id)
                .and_modify(|v| {
                    if ts < *v {
                        *v = ts;
                    }
                })
                .or_insert(ts);
            last.entry(id)
                .and_modify(|v| {
                    if ts > *v {
                        *v = ts;
                    }
                })
                .or_insert(ts);
        };

        for t in &table.transactions {
            *outflow_sum.entry(t.sender.as_str()).or_insert(0.0) += t.amount;
            *outflow_count.entry(t.sender.as_str()).or_insert(0) += 1;
            *inflow_sum.entry(t.receiver.as_str()).or_insert(0.0) += t.amount;
            *inflow_count.entry(t.receiver.as_str()).or_insert(0) += 1;
            touch_seen(&mut first_seen, &mut last_seen, &t.sender, t.timestamp);
            touch_seen(&mut first_seen, &mut last_seen, &t.receiver, t.timestamp);
        }

        let mut all_accounts: HashSet<&str> = HashSet::new();
        for t in &table.transactions {
            all_accounts.insert(t.sender.as_str());
            all_accounts.insert(t.receiver.as_str());
        }

        let mut nodes = HashMap::with_capacity(all_accounts.len());
        for acct in all_accounts {
            let total_inflow = *inflow_sum.get(acct).unwrap_or(&0.0);
            let total_outflow = *outflow_sum.get(acct).unwrap_or(&0.0);
            let in_count = *inflow_count.get(acct).unwrap_or(&0);
            let out_count = *outflow_count.get(acct).unwrap_or(&0);
            let transaction_count = in_count + out_count;

            let account_type = if transaction_count > 50 || looks_like_business_name(acct) {
                AccountType::Business
            } else {
                AccountType::Individual
            };

            nodes.insert(
                acct.to_string(),
                NodeAggregate {
                    total_inflow,
                    total_outflow,
                    in_count,
                    out_count,
                    first_seen: first_seen[acct],
                    last_seen: last_seen[acct],
                    account_type,
                },
            );
        }

        let mut edges = Vec::new();
        let mut by_pair: HashMap<(String, String), Vec<usize>> = HashMap::new();
        let mut successors: HashMap<String, HashSet<String>> = HashMap::new();
        let mut predecessors: HashMap<String, HashSet<String>> = HashMap::new();

        for t in &table.transactions {
            if t.sender == t.receiver {
                continue;
            }
            let idx = edges.len();
            edges.push(Edge {
                from: t.sender.clone(),
                to: t.receiver.clone(),
                amount: t.amount,
                timestamp: t.timestamp,
                transaction_id: t.transaction_id.clone().unwrap_or_default(),
            });
            by_pair
                .entry((t.sender.clone(), t.receiver.clone()))
                .or_default()
                .push(idx);
            successors
                .entry(t.sender.clone())
                .or_default()
                .insert(t.receiver.clone());
            predecessors
                .entry(t.receiver.clone())
                .or_default()
                .insert(t.sender.clone());
        }

        Graph {
            nodes,
            edges,
            by_pair,
            successors,
            predecessors,
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeAggregate> {
        self.nodes.get(id)
    }

    pub fn account_ids(&self) -> impl Iterator<Item = &str> {
        self.nodes.keys().map(|s| s.as_str())
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Every transaction recorded on the ordered pair `(from, to)`, in the
    /// order they appear in the source table (ascending timestamp).
    pub fn transactions_between(&self, from: &str, to: &str) -> Vec<&Edge> {
        self.edges_between(from, to)
    }

    /// Owned copy of the transactions on the ordered pair `(from, to)`.
    pub fn edges_between(&self, from: &str, to: &str) -> Vec<&Edge> {
        match self.by_pair.get(&(from.to_string(), to.to_string())) {
            Some(idxs) => idxs.iter().map(|&i| &self.edges[i]).collect(),
            None => Vec::new(),
        }
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.by_pair.contains_key(&(from.to_string(), to.to_string()))
    }

    /// Distinct successors of `id` in the simple projection.
    pub fn successors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.successors
            .get(id)
            .into_iter()
            .flat_map(|s| s.iter().map(|x| x.as_str()))
    }

    /// Distinct predecessors of `id` in the simple projection.
    pub fn predecessors(&self, id: &str) -> impl Iterator<Item = &str> {
        self.predecessors
            .get(id)
            .into_iter()
            .flat_map(|s| s.iter().map(|x| x.as_str()))
    }

    pub fn out_degree(&self, id: &str) -> usize {
        self.successors.get(id).map_or(0, |s| s.len())
    }

    pub fn in_degree(&self, id: &str) -> usize {
        self.predecessors.get(id).map_or(0, |s| s.len())
    }

    /// Union of predecessors and successors, deduplicated.
    pub fn connected_accounts(&self, id: &str) -> Vec<String> {
        let mut set: HashSet<String> = self.successors(id).map(|s| s.to_string()).collect();
        set.extend(self.predecessors(id).map(|s| s.to_string()));
        set.into_iter().collect()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// All inbound transactions to `id`, in table order (ascending timestamp).
    pub fn inflow_edges(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.to == id).collect()
    }

    /// All outbound transactions from `id`, in table order (ascending timestamp).
    pub fn outflow_edges(&self, id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.from == id).collect()
    }

    /// Build the frontend-facing projection: nodes enriched with score/ring/pattern
    /// data, edges collapsed to one entry per ordered pair with summed amount.
    pub fn to_graph_data(
        &self,
        scores: &HashMap<String, f64>,
        ring_map: &HashMap<String, Vec<String>>,
        pattern_map: &HashMap<String, Vec<String>>,
    ) -> GraphData {
        let mut nodes: Vec<GraphNode> = self
            .nodes
            .iter()
            .map(|(id, agg)| GraphNode {
                id: id.clone(),
                suspicion_score: *scores.get(id).unwrap_or(&0.0),
                ring_ids: ring_map.get(id).cloned().unwrap_or_default(),
                total_inflow: agg.total_inflow,
                total_outflow: agg.total_outflow,
                transaction_count: agg.transaction_count(),
                detected_patterns: pattern_map.get(id).cloned().unwrap_or_default(),
            })
            .collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));

        let mut edge_agg: HashMap<(String, String), (f64, usize)> = HashMap::new();
        for e in &self.edges {
            let entry = edge_agg.entry((e.from.clone(), e.to.clone())).or_insert((0.0, 0));
            entry.0 += e.amount;
            entry.1 += 1;
        }
        let mut edges: Vec<GraphEdge> = edge_agg
            .into_iter()
            .map(|((source, target), (amount, transaction_count))| GraphEdge {
                source,
                target,
                amount,
                transaction_count,
            })
            .collect();
        edges.sort_by(|a, b| (a.source.as_str(), a.target.as_str()).cmp(&(b.source.as_str(), b.target.as_str())));

        GraphData { nodes, edges }
    }
}

/// A node in the frontend visualization projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub suspicion_score: f64,
    pub ring_ids: Vec<String>,
    pub total_inflow: f64,
    pub total_outflow: f64,
    pub transaction_count: usize,
    pub detected_patterns: Vec<String>,
}

/// One collapsed multigraph edge in the frontend visualization projection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub amount: f64,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
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
    fn self_loops_are_dropped_from_edges_but_still_aggregated() {
        // Aggregation runs over every raw row; only the edge-insertion pass
        // (which feeds the detectors) drops sender == receiver rows.
        let t = table(&[("A", "A", 100.0, "2024-01-01T00:00:00Z")]);
        let g = Graph::build(&t);
        assert_eq!(g.edge_count(), 0);
        assert_eq!(g.node("A").unwrap().transaction_count(), 2);
    }

    #[test]
    fn aggregates_match_edges() {
        let t = table(&[
            ("A", "B", 100.0, "2024-01-01T00:00:00Z"),
            ("A", "C", 50.0, "2024-01-02T00:00:00Z"),
            ("B", "A", 25.0, "2024-01-03T00:00:00Z"),
        ]);
        let g = Graph::build(&t);
        let a = g.node("A").unwrap();
        assert_eq!(a.total_outflow, 150.0);
        assert_eq!(a.total_inflow, 25.0);
        assert_eq!(a.transaction_count(), 3);
        assert_eq!(g.edge_count(), 3);
        assert!(g.has_edge("A", "B"));
        assert_eq!(g.connected_accounts("A").len(), 2);
    }

    #[test]
    fn business_type_by_volume_or_name() {
        let mut rows = Vec::new();
        for i in 0..51 {
            rows.push(("HIGHVOL", "X", 1.0, "2024-01-01T00:00:00Z"));
            let _ = i;
        }
        let t = table(&rows);
        let g = Graph::build(&t);
        assert_eq!(g.node("HIGHVOL").unwrap().account_type, AccountType::Business);

        let t2 = table(&[("ACME_CORP", "X", 1.0, "2024-01-01T00:00:00Z")]);
        let g2 = Graph::build(&t2);
        assert_eq!(g2.node("ACME_CORP").unwrap().account_type, AccountType::Business);
    }

    #[test]
    fn build_twice_is_idempotent() {
        let t = table(&[
            ("A", "B", 100.0, "2024-01-01T00:00:00Z"),
            ("B", "C", 50.0, "2024-01-02T00:00:00Z"),
        ]);
        let g1 = Graph::build(&t);
        let g2 = Graph::build(&t);
        assert_eq!(g1.node_count(), g2.node_count());
        assert_eq!(g1.edge_count(), g2.edge_count());
        assert_eq!(
            g1.node("A").unwrap().total_outflow,
            g2.node("A").unwrap().total_outflow
        );
    }
}
