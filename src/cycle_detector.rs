//! Circular flow detection — enumerates simple directed cycles in the
//! simple projection and keeps only the temporally coherent ones.
//!
//! Cycles are found with a bounded DFS rooted at each node in turn,
//! restricted to neighbors whose id is lexicographically >= the root.
//! That rule is the usual least-vertex canonicalization: every simple
//! cycle is discovered exactly once, from its lexicographically smallest
//! member, instead of once per rotation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::graph::Graph;

pub const DEFAULT_MIN_LENGTH: usize = 3;
pub const DEFAULT_MAX_LENGTH: usize = 5;
pub const DEFAULT_MAX_CYCLES: usize = 5_000;
pub const DEFAULT_TEMPORAL_WINDOW_HOURS: i64 = 72;

#[derive(Debug, Clone)]
pub struct CycleDetectorConfig {
    pub min_length: usize,
    pub max_length: usize,
    pub max_cycles: usize,
    pub temporal_window_hours: i64,
}

impl Default for CycleDetectorConfig {
    fn default() -> Self {
        Self {
            min_length: DEFAULT_MIN_LENGTH,
            max_length: DEFAULT_MAX_LENGTH,
            max_cycles: DEFAULT_MAX_CYCLES,
            temporal_window_hours: DEFAULT_TEMPORAL_WINDOW_HOURS,
        }
    }
}

/// A single temporally coherent circular flow of funds, A -> B -> ... -> A.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub ring_id: String,
    pub accounts: Vec<String>,
    pub cycle_length: usize,
    pub total_amount: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Enumerate simple cycles of length `min_length..=max_length`, capped at
/// `max_cycles` and filtered to those whose involved transactions all fall
/// within a `temporal_window_hours` window. Gives up gracefully (returning
/// whatever was found so far) once the cap is hit.
pub fn detect_cycles(graph: &Graph, config: &CycleDetectorConfig) -> Vec<CycleResult> {
    let mut roots: Vec<&str> = graph.account_ids().collect();
    roots.sort_unstable();

    let mut found = Vec::new();
    let mut ring_counter = 0usize;

    'roots: for root in &roots {
        let mut path: Vec<&str> = vec![root];
        let mut on_path: std::collections::HashSet<&str> = std::collections::HashSet::new();
        on_path.insert(root);

        let mut stack: Vec<std::vec::IntoIter<&str>> = vec![successors_at_least(graph, root, root)];

        while let Some(frontier) = stack.last_mut() {
            match frontier.next() {
                Some(next) => {
                    if next == *root {
                        if path.len() >= config.min_length {
                            if let Some(result) =
                                evaluate_cycle(graph, &path, config, &mut ring_counter)
                            {
                                found.push(result);
                                if found.len() >= config.max_cycles {
                                    break 'roots;
                                }
                            }
                        }
                        continue;
                    }
                    if on_path.contains(next) || path.len() >= config.max_length {
                        continue;
                    }
                    path.push(next);
                    on_path.insert(next);
                    stack.push(successors_at_least(graph, next, root));
                }
                None => {
                    stack.pop();
                    if let Some(removed) = path.pop() {
                        on_path.remove(removed);
                    }
                }
            }
        }
    }

    found
}

fn successors_at_least<'g>(graph: &'g Graph, from: &str, root: &'g str) -> std::vec::IntoIter<&'g str> {
    let mut next: Vec<&str> = graph
        .successors(from)
        .filter(|s| *s >= root)
        .collect();
    next.sort_unstable();
    next.into_iter()
}

fn evaluate_cycle(
    graph: &Graph,
    path: &[&str],
    config: &CycleDetectorConfig,
    ring_counter: &mut usize,
) -> Option<CycleResult> {
    let mut hop_amount = 0.0;
    let mut min_ts: Option<DateTime<Utc>> = None;
    let mut max_ts: Option<DateTime<Utc>> = None;

    for i in 0..path.len() {
        let from = path[i];
        let to = path[(i + 1) % path.len()];
        let edges = graph.edges_between(from, to);
        if edges.is_empty() {
            return None;
        }
        hop_amount += edges.iter().map(|e| e.amount).sum::<f64>();
        for e in &edges {
            min_ts = Some(min_ts.map_or(e.timestamp, |m| m.min(e.timestamp)));
            max_ts = Some(max_ts.map_or(e.timestamp, |m| m.max(e.timestamp)));
        }
    }

    let (start_time, end_time) = (min_ts?, max_ts?);
    if end_time - start_time > Duration::hours(config.temporal_window_hours) {
        return None;
    }

    *ring_counter += 1;
    let ring_id = format!("RING_{:03}", *ring_counter);

    Some(CycleResult {
        ring_id,
        accounts: path.iter().map(|s| s.to_string()).collect(),
        cycle_length: path.len(),
        total_amount: hop_amount,
        start_time,
        end_time,
    })
}
