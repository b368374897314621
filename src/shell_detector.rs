//! Shell / pass-through chain detection — finds short paths that funnel
//! funds through one or more low-activity "shell" accounts between a
//! well-connected source and a well-connected sink.
//!
//! Source and sink candidates are not every node in the graph: they are the
//! neighbors of shell candidates (accounts with 1-3 total transactions),
//! ranked by degree and capped to the top 100 each, since a real shell chain
//! always touches at least one low-activity intermediate.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::graph::Graph;

pub const DEFAULT_MAX_CHAIN_LENGTH: usize = 6;
pub const DEFAULT_MAX_PATHS_PER_PAIR: usize = 50;
pub const DEFAULT_MAX_TOTAL_PATHS: usize = 2_000;
pub const DEFAULT_MIN_PASS_THROUGH_RATIO: f64 = 0.5;
pub const SHELL_CANDIDATE_MAX_TXN_COUNT: usize = 3;
pub const TOP_N_ENDPOINTS: usize = 100;

#[derive(Debug, Clone)]
pub struct ShellDetectorConfig {
    pub max_chain_length: usize,
    pub max_paths_per_pair: usize,
    pub max_total_paths: usize,
    pub min_pass_through_ratio: f64,
}

impl Default for ShellDetectorConfig {
    fn default() -> Self {
        Self {
            max_chain_length: DEFAULT_MAX_CHAIN_LENGTH,
            max_paths_per_pair: DEFAULT_MAX_PATHS_PER_PAIR,
            max_total_paths: DEFAULT_MAX_TOTAL_PATHS,
            min_pass_through_ratio: DEFAULT_MIN_PASS_THROUGH_RATIO,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShellResult {
    pub ring_id: String,
    pub chain: Vec<String>,
    pub chain_length: usize,
    pub total_amount: f64,
    pub pass_through_ratio: f64,
    pub source: String,
    pub sink: String,
}

pub fn detect_shell_chains(graph: &Graph, config: &ShellDetectorConfig) -> Vec<ShellResult> {
    let candidates: HashSet<&str> = graph
        .account_ids()
        .filter(|id| {
            let n = graph.node(id).map_or(0, |a| a.transaction_count());
            n > 0 && n <= SHELL_CANDIDATE_MAX_TXN_COUNT
        })
        .collect();

    if candidates.is_empty() {
        return Vec::new();
    }

    let mut neighbors: HashSet<&str> = HashSet::new();
    for c in &candidates {
        neighbors.extend(graph.predecessors(c));
        neighbors.extend(graph.successors(c));
    }
    let neighbors: Vec<&str> = neighbors.into_iter().filter(|n| !candidates.contains(n)).collect();

    let mut sources = neighbors.clone();
    sources.sort_by(|a, b| graph.out_degree(b).cmp(&graph.out_degree(a)));
    sources.truncate(TOP_N_ENDPOINTS);

    let mut sinks = neighbors;
    sinks.sort_by(|a, b| graph.in_degree(b).cmp(&graph.in_degree(a)));
    sinks.truncate(TOP_N_ENDPOINTS);

    let mut results = Vec::new();
    let mut seen_chains: HashSet<Vec<String>> = HashSet::new();

    'pairs: for &source in &sources {
        for &sink in &sinks {
            if source == sink {
                continue;
            }
            let paths = bounded_simple_paths(graph, source, sink, config.max_chain_length, config.max_paths_per_pair);
            for path in paths {
                let intermediates = &path[1..path.len() - 1];
                if intermediates.is_empty() {
                    continue;
                }
                let shell_count = intermediates.iter().filter(|n| candidates.contains(*n)).count();
                let ratio = shell_count as f64 / intermediates.len() as f64;
                if ratio < config.min_pass_through_ratio {
                    continue;
                }
                let key: Vec<String> = path.iter().map(|s| s.to_string()).collect();
                if !seen_chains.insert(key.clone()) {
                    continue;
                }

                let total_amount = chain_amount(graph, &path);
                results.push(ShellResult {
                    ring_id: String::new(),
                    chain: key,
                    chain_length: path.len(),
                    total_amount,
                    pass_through_ratio: ratio,
                    source: source.to_string(),
                    sink: sink.to_string(),
                });

                if results.len() >= config.max_total_paths {
                    break 'pairs;
                }
            }
        }
    }

    results
}

fn chain_amount(graph: &Graph, path: &[&str]) -> f64 {
    let mut total = 0.0;
    for i in 0..path.len() - 1 {
        let edges = graph.edges_between(path[i], path[i + 1]);
        total += edges.iter().map(|e| e.amount).sum::<f64>();
    }
    total
}

/// DFS enumeration of simple paths `source -> sink` of at most `max_length`
/// nodes, stopping once `limit` paths for this pair have been collected.
fn bounded_simple_paths<'g>(
    graph: &'g Graph,
    source: &'g str,
    sink: &'g str,
    max_length: usize,
    limit: usize,
) -> Vec<Vec<&'g str>> {
    let mut results = Vec::new();
    let mut path = vec![source];
    let mut on_path: HashSet<&str> = HashSet::new();
    on_path.insert(source);

    walk(graph, sink, max_length, limit, &mut path, &mut on_path, &mut results);
    results
}

fn walk<'g>(
    graph: &'g Graph,
    sink: &'g str,
    max_length: usize,
    limit: usize,
    path: &mut Vec<&'g str>,
    on_path: &mut HashSet<&'g str>,
    results: &mut Vec<Vec<&'g str>>,
) {
    if results.len() >= limit || path.len() > max_length {
        return;
    }
    let current = *path.last().unwrap();
    for next in graph.successors(current) {
        if results.len() >= limit {
            return;
        }
        if next == sink {
            if path.len() + 1 > max_length {
                continue;
            }
            let mut found = path.clone();
            found.push(next);
            results.push(found);
            continue;
        }
        if on_path.contains(next) || path.len() + 1 >= max_length {
            continue;
        }
        path.push(next);
        on_path.insert(next);
        walk(graph, sink, max_length, limit, path, on_path, results);
        on_path.remove(next);
        path.pop();
    }
}
