//! Scoring and aggregation — turns the raw detector output into the
//! per-account suspicion scores, [`SuspiciousAccount`] list, and
//! [`FraudRing`] groupings that make up an [`AnalysisResult`].

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::config::PipelineConfig;
use crate::cycle_detector::{self, CycleResult};
use crate::fp_filter::{self, AccountProfile};
use crate::graph::Graph;
use crate::shell_detector::{self, ShellResult};
use crate::smurfing_detector::{self, FanDirection, SmurfingResult};
use crate::transaction::AccountType;
use crate::transaction_table::TransactionTable;

pub const CYCLE_LENGTH_FACTOR: f64 = 20.0;
pub const CYCLE_HIGH_VALUE_BONUS: f64 = 10.0;
pub const CYCLE_HIGH_VALUE_THRESHOLD: f64 = 10_000.0;

pub const SMURF_BASE_CONTRIBUTION: f64 = 15.0;
pub const SMURF_HIGH_UNIQUE_BONUS: f64 = 5.0;
pub const SMURF_HIGH_UNIQUE_THRESHOLD: usize = 20;
pub const SMURF_HIGH_VELOCITY_BONUS: f64 = 10.0;
pub const SMURF_HIGH_VELOCITY_THRESHOLD: f64 = 5_000.0;

pub const SHELL_CONTRIBUTION: f64 = 30.0;

pub const PAYROLL_SUPPRESSION: f64 = 30.0;
pub const MERCHANT_SUPPRESSION: f64 = 25.0;
pub const SALARY_SUPPRESSION: f64 = 20.0;
pub const ESTABLISHED_BUSINESS_SUPPRESSION: f64 = 35.0;

pub const RING_BOOST_THRESHOLD: f64 = 70.0;
pub const RING_BOOST_FACTOR: f64 = 1.2;

/// `20 * (6 - length)`, +10 if the cycle moved more than $10,000 total.
fn cycle_contribution(cycle: &CycleResult) -> f64 {
    let mut contribution = CYCLE_LENGTH_FACTOR * (6.0 - cycle.cycle_length as f64);
    if cycle.total_amount > CYCLE_HIGH_VALUE_THRESHOLD {
        contribution += CYCLE_HIGH_VALUE_BONUS;
    }
    contribution
}

/// Base 15, +5 if more than 20 unique counterparties, +10 if velocity
/// exceeds $5,000/hour.
fn smurf_contribution(smurf: &SmurfingResult) -> f64 {
    let mut contribution = SMURF_BASE_CONTRIBUTION;
    if smurf.unique_counterparties > SMURF_HIGH_UNIQUE_THRESHOLD {
        contribution += SMURF_HIGH_UNIQUE_BONUS;
    }
    if smurf.velocity > SMURF_HIGH_VELOCITY_THRESHOLD {
        contribution += SMURF_HIGH_VELOCITY_BONUS;
    }
    contribution
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RingType {
    Cycle,
    Shell,
    Smurf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudRing {
    pub ring_id: String,
    pub ring_type: RingType,
    pub accounts: Vec<String>,
    pub total_amount: f64,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    pub account: String,
    pub account_type: AccountType,
    pub suspicion_score: f64,
    pub detected_patterns: Vec<String>,
    pub ring_ids: Vec<String>,
    pub total_inflow: f64,
    pub total_outflow: f64,
    pub transaction_count: usize,
    pub connected_accounts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_transactions: usize,
    pub total_accounts_analyzed: usize,
    pub total_transaction_volume: f64,
    pub num_cycles: usize,
    pub num_smurfing_patterns: usize,
    pub num_shell_chains: usize,
    pub suspicious_accounts_flagged: usize,
    pub fraud_rings_detected: usize,
    pub processing_time_seconds: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub summary: Summary,
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    pub fraud_rings: Vec<FraudRing>,
    pub cycles: Vec<CycleResult>,
    pub smurfing: Vec<SmurfingResult>,
    pub shells: Vec<ShellResult>,
}

/// Run every detector and filter over `table` using the default pipeline
/// configuration and assemble the final result.
pub fn analyze(table: &TransactionTable) -> AnalysisResult {
    analyze_with_config(table, &PipelineConfig::default())
}

/// Same as [`analyze`] but with caller-supplied detector thresholds.
pub fn analyze_with_config(table: &TransactionTable, config: &PipelineConfig) -> AnalysisResult {
    let started = std::time::Instant::now();
    let graph = Graph::build(table);

    let cycles = cycle_detector::detect_cycles(&graph, &config.cycle);
    let mut shells = shell_detector::detect_shell_chains(&graph, &config.shell);
    let mut smurfing = smurfing_detector::detect_smurfing(&graph, &config.smurfing);

    assign_shell_ring_ids(&mut shells, cycles.len());
    assign_smurf_ring_ids(&mut smurfing, cycles.len() + shells.len());

    let profiles = fp_filter::build_profiles(&graph);

    let (scores, pattern_map, ring_map) = calculate_scores(&graph, &cycles, &smurfing, &shells, &profiles);

    let suspicious_accounts = build_suspicious_accounts(&graph, &scores, &pattern_map, &ring_map);
    let fraud_rings = build_fraud_rings(&cycles, &shells, &smurfing, &scores);

    let total_transaction_volume = table.total_volume();
    let summary = Summary {
        total_transactions: table.len(),
        total_accounts_analyzed: graph.node_count(),
        total_transaction_volume,
        num_cycles: cycles.len(),
        num_smurfing_patterns: smurfing.len(),
        num_shell_chains: shells.len(),
        suspicious_accounts_flagged: suspicious_accounts.len(),
        fraud_rings_detected: fraud_rings.len(),
        processing_time_seconds: started.elapsed().as_secs_f64(),
    };

    AnalysisResult {
        summary,
        suspicious_accounts,
        fraud_rings,
        cycles,
        smurfing,
        shells,
    }
}

fn assign_shell_ring_ids(shells: &mut [ShellResult], start: usize) {
    for (i, shell) in shells.iter_mut().enumerate() {
        shell.ring_id = format!("RING_{:03}", start + i + 1);
    }
}

fn assign_smurf_ring_ids(smurfing: &mut [SmurfingResult], start: usize) {
    for (i, s) in smurfing.iter_mut().enumerate() {
        s.ring_id = format!("RING_{:03}", start + i + 1);
    }
}

type ScoreMaps = (HashMap<String, f64>, HashMap<String, Vec<String>>, HashMap<String, Vec<String>>);

/// Additive per-detection contributions, then sequential false-positive
/// suppression with a non-negative floor, clamped to `[0, 100]`.
fn calculate_scores(
    graph: &Graph,
    cycles: &[CycleResult],
    smurfing: &[SmurfingResult],
    shells: &[ShellResult],
    profiles: &HashMap<String, AccountProfile>,
) -> ScoreMaps {
    let mut raw: HashMap<String, f64> = HashMap::new();
    let mut patterns: HashMap<String, Vec<String>> = HashMap::new();
    let mut rings: HashMap<String, Vec<String>> = HashMap::new();

    let mut tag = |account: &str, pattern: &str, ring_id: &str, contribution: f64| {
        *raw.entry(account.to_string()).or_insert(0.0) += contribution;
        let p = patterns.entry(account.to_string()).or_default();
        if !p.iter().any(|x| x == pattern) {
            p.push(pattern.to_string());
        }
        let r = rings.entry(account.to_string()).or_default();
        if !r.iter().any(|x| x == ring_id) {
            r.push(ring_id.to_string());
        }
    };

    for cycle in cycles {
        let contribution = cycle_contribution(cycle);
        for account in &cycle.accounts {
            tag(account, "cycle", &cycle.ring_id, contribution);
        }
    }
    for shell in shells {
        for account in &shell.chain {
            tag(account, "shell_chain", &shell.ring_id, SHELL_CONTRIBUTION);
        }
    }
    for smurf in smurfing {
        let pattern = match smurf.direction {
            FanDirection::In => "smurfing_fan_in",
            FanDirection::Out => "smurfing_fan_out",
        };
        tag(&smurf.account, pattern, &smurf.ring_id, smurf_contribution(smurf));
    }

    let mut scores: HashMap<String, f64> = HashMap::new();
    for account in graph.account_ids() {
        let mut score = *raw.get(account).unwrap_or(&0.0);
        if let Some(profile) = profiles.get(account) {
            if profile.is_payroll {
                score = (score - PAYROLL_SUPPRESSION).max(0.0);
            }
            if profile.is_merchant {
                score = (score - MERCHANT_SUPPRESSION).max(0.0);
            }
            if profile.is_salary {
                score = (score - SALARY_SUPPRESSION).max(0.0);
            }
            if profile.is_established_business {
                score = (score - ESTABLISHED_BUSINESS_SUPPRESSION).max(0.0);
            }
        }
        let clamped = score.min(100.0);
        scores.insert(account.to_string(), (clamped * 10.0).round() / 10.0);
    }

    (scores, patterns, rings)
}

fn build_suspicious_accounts(
    graph: &Graph,
    scores: &HashMap<String, f64>,
    pattern_map: &HashMap<String, Vec<String>>,
    ring_map: &HashMap<String, Vec<String>>,
) -> Vec<SuspiciousAccount> {
    let mut accounts: Vec<SuspiciousAccount> = pattern_map
        .keys()
        .filter_map(|account| {
            let score = *scores.get(account)?;
            if score <= 0.0 {
                return None;
            }
            let node = graph.node(account)?;
            Some(SuspiciousAccount {
                account: account.clone(),
                account_type: node.account_type,
                suspicion_score: score,
                detected_patterns: pattern_map.get(account).cloned().unwrap_or_default(),
                ring_ids: ring_map.get(account).cloned().unwrap_or_default(),
                total_inflow: node.total_inflow,
                total_outflow: node.total_outflow,
                transaction_count: node.transaction_count(),
                connected_accounts: graph.connected_accounts(account),
            })
        })
        .collect();

    accounts.sort_by(|a, b| b.suspicion_score.partial_cmp(&a.suspicion_score).unwrap());
    accounts
}

fn build_fraud_rings(
    cycles: &[CycleResult],
    shells: &[ShellResult],
    smurfing: &[SmurfingResult],
    scores: &HashMap<String, f64>,
) -> Vec<FraudRing> {
    let mut rings = Vec::new();

    for cycle in cycles {
        let risk_score = ring_risk_score(&cycle.accounts, scores);
        rings.push(FraudRing {
            ring_id: cycle.ring_id.clone(),
            ring_type: RingType::Cycle,
            accounts: cycle.accounts.clone(),
            total_amount: cycle.total_amount,
            risk_score,
        });
    }

    for shell in shells {
        let risk_score = ring_risk_score(&shell.chain, scores);
        rings.push(FraudRing {
            ring_id: shell.ring_id.clone(),
            ring_type: RingType::Shell,
            accounts: shell.chain.clone(),
            total_amount: shell.total_amount,
            risk_score,
        });
    }

    for smurf in smurfing {
        let mut accounts = vec![smurf.account.clone()];
        accounts.extend(smurf.counterparties.iter().cloned());
        let risk_score = ring_risk_score(&accounts, scores);
        rings.push(FraudRing {
            ring_id: smurf.ring_id.clone(),
            ring_type: RingType::Smurf,
            accounts,
            total_amount: smurf.total_amount,
            risk_score,
        });
    }

    rings.sort_by(|a, b| b.risk_score.partial_cmp(&a.risk_score).unwrap());
    rings
}

fn ring_risk_score(accounts: &[String], scores: &HashMap<String, f64>) -> f64 {
    let member_scores: Vec<f64> = accounts.iter().map(|a| *scores.get(a).unwrap_or(&0.0)).collect();
    if member_scores.is_empty() {
        return 0.0;
    }
    let avg = member_scores.iter().sum::<f64>() / member_scores.len() as f64;
    let all_high = member_scores.iter().all(|s| *s > RING_BOOST_THRESHOLD);
    let boosted = if all_high { avg * RING_BOOST_FACTOR } else { avg };
    let clamped = boosted.min(100.0);
    (clamped * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

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
    fn a_clean_triangle_cycle_is_flagged_and_scored() {
        let t = table(&[
            ("A", "B", 1000.0, "2024-01-01T00:00:00Z"),
            ("B", "C", 950.0, "2024-01-01T10:00:00Z"),
            ("C", "A", 900.0, "2024-01-01T20:00:00Z"),
        ]);
        let result = analyze(&t);
        assert_eq!(result.summary.num_cycles, 1);
        let a = result
            .suspicious_accounts
            .iter()
            .find(|s| s.account == "A")
            .unwrap();
        assert!(a.suspicion_score > 0.0);
        assert!(a.detected_patterns.contains(&"cycle".to_string()));
    }

    #[test]
    fn a_cycle_spanning_more_than_72_hours_is_not_flagged() {
        let t = table(&[
            ("A", "B", 1000.0, "2024-01-01T00:00:00Z"),
            ("B", "C", 950.0, "2024-01-10T00:00:00Z"),
            ("C", "A", 900.0, "2024-01-20T00:00:00Z"),
        ]);
        let result = analyze(&t);
        assert_eq!(result.summary.num_cycles, 0);
    }

    #[test]
    fn fan_out_smurfing_to_ten_unique_receivers_is_flagged() {
        let rows: Vec<(String, String, f64, String)> = (0..10)
            .map(|i| {
                (
                    "HUB".to_string(),
                    format!("RECEIVER{i}"),
                    50.0,
                    format!("2024-01-01T{:02}:00:00Z", i),
                )
            })
            .collect();
        let rows: Vec<(&str, &str, f64, &str)> = rows
            .iter()
            .map(|(s, r, a, ts)| (s.as_str(), r.as_str(), *a, ts.as_str()))
            .collect();
        let t = table(&rows);
        let result = analyze(&t);
        assert_eq!(result.summary.num_smurfing_patterns, 1);
        let hub = result
            .suspicious_accounts
            .iter()
            .find(|s| s.account == "HUB")
            .unwrap();
        assert!(hub.detected_patterns.contains(&"smurfing_fan_out".to_string()));
    }

    #[test]
    fn a_shell_chain_through_a_low_activity_intermediate_is_flagged() {
        let t = table(&[
            ("SOURCE", "SHELL", 500.0, "2024-01-01T00:00:00Z"),
            ("SHELL", "SINK", 480.0, "2024-01-01T01:00:00Z"),
            ("SOURCE", "OTHER1", 1.0, "2024-01-01T00:00:00Z"),
            ("SOURCE", "OTHER2", 1.0, "2024-01-01T00:00:00Z"),
            ("SOURCE", "OTHER3", 1.0, "2024-01-01T00:00:00Z"),
            ("SOURCE", "OTHER4", 1.0, "2024-01-01T00:00:00Z"),
            ("OTHER5", "SINK", 1.0, "2024-01-01T00:00:00Z"),
            ("OTHER6", "SINK", 1.0, "2024-01-01T00:00:00Z"),
            ("OTHER7", "SINK", 1.0, "2024-01-01T00:00:00Z"),
            ("OTHER8", "SINK", 1.0, "2024-01-01T00:00:00Z"),
        ]);
        let result = analyze(&t);
        assert_eq!(result.summary.num_shell_chains, 1);
        assert!(result
            .fraud_rings
            .iter()
            .any(|r| r.ring_type == RingType::Shell));
    }

    #[test]
    fn payroll_deposits_suppress_the_score_of_an_otherwise_flagged_account() {
        // WORKER sits on a length-3, sub-$10k 72h cycle (raw contribution
        // 20*(6-3)=60) and also receives regular payroll from EMPLOYER, whose
        // deposits dominate WORKER's inflows by count (4 of 5) with a flat
        // amount and ~monthly cadence.
        let rows = vec![
            ("A", "WORKER", 2000.0, "2024-01-01T00:00:00Z"),
            ("WORKER", "C", 1900.0, "2024-01-01T10:00:00Z"),
            ("C", "A", 1800.0, "2024-01-01T20:00:00Z"),
            ("EMPLOYER", "WORKER", 2000.0, "2023-10-01T00:00:00Z"),
            ("EMPLOYER", "WORKER", 2000.0, "2023-10-31T00:00:00Z"),
            ("EMPLOYER", "WORKER", 2000.0, "2023-12-01T00:00:00Z"),
            ("EMPLOYER", "WORKER", 2000.0, "2024-01-02T00:00:00Z"),
        ];
        let t = table(&rows);
        let result = analyze(&t);
        let worker = result
            .suspicious_accounts
            .iter()
            .find(|s| s.account == "WORKER")
            .unwrap();
        assert!(worker.suspicion_score < 60.0);
    }

    #[test]
    fn established_business_accounts_are_never_flagged() {
        let mut rows = Vec::new();
        for i in 0..25 {
            rows.push((
                format!("CUST{i}"),
                "ACME_CORP".to_string(),
                10.0,
                format!("2023-{:02}-01T00:00:00Z", (i % 12) + 1),
            ));
        }
        rows.push(("ACME_CORP".to_string(), "X".to_string(), 10.0, "2024-06-01T00:00:00Z".to_string()));
        let rows: Vec<(&str, &str, f64, &str)> = rows
            .iter()
            .map(|(s, r, a, ts)| (s.as_str(), r.as_str(), *a, ts.as_str()))
            .collect();
        let t = table(&rows);
        let result = analyze(&t);
        assert!(!result
            .suspicious_accounts
            .iter()
            .any(|s| s.account == "ACME_CORP"));
    }

    #[test]
    fn established_business_suppression_subtracts_rather_than_zeroes() {
        // X: a length-3, sub-$10k cycle (60) plus a shell-chain tag (30) gives
        // a raw score of 90; established-business suppression must land it at
        // 90 - 35 = 55, not force it to zero.
        let t = table(&[("X", "Y", 10.0, "2024-01-01T00:00:00Z")]);
        let graph = Graph::build(&t);
        let cycles = vec![CycleResult {
            ring_id: "RING_001".to_string(),
            accounts: vec!["X".to_string()],
            cycle_length: 3,
            total_amount: 500.0,
            start_time: Utc::now(),
            end_time: Utc::now(),
        }];
        let shells = vec![ShellResult {
            ring_id: "RING_002".to_string(),
            chain: vec!["X".to_string()],
            chain_length: 3,
            total_amount: 500.0,
            pass_through_ratio: 1.0,
            source: "X".to_string(),
            sink: "X".to_string(),
        }];
        let smurfing: Vec<SmurfingResult> = Vec::new();
        let mut profiles = HashMap::new();
        profiles.insert(
            "X".to_string(),
            AccountProfile {
                account: "X".to_string(),
                is_payroll: false,
                is_merchant: false,
                is_salary: false,
                is_established_business: true,
            },
        );

        let (scores, _, _) = calculate_scores(&graph, &cycles, &smurfing, &shells, &profiles);
        assert_eq!(scores["X"], 55.0);
    }
}
