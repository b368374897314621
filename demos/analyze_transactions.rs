//! Run the fraud ring pipeline over a CSV file and print a summary.
//!
//! Usage: `cargo run --example analyze_transactions -- path/to/transactions.csv`

use std::env;
use std::fs;
use std::process;

use fraud_ring_detector::analyze_csv;

fn main() {
    let path = match env::args().nth(1) {
        Some(p) => p,
        None => {
            eprintln!("usage: analyze_transactions <csv-file>");
            process::exit(2);
        }
    };

    let bytes = fs::read(&path).unwrap_or_else(|e| {
        eprintln!("could not read {path}: {e}");
        process::exit(1);
    });

    let result = analyze_csv(&bytes).unwrap_or_else(|e| {
        eprintln!("analysis failed: {e}");
        process::exit(1);
    });

    println!(
        "{} transactions, {} accounts, ${:.2} total volume (in {:.3}s)",
        result.summary.total_transactions,
        result.summary.total_accounts_analyzed,
        result.summary.total_transaction_volume,
        result.summary.processing_time_seconds
    );
    println!(
        "{} cycles, {} smurfing patterns, {} shell chains, {} fraud rings",
        result.summary.num_cycles,
        result.summary.num_smurfing_patterns,
        result.summary.num_shell_chains,
        result.summary.fraud_rings_detected
    );

    for account in result.suspicious_accounts.iter().take(10) {
        println!(
            "  {:<20} score={:<6.1} patterns={:?}",
            account.account, account.suspicion_score, account.detected_patterns
        );
    }
}
