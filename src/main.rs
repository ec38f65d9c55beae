//! cycle-sentinel CLI
//!
//! Run fraud cycle detection from the command line.
//!
//! # Usage
//!
//! ```bash
//! # Run every detector over a network file and print the report
//! cycle-sentinel scan --input network.json
//!
//! # Same, with a config file and JSON output
//! cycle-sentinel scan --input network.json --config engine.json --format json
//!
//! # Graph analysis: cycles, cyclic components, negative cycles
//! cycle-sentinel cycles --input network.json --source ACC-0001
//!
//! # Generate a random network for testing
//! cycle-sentinel generate --accounts 10 --transfers 30
//! ```

use cycle_sentinel::config::EngineConfig;
use cycle_sentinel::core::account::AccountId;
use cycle_sentinel::core::error::Result;
use cycle_sentinel::detection::network::TransactionNetwork;
use cycle_sentinel::detection::record::CycleDetection;
use cycle_sentinel::detection::report::FraudDetectionReport;
use cycle_sentinel::detection::service::{CycleDetectionService, DetectionBatch, FailedDetection};
use cycle_sentinel::detection::store::InMemoryDetectionStore;
use cycle_sentinel::graph::analysis::NetworkAnalysis;
use cycle_sentinel::simulation::network_generator::{generate_random_network, NetworkConfig};
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"cycle-sentinel — fraud cycle detection and risk scoring

USAGE:
    cycle-sentinel <COMMAND> [OPTIONS]

COMMANDS:
    scan        Run every fraud detector and print a report
    cycles      Analyze cycles and negative cycles in the money-flow graph
    generate    Generate a random transaction network (for testing)
    help        Show this message

OPTIONS (scan, cycles):
    --input <FILE>      Path to JSON network file
    --config <FILE>     Path to JSON engine config (defaults otherwise)
    --format <FORMAT>   Output format: text (default) or json

OPTIONS (cycles):
    --source <ID>       Also run Bellman–Ford from this account

OPTIONS (generate):
    --accounts <N>      Number of accounts (default: 10)
    --transfers <N>     Number of money-flow transfers (default: 30)
    --seed <N>          Fixed random seed
    --output <FILE>     Write to file instead of stdout

EXAMPLES:
    cycle-sentinel scan --input network.json
    cycle-sentinel scan --input network.json --format json
    cycle-sentinel cycles --input network.json --source ACC-0000
    cycle-sentinel generate --accounts 20 --transfers 60 --seed 7"#
    );
}

/// Options shared by the commands that read a network.
struct InputOptions {
    input_path: String,
    config_path: Option<String>,
    format: String,
    source: Option<String>,
}

fn take_value(args: &[String], i: usize, flag: &str, what: &str) -> String {
    args.get(i).cloned().unwrap_or_else(|| {
        eprintln!("{} requires {}", flag, what);
        process::exit(1);
    })
}

fn parse_input_options(args: &[String], allow_source: bool) -> InputOptions {
    let mut input_path = None;
    let mut config_path = None;
    let mut format = "text".to_string();
    let mut source = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--input" => {
                i += 1;
                input_path = Some(take_value(args, i, "--input", "a file path"));
            }
            "--config" => {
                i += 1;
                config_path = Some(take_value(args, i, "--config", "a file path"));
            }
            "--format" => {
                i += 1;
                format = take_value(args, i, "--format", "'text' or 'json'");
            }
            "--source" if allow_source => {
                i += 1;
                source = Some(take_value(args, i, "--source", "an account id"));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let input_path = input_path.unwrap_or_else(|| {
        eprintln!("Error: --input <FILE> is required");
        process::exit(1);
    });

    InputOptions {
        input_path,
        config_path,
        format,
        source,
    }
}

fn load_config(path: Option<&str>) -> EngineConfig {
    match path {
        Some(path) => EngineConfig::from_file(path).unwrap_or_else(|e| {
            eprintln!("Error: {}", e);
            process::exit(1);
        }),
        None => EngineConfig::default(),
    }
}

fn load_network(path: &str, config: &EngineConfig) -> TransactionNetwork {
    let network = TransactionNetwork::from_file(path).unwrap_or_else(|e| {
        eprintln!("Error loading network '{}': {}", path, e);
        eprintln!("Expected format:");
        eprintln!(
            r#"{{
  "transactions": [
    {{ "from": "ACC-1", "to": "ACC-2", "amount": 15000.0, "label": "TRANSFER" }}
  ],
  "card_usages": [],
  "identity_links": []
}}"#
        );
        process::exit(1);
    });
    network
        .with_money_flow_labels(config.detection.money_flow_labels.clone())
        .with_relationship_label(config.detection.identity_relation_label.clone())
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        process::exit(1);
    })
}

/// JSON output schema for a scan.
#[derive(serde::Serialize)]
struct ScanOutput {
    report: FraudDetectionReport,
    detections: Vec<CycleDetection>,
    failed: Vec<FailedDetection>,
}

fn cmd_scan(args: &[String]) {
    let options = parse_input_options(args, false);
    let config = load_config(options.config_path.as_deref());
    let network = load_network(&options.input_path, &config);
    let relation_label = config.detection.identity_relation_label.clone();
    let service = CycleDetectionService::with_config(network, InMemoryDetectionStore::new(), config);

    let sweeps: [(&str, Result<DetectionBatch>); 4] = [
        ("circular money flows", service.detect_circular_money_flows()),
        ("credit card loops", service.detect_credit_card_fraud_loops()),
        ("identity theft loops", service.detect_identity_theft_loops()),
        ("generic cycles", service.detect_all_cycles(&relation_label)),
    ];

    let mut failed = Vec::new();
    for (name, outcome) in sweeps {
        match outcome {
            Ok(batch) => failed.extend(batch.failed),
            Err(e) => {
                eprintln!("Error detecting {}: {}", name, e);
                process::exit(1);
            }
        }
    }

    let report = service.generate_fraud_detection_report().unwrap_or_else(|e| {
        eprintln!("Error building report: {}", e);
        process::exit(1);
    });
    let detections = service.all_cycles().unwrap_or_else(|e| {
        eprintln!("Error reading detections: {}", e);
        process::exit(1);
    });

    if options.format == "json" {
        let output = ScanOutput {
            report,
            detections,
            failed,
        };
        println!("{}", to_json(&output));
    } else {
        println!("{}", report);
        for record in &detections {
            let accounts: Vec<String> =
                record.affected_accounts().iter().map(|a| a.to_string()).collect();
            println!(
                "  [{}] {} {} risk={:.2} len={} amount={:.2}",
                record.severity(),
                record.cycle_id(),
                record.fraud_pattern(),
                record.risk_score(),
                record.cycle_length(),
                record.total_amount()
            );
            println!("      {}", accounts.join(", "));
        }
        for f in &failed {
            println!("  [FAILED] {}: {}", f.fraud_pattern, f.reason);
        }
    }
}

fn cmd_cycles(args: &[String]) {
    let options = parse_input_options(args, true);
    let config = load_config(options.config_path.as_deref());
    let network = load_network(&options.input_path, &config);
    let graph = network.money_flow_graph();
    let source = options.source.map(AccountId::new);

    let analysis = NetworkAnalysis::run(
        &graph,
        source.as_ref(),
        &config.budget,
        config.detection.top_suspects,
    )
    .unwrap_or_else(|e| {
        eprintln!("Error analyzing network: {}", e);
        process::exit(1);
    });

    if options.format == "json" {
        println!("{}", to_json(&analysis));
        return;
    }

    println!(
        "Accounts: {}  Transactions: {}",
        analysis.node_count, analysis.edge_count
    );
    if analysis.cycles.is_empty() {
        println!("No cycles detected.");
    } else {
        for (i, cycle) in analysis.cycles.iter().enumerate() {
            let nodes: Vec<String> = cycle.nodes().iter().map(|a| a.to_string()).collect();
            println!(
                "  Cycle {}: {}  (weight {:.2})",
                i,
                nodes.join(" → "),
                cycle.total_weight(&graph)
            );
        }
        println!("\nAverage cycle length: {:.2}", analysis.average_cycle_length);
    }

    for (i, component) in analysis.cyclic_components.iter().enumerate() {
        let accounts: Vec<String> = component.accounts.iter().map(|a| a.to_string()).collect();
        println!("  Cyclic group {}: {}", i, accounts.join(", "));
    }
    if !analysis.suspicious_accounts.is_empty() {
        let accounts: Vec<String> =
            analysis.suspicious_accounts.iter().map(|a| a.to_string()).collect();
        println!("Most suspicious: {}", accounts.join(", "));
    }

    if let Some(report) = &analysis.reachable_negative_cycle {
        println!(
            "Negative cycle reachable from {}: {}",
            report.source,
            if report.has_negative_cycle { "YES" } else { "no" }
        );
    }
    match &analysis.negative_cycle_accounts {
        Some(nodes) if !nodes.is_empty() => {
            let accounts: Vec<String> = nodes.iter().map(|a| a.to_string()).collect();
            println!("Accounts on negative cycles: {}", accounts.join(", "));
        }
        Some(_) => println!("No negative cycles."),
        None => println!("Negative-cycle scan skipped (graph too large)."),
    }
}

fn cmd_generate(args: &[String]) {
    let mut accounts = 10usize;
    let mut transfers = 30usize;
    let mut seed = None;
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--accounts" => {
                i += 1;
                accounts = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--accounts requires a number");
                        process::exit(1);
                    });
            }
            "--transfers" => {
                i += 1;
                transfers = args
                    .get(i)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or_else(|| {
                        eprintln!("--transfers requires a number");
                        process::exit(1);
                    });
            }
            "--seed" => {
                i += 1;
                seed = Some(args.get(i).and_then(|s| s.parse().ok()).unwrap_or_else(|| {
                    eprintln!("--seed requires a number");
                    process::exit(1);
                }));
            }
            "--output" => {
                i += 1;
                output_path = Some(take_value(args, i, "--output", "a file path"));
            }
            _ => {
                eprintln!("Unknown option: {}", args[i]);
                process::exit(1);
            }
        }
        i += 1;
    }

    let config = NetworkConfig {
        account_count: accounts,
        avg_transfers_per_account: transfers / accounts.max(1),
        seed,
        ..Default::default()
    };

    let data = generate_random_network(&config).to_file_data();
    let json = to_json(&data);

    if let Some(path) = output_path {
        fs::write(&path, &json).unwrap_or_else(|e| {
            eprintln!("Error writing to '{}': {}", path, e);
            process::exit(1);
        });
        eprintln!(
            "Generated {} transactions across {} accounts → {}",
            data.transactions.len(),
            accounts,
            path
        );
    } else {
        println!("{}", json);
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "scan" => cmd_scan(rest),
        "cycles" => cmd_cycles(rest),
        "generate" => cmd_generate(rest),
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
