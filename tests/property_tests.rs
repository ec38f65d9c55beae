use cycle_sentinel::core::account::AccountId;
use cycle_sentinel::detection::record::{CycleDetection, CycleStatus, FraudPattern};
use cycle_sentinel::detection::report::FraudDetectionReport;
use cycle_sentinel::graph::budget::{ComputeBudget, Deadline};
use cycle_sentinel::graph::cycle_detection::{find_cycles, has_cycle};
use cycle_sentinel::graph::negative_cycle::{BellmanFord, FloydWarshall};
use cycle_sentinel::graph::path_search::enumerate_closed_paths;
use cycle_sentinel::graph::scc::{cyclic_components, find_sccs};
use cycle_sentinel::graph::transaction_graph::TransactionGraph;
use cycle_sentinel::risk::classifier::{RiskPolicy, Severity};
use petgraph::graph::DiGraph;
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

const MAX_NODES: usize = 7;

fn account(i: usize) -> AccountId {
    AccountId::new(format!("N{}", i))
}

/// Graphs over up to `MAX_NODES` accounts with integer weights and no
/// self-transfers.
fn arb_graph() -> impl Strategy<Value = TransactionGraph> {
    prop::collection::vec((0..MAX_NODES, 0..MAX_NODES, -5i32..20), 0..18).prop_map(|edges| {
        let mut graph = TransactionGraph::new();
        for (from, to, weight) in edges {
            if from != to {
                graph.add_edge(account(from), account(to), weight as f64);
            }
        }
        graph
    })
}

fn arb_pattern() -> impl Strategy<Value = FraudPattern> {
    prop::sample::select(FraudPattern::ALL.to_vec())
}

fn arb_detection() -> impl Strategy<Value = CycleDetection> {
    (arb_pattern(), 2usize..12, 0.0f64..300_000.0, 0.0f64..=1.0, 0usize..3).prop_map(
        |(pattern, len, amount, risk, status_steps)| {
            let policy = RiskPolicy::default();
            let mut record = CycleDetection::new(
                pattern,
                "generated",
                len,
                amount,
                policy.severity(len, amount),
                risk,
            );
            for next in [CycleStatus::Investigating, CycleStatus::Confirmed]
                .into_iter()
                .take(status_steps)
            {
                let _ = record.set_status(next);
            }
            record
        },
    )
}

fn to_petgraph(graph: &TransactionGraph) -> (DiGraph<AccountId, f64>, Vec<AccountId>) {
    let mut pg = DiGraph::new();
    let mut index = HashMap::new();
    let nodes = graph.nodes();
    for node in &nodes {
        index.insert(node.clone(), pg.add_node(node.clone()));
    }
    for edge in graph.edges() {
        pg.add_edge(index[edge.from()], index[edge.to()], edge.weight());
    }
    (pg, nodes)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// Tarjan partitions the account set: every account in exactly one component.
    #[test]
    fn scc_partition_covers_every_node_once(graph in arb_graph()) {
        let components = find_sccs(&graph, &ComputeBudget::default()).unwrap();
        let mut seen = BTreeSet::new();
        for component in &components {
            for account in &component.accounts {
                prop_assert!(seen.insert(account.clone()), "{} in two components", account);
            }
        }
        prop_assert_eq!(seen.len(), graph.node_count());
    }

    /// Cyclic components match petgraph's Tarjan.
    #[test]
    fn cyclic_components_match_petgraph(graph in arb_graph()) {
        let ours: BTreeSet<Vec<AccountId>> = cyclic_components(&graph, &ComputeBudget::default())
            .unwrap()
            .into_iter()
            .map(|c| c.accounts)
            .collect();

        let (pg, _) = to_petgraph(&graph);
        let theirs: BTreeSet<Vec<AccountId>> = petgraph::algo::tarjan_scc(&pg)
            .into_iter()
            .filter(|c| c.len() > 1)
            .map(|c| {
                let mut accounts: Vec<AccountId> = c.iter().map(|&i| pg[i].clone()).collect();
                accounts.sort();
                accounts
            })
            .collect();

        prop_assert_eq!(ours, theirs);
    }

    /// Without self-transfers, DFS finds a cycle iff some SCC is cyclic.
    #[test]
    fn dfs_agrees_with_scc(graph in arb_graph()) {
        let budget = ComputeBudget::default();
        let dfs = has_cycle(&graph, &budget).unwrap();
        let scc = !cyclic_components(&graph, &budget).unwrap().is_empty();
        prop_assert_eq!(dfs, scc);
        prop_assert_eq!(dfs, petgraph::algo::is_cyclic_directed(&to_petgraph(&graph).0));
    }

    /// Every DFS cycle is a real closed walk over existing edges.
    #[test]
    fn dfs_cycles_follow_edges(graph in arb_graph()) {
        for cycle in find_cycles(&graph, &ComputeBudget::default()).unwrap() {
            let nodes = cycle.nodes();
            prop_assert_eq!(nodes.first(), nodes.last());
            prop_assert!(cycle.len() >= 2);
            for pair in nodes.windows(2) {
                prop_assert!(graph.has_edge(&pair[0], &pair[1]));
            }
            let distinct: BTreeSet<_> = cycle.accounts().iter().collect();
            prop_assert_eq!(distinct.len(), cycle.len());
        }
    }

    /// Enumerated walks are simple, closed, rooted at their smallest account
    /// and within the requested hop range.
    #[test]
    fn closed_paths_are_canonical(graph in arb_graph(), min in 2usize..4, extra in 0usize..4) {
        let max = min + extra;
        let walks = enumerate_closed_paths(&graph, min, max, &Deadline::none("test")).unwrap();
        for walk in &walks {
            prop_assert!(walk.hop_count() >= min && walk.hop_count() <= max);
            prop_assert_eq!(walk.nodes.first(), walk.nodes.last());
            prop_assert_eq!(walk.origin(), walk.accounts().iter().min().unwrap());
            let distinct: BTreeSet<_> = walk.accounts().iter().collect();
            prop_assert_eq!(distinct.len(), walk.hop_count());
        }
    }

    /// A negative cycle exists somewhere iff Bellman–Ford sees one from some source.
    #[test]
    fn floyd_warshall_agrees_with_bellman_ford(graph in arb_graph()) {
        let budget = ComputeBudget::default();
        let fw = FloydWarshall::compute(&graph, &budget).unwrap().has_negative_cycle();
        let bf = graph
            .nodes()
            .iter()
            .any(|s| BellmanFord::run(&graph, s, &budget).unwrap().has_negative_cycle);
        prop_assert_eq!(fw, bf);
    }

    #[test]
    fn risk_score_stays_in_unit_interval(len in 0usize..1000, amount in 0.0f64..1e9) {
        let policy = RiskPolicy::default();
        let score = policy.risk_score(len, amount);
        prop_assert!((0.0..=1.0).contains(&score));
        let by_length = policy.risk_score_by_length(len);
        prop_assert!((0.0..=1.0).contains(&by_length));
    }

    /// Adding length or amount never lowers severity.
    #[test]
    fn severity_is_monotonic(len in 0usize..20, amount in 0.0f64..300_000.0, dl in 0usize..5, da in 0.0f64..100_000.0) {
        let policy = RiskPolicy::default();
        prop_assert!(policy.severity(len + dl, amount + da) >= policy.severity(len, amount));
        prop_assert!(policy.severity(len, amount) >= policy.severity_by_length(len));
        prop_assert!(policy.severity(len, 0.0) >= Severity::Low);
    }

    /// The report depends only on the set of records, not their order.
    #[test]
    fn report_is_order_independent(records in prop::collection::vec(arb_detection(), 0..20)) {
        let policy = RiskPolicy::default();
        let forward = FraudDetectionReport::from_detections(&records, &policy);
        let mut reversed = records.clone();
        reversed.reverse();
        let backward = FraudDetectionReport::from_detections(&reversed, &policy);

        prop_assert_eq!(forward.total_cycles_detected, backward.total_cycles_detected);
        prop_assert_eq!(forward.high_risk_cycles, backward.high_risk_cycles);
        prop_assert_eq!(forward.medium_risk_cycles, backward.medium_risk_cycles);
        prop_assert_eq!(forward.low_risk_cycles, backward.low_risk_cycles);
        prop_assert_eq!(&forward.fraud_pattern_distribution, &backward.fraud_pattern_distribution);
        prop_assert_eq!(&forward.status_distribution, &backward.status_distribution);
        prop_assert!((forward.total_amount_at_risk - backward.total_amount_at_risk).abs() < 1e-6);

        let bucketed = forward.high_risk_cycles + forward.medium_risk_cycles + forward.low_risk_cycles;
        prop_assert!(bucketed >= records.len());
    }
}
