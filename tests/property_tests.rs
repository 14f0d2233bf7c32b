//! Property-based tests using proptest.
//!
//! These check invariants that must hold for every input: closure discovery
//! does not depend on processing order, the visibility rule, and atomic
//! get-or-create under concurrency.

use std::collections::{BTreeSet, HashSet, VecDeque};

use proptest::prelude::*;
use rayon::prelude::*;

use impactgraph::config::AnalysisConfig;
use impactgraph::graph::classify::visibility_for;
use impactgraph::graph::closure::ClosureEngine;
use impactgraph::graph::context::AnalysisContext;
use impactgraph::graph::populate::populate_files;
use impactgraph::graph::records::{TemplateCall, TemplateFunction};
use impactgraph::graph::store::RelationalStore;
use impactgraph::indexer::facts::{CallSite, FileFacts, FunctionDecl};
use impactgraph::indexer::universe::{CandidateUniverse, UniverseFile};
use impactgraph::observability::RunDiagnostics;
use impactgraph::types::{Resolution, Visibility};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

fn arb_resolution() -> impl Strategy<Value = Resolution> {
    prop_oneof![
        Just(Resolution::SameFunction),
        Just(Resolution::SameFile),
        Just(Resolution::CrossFile),
        Just(Resolution::CrossFileAmbiguous),
        Just(Resolution::External),
    ]
}

/// A call graph over `n` files: edges, which files hold the literal, and a
/// permutation used to shuffle processing order.
#[derive(Debug, Clone)]
struct CallGraph {
    n: usize,
    edges: Vec<(usize, usize)>,
    matched: Vec<bool>,
    order: Vec<usize>,
}

fn arb_call_graph() -> impl Strategy<Value = CallGraph> {
    (2usize..8).prop_flat_map(|n| {
        (
            prop::collection::vec((0..n, 0..n), 0..14),
            prop::collection::vec(any::<bool>(), n),
            Just((0..n).collect::<Vec<usize>>()).prop_shuffle(),
        )
            .prop_map(move |(edges, mut matched, order)| {
                matched[0] = true;
                CallGraph {
                    n,
                    edges,
                    matched,
                    order,
                }
            })
    })
}

fn path(i: usize) -> String {
    format!("internal/services/s{i}/f{i}_test.go")
}

fn universe_files(graph: &CallGraph) -> Vec<UniverseFile> {
    (0..graph.n)
        .map(|i| UniverseFile {
            path: path(i),
            service: format!("s{i}"),
            matched: graph.matched[i],
            facts: FileFacts {
                functions: vec![FunctionDecl {
                    name: format!("t{i}"),
                    owner: Some(format!("S{i}")),
                    line: 1,
                    produces_artifact: true,
                    anonymous: false,
                    enclosing: None,
                }],
                calls: graph
                    .edges
                    .iter()
                    .enumerate()
                    .filter(|(_, (from, _))| *from == i)
                    .map(|(k, (_, to))| CallSite {
                        caller: format!("t{i}"),
                        callee: format!("t{to}"),
                        receiver_type: Some(format!("S{to}")),
                        line: 10 + k as u32,
                    })
                    .collect(),
                ..Default::default()
            },
        })
        .collect()
}

/// Files reachable from the matched ones along the edges.
fn reachable(graph: &CallGraph) -> BTreeSet<String> {
    let mut seen: HashSet<usize> = (0..graph.n).filter(|&i| graph.matched[i]).collect();
    let mut queue: VecDeque<usize> = seen.iter().copied().collect();
    while let Some(i) = queue.pop_front() {
        for &(from, to) in &graph.edges {
            if from == i && seen.insert(to) {
                queue.push_back(to);
            }
        }
    }
    seen.into_iter().map(path).collect()
}

type Outcome = (Vec<String>, BTreeSet<(String, String, u32)>);

/// Run population plus closure, feeding files and seeds in `order`.
fn discover(graph: &CallGraph, order: &[usize]) -> Outcome {
    let files = universe_files(graph);
    let shuffled: Vec<UniverseFile> = order.iter().map(|&i| files[i].clone()).collect();
    let universe = CandidateUniverse::new(shuffled);
    let seeds: Vec<String> = order
        .iter()
        .filter(|&&i| graph.matched[i])
        .map(|&i| path(i))
        .collect();

    let config = AnalysisConfig::default();
    let store = RelationalStore::new();
    let diagnostics = RunDiagnostics::new();
    let resource = store.get_or_create_resource("azurerm_thing").unwrap();
    let ctx = AnalysisContext {
        config: &config,
        universe: &universe,
        store: &store,
        diagnostics: &diagnostics,
        resource,
    };
    let added = populate_files(&ctx, &seeds, None).unwrap();
    let mut engine = ClosureEngine::new(&ctx);
    engine.enqueue(added);
    engine.run().unwrap();

    let name = |id| store.get::<TemplateFunction>(id).map(|t| t.name).unwrap_or_default();
    let calls = store
        .all::<TemplateCall>()
        .into_iter()
        .map(|c| (name(c.source_id), c.target_id.map(name).unwrap_or_default(), c.line))
        .collect();
    (engine.scope(), calls)
}

// ---------------------------------------------------------------------------
// Closure discovery
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn closure_is_order_independent(graph in arb_call_graph()) {
        let identity: Vec<usize> = (0..graph.n).collect();
        let baseline = discover(&graph, &identity);
        let shuffled = discover(&graph, &graph.order);
        prop_assert_eq!(&baseline, &shuffled);

        let scope: BTreeSet<String> = baseline.0.iter().cloned().collect();
        prop_assert_eq!(scope, reachable(&graph));

        // one call row per call site out of an in-scope file
        let expected_calls = graph
            .edges
            .iter()
            .filter(|(from, _)| baseline.0.contains(&path(*from)))
            .count();
        prop_assert_eq!(baseline.1.len(), expected_calls);
    }
}

// ---------------------------------------------------------------------------
// Visibility rule
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(300))]

    #[test]
    fn visibility_follows_casing(
        name in "[A-Za-z][A-Za-z0-9_]{0,12}",
        anonymous in any::<bool>(),
        resolution in arb_resolution(),
    ) {
        let got = visibility_for(&name, anonymous, resolution);
        let expected = if resolution == Resolution::External {
            Visibility::External
        } else if anonymous || name.starts_with(|c: char| c.is_ascii_lowercase()) {
            Visibility::Private
        } else {
            Visibility::Public
        };
        prop_assert_eq!(got, expected);
    }
}

// ---------------------------------------------------------------------------
// Get-or-create
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn concurrent_get_or_create_is_idempotent(names in prop::collection::vec("[a-d]{1,2}", 1..60)) {
        let store = RelationalStore::new();
        let ids: Vec<_> = names
            .par_iter()
            .map(|n| store.get_or_create_service(n).unwrap())
            .collect();

        let distinct: HashSet<&String> = names.iter().collect();
        prop_assert_eq!(store.stats().services, distinct.len());
        for (name, id) in names.iter().zip(&ids) {
            prop_assert_eq!(store.service_by_name(name), Some(*id));
        }
        // a second round creates nothing
        for name in &names {
            store.get_or_create_service(name).unwrap();
        }
        prop_assert_eq!(store.stats().services, distinct.len());
    }
}
