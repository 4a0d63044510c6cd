// Property tests for the dependency graph's ordering and cycle detection.

use proptest::prelude::*;
use sheetcore_engine::cell_id::CellId;
use sheetcore_engine::dep_graph::DepGraph;

fn node(i: usize) -> CellId {
    CellId::new("S", i, 0)
}

fn build(n: usize, edges: &[(usize, usize)]) -> DepGraph {
    let mut graph = DepGraph::new();
    for i in 0..n {
        graph.add_node(&node(i));
    }
    for &(a, b) in edges {
        graph.add_edge(&node(a % n), &node(b % n));
    }
    graph
}

/// Reachability by plain DFS, used as the reference for cycle membership.
fn reaches(n: usize, edges: &[(usize, usize)], from: usize, to: usize) -> bool {
    let mut seen = vec![false; n];
    let mut stack = vec![from];
    while let Some(x) = stack.pop() {
        for &(a, b) in edges {
            let (a, b) = (a % n, b % n);
            if a == x {
                if b == to {
                    return true;
                }
                if !seen[b] {
                    seen[b] = true;
                    stack.push(b);
                }
            }
        }
    }
    false
}

proptest! {
    #[test]
    fn prop_topo_order_respects_acyclic_edges(
        n in 1usize..24,
        edges in prop::collection::vec((0usize..24, 0usize..24), 0..60),
    ) {
        let graph = build(n, &edges);
        let order = graph.topo_order();
        prop_assert_eq!(order.len(), n);

        let position = |id: &CellId| order.iter().position(|x| *x == id);
        for &(a, b) in &edges {
            let (a, b) = (node(a % n), node(b % n));
            if graph.scc_id(&a) != graph.scc_id(&b) {
                prop_assert!(position(&a) < position(&b));
            }
        }
    }

    #[test]
    fn prop_in_cycle_matches_reachability(
        n in 1usize..16,
        edges in prop::collection::vec((0usize..16, 0usize..16), 0..40),
    ) {
        let graph = build(n, &edges);
        for i in 0..n {
            prop_assert_eq!(graph.in_cycle(&node(i)), reaches(n, &edges, i, i));
        }
    }
}
