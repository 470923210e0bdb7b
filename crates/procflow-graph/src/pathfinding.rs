//! Exhaustive simple-path enumeration between two nodes.
//!
//! The search runs in two phases:
//!
//! 1. **Reachability pruning.** Nodes reachable forward from `start` are
//!    intersected with nodes that reach `end` backwards. Only edges between
//!    these *useful* nodes survive. If either endpoint is not useful the
//!    search returns immediately without entering the DFS.
//! 2. **Bounded DFS.** A depth-first walk over the pruned adjacency with a
//!    single shared node stack, edge stack and membership table. Every push
//!    is matched by exactly one pop before the visit returns, so sibling
//!    branches always see a clean state.
//!
//! Both limits are enforced during the walk: no branch descends past
//! `max_path_length` edges and no path is recorded once `max_paths` have
//! been found. Results are in discovery order.

use crate::model::GraphEdge;
use crate::path::Path;
use procflow_core::{EdgeId, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

pub const MAX_PATH_LENGTH: usize = 30;
pub const MAX_PATHS_TO_FIND: usize = 100_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRef {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

impl EdgeRef {
    pub fn new(id: impl Into<String>, source: &str, target: &str) -> Self {
        Self {
            id: EdgeId(id.into()),
            source: NodeId::new(source),
            target: NodeId::new(target),
        }
    }
}

impl From<&GraphEdge> for EdgeRef {
    fn from(edge: &GraphEdge) -> Self {
        Self {
            id: edge.id.clone(),
            source: edge.source.clone(),
            target: edge.target.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchStats {
    pub useful_nodes: usize,
    /// Edges left in the pruned adjacency.
    pub pruned_edges: usize,
    pub dfs_calls: usize,
    /// The result limit stopped the walk with branches left unexplored.
    pub truncated: bool,
    /// At least one branch was cut at the depth limit.
    pub depth_limited: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathSearch {
    pub paths: Vec<Path>,
    pub stats: SearchStats,
}

/// Dense-index view of an edge list.
struct IndexedGraph<'a> {
    nodes: Vec<&'a NodeId>,
    index: HashMap<&'a NodeId, usize>,
    /// `(target, edge)` per source.
    outgoing: Vec<Vec<(usize, usize)>>,
    /// `(source, edge)` per target.
    incoming: Vec<Vec<(usize, usize)>>,
}

impl<'a> IndexedGraph<'a> {
    fn new(edges: &'a [EdgeRef]) -> Self {
        let mut graph = IndexedGraph {
            nodes: Vec::new(),
            index: HashMap::new(),
            outgoing: Vec::new(),
            incoming: Vec::new(),
        };
        for (i, edge) in edges.iter().enumerate() {
            let source = graph.intern(&edge.source);
            let target = graph.intern(&edge.target);
            graph.outgoing[source].push((target, i));
            graph.incoming[target].push((source, i));
        }
        graph
    }

    fn intern(&mut self, id: &'a NodeId) -> usize {
        if let Some(&i) = self.index.get(id) {
            return i;
        }
        let i = self.nodes.len();
        self.nodes.push(id);
        self.index.insert(id, i);
        self.outgoing.push(Vec::new());
        self.incoming.push(Vec::new());
        i
    }

    fn get(&self, id: &NodeId) -> Option<usize> {
        self.index.get(id).copied()
    }
}

fn reachable(adjacency: &[Vec<(usize, usize)>], from: usize) -> Vec<bool> {
    let mut seen = vec![false; adjacency.len()];
    let mut queue = VecDeque::from([from]);
    seen[from] = true;
    while let Some(node) = queue.pop_front() {
        for &(next, _) in &adjacency[node] {
            if !seen[next] {
                seen[next] = true;
                queue.push_back(next);
            }
        }
    }
    seen
}

struct DepthFirstSearch<'g> {
    adjacency: &'g [Vec<(usize, usize)>],
    nodes: &'g [&'g NodeId],
    edges: &'g [EdgeRef],
    end: usize,
    max_depth: usize,
    max_paths: usize,
    node_stack: Vec<usize>,
    edge_stack: Vec<usize>,
    on_path: Vec<bool>,
    found: Vec<Path>,
    calls: usize,
    truncated: bool,
    depth_limited: bool,
}

impl<'g> DepthFirstSearch<'g> {
    fn new(
        adjacency: &'g [Vec<(usize, usize)>],
        nodes: &'g [&'g NodeId],
        edges: &'g [EdgeRef],
        end: usize,
        finder: &PathFinder,
    ) -> Self {
        Self {
            adjacency,
            nodes,
            edges,
            end,
            max_depth: finder.max_path_length,
            max_paths: finder.max_paths,
            node_stack: Vec::new(),
            edge_stack: Vec::new(),
            on_path: vec![false; adjacency.len()],
            found: Vec::new(),
            calls: 0,
            truncated: false,
            depth_limited: false,
        }
    }

    fn record(&mut self) {
        self.found.push(Path {
            nodes: self.node_stack.iter().map(|&n| self.nodes[n].clone()).collect(),
            edges: self.edge_stack.iter().map(|&e| self.edges[e].id.clone()).collect(),
            durations: Vec::new(),
            provenance: None,
        });
    }

    fn visit(&mut self, node: usize, depth: usize) {
        self.calls += 1;
        self.node_stack.push(node);
        self.on_path[node] = true;

        if self.found.len() >= self.max_paths {
            self.truncated = true;
        } else if node == self.end {
            // The destination is terminal.
            self.record();
        } else if depth >= self.max_depth {
            self.depth_limited = true;
        } else {
            let adjacency = self.adjacency;
            for &(next, edge) in &adjacency[node] {
                if self.on_path[next] {
                    continue;
                }
                self.edge_stack.push(edge);
                self.visit(next, depth + 1);
                self.edge_stack.pop();
            }
        }

        self.on_path[node] = false;
        self.node_stack.pop();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PathFinder {
    pub max_path_length: usize,
    pub max_paths: usize,
}

impl Default for PathFinder {
    fn default() -> Self {
        Self {
            max_path_length: MAX_PATH_LENGTH,
            max_paths: MAX_PATHS_TO_FIND,
        }
    }
}

impl PathFinder {
    pub fn new(max_path_length: usize, max_paths: usize) -> Self {
        Self {
            max_path_length,
            max_paths,
        }
    }

    /// All simple paths from `start` to `end`.
    ///
    /// `start == end` yields the single trivial path `[start]` when `start`
    /// occurs in `edges`; an unknown endpoint yields no paths.
    pub fn find_all_paths(&self, edges: &[EdgeRef], start: &NodeId, end: &NodeId) -> PathSearch {
        let graph = IndexedGraph::new(edges);
        let (Some(start), Some(end)) = (graph.get(start), graph.get(end)) else {
            return PathSearch::default();
        };

        let (forward, backward) = rayon::join(
            || reachable(&graph.outgoing, start),
            || reachable(&graph.incoming, end),
        );
        let useful: Vec<bool> = forward.iter().zip(&backward).map(|(f, b)| *f && *b).collect();
        let useful_nodes = useful.iter().filter(|u| **u).count();
        if !useful[start] || !useful[end] {
            tracing::debug!("No useful nodes connect {} to {}", graph.nodes[start], graph.nodes[end]);
            return PathSearch {
                paths: Vec::new(),
                stats: SearchStats {
                    useful_nodes,
                    ..SearchStats::default()
                },
            };
        }

        let pruned: Vec<Vec<(usize, usize)>> = graph
            .outgoing
            .iter()
            .enumerate()
            .map(|(node, targets)| {
                if !useful[node] {
                    return Vec::new();
                }
                targets.iter().copied().filter(|(next, _)| useful[*next]).collect()
            })
            .collect();
        let pruned_edges = pruned.iter().map(Vec::len).sum();

        let mut search = DepthFirstSearch::new(&pruned, &graph.nodes, edges, end, self);
        search.visit(start, 0);
        let stats = SearchStats {
            useful_nodes,
            pruned_edges,
            dfs_calls: search.calls,
            truncated: search.truncated,
            depth_limited: search.depth_limited,
        };
        tracing::debug!(
            "Path search found {} paths with {} DFS calls over {} useful nodes",
            search.found.len(),
            stats.dfs_calls,
            stats.useful_nodes
        );
        PathSearch {
            paths: search.found,
            stats,
        }
    }

    /// Same enumeration over the full adjacency, without pruning.
    pub fn find_all_paths_unpruned(
        &self,
        edges: &[EdgeRef],
        start: &NodeId,
        end: &NodeId,
    ) -> PathSearch {
        let graph = IndexedGraph::new(edges);
        let (Some(start), Some(end)) = (graph.get(start), graph.get(end)) else {
            return PathSearch::default();
        };
        let mut search = DepthFirstSearch::new(&graph.outgoing, &graph.nodes, edges, end, self);
        search.visit(start, 0);
        PathSearch {
            stats: SearchStats {
                useful_nodes: graph.nodes.len(),
                pruned_edges: edges.len(),
                dfs_calls: search.calls,
                truncated: search.truncated,
                depth_limited: search.depth_limited,
            },
            paths: search.found,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn edges(pairs: &[(&str, &str)]) -> Vec<EdgeRef> {
        pairs
            .iter()
            .map(|(s, t)| EdgeRef::new(format!("{s}->{t}"), s, t))
            .collect()
    }

    fn node_sequences(search: &PathSearch) -> Vec<Vec<&str>> {
        search
            .paths
            .iter()
            .map(|p| p.nodes.iter().map(NodeId::as_str).collect())
            .collect()
    }

    fn id(name: &str) -> NodeId {
        NodeId::new(name)
    }

    #[test]
    fn test_reference_scenario() {
        let graph = edges(&[("A", "B"), ("B", "C"), ("A", "C"), ("C", "D")]);
        let search = PathFinder::default().find_all_paths(&graph, &id("A"), &id("D"));

        let mut found = node_sequences(&search);
        found.sort();
        assert_eq!(found, vec![vec!["A", "B", "C", "D"], vec!["A", "C", "D"]]);
        for path in &search.paths {
            let expected: Vec<EdgeId> = path
                .nodes
                .windows(2)
                .map(|w| EdgeId::between(&w[0], &w[1]))
                .collect();
            assert_eq!(path.edges, expected);
        }
        assert!(!search.stats.truncated);
    }

    #[test]
    fn test_paths_follow_discovery_order() {
        let graph = edges(&[("A", "C"), ("A", "B"), ("B", "C")]);
        let search = PathFinder::default().find_all_paths(&graph, &id("A"), &id("C"));
        assert_eq!(node_sequences(&search), vec![vec!["A", "C"], vec!["A", "B", "C"]]);
    }

    #[test]
    fn test_cycles_do_not_repeat_nodes() {
        let graph = edges(&[("A", "B"), ("B", "A"), ("B", "C"), ("C", "B"), ("C", "D")]);
        let search = PathFinder::default().find_all_paths(&graph, &id("A"), &id("D"));
        assert_eq!(node_sequences(&search), vec![vec!["A", "B", "C", "D"]]);
    }

    #[test]
    fn test_start_equals_end_yields_trivial_path() {
        let graph = edges(&[("A", "B"), ("B", "A")]);
        let search = PathFinder::default().find_all_paths(&graph, &id("A"), &id("A"));
        assert_eq!(search.paths.len(), 1);
        assert_eq!(search.paths[0].nodes, vec![id("A")]);
        assert!(search.paths[0].edges.is_empty());
        assert_eq!(search.stats.dfs_calls, 1);
    }

    #[test]
    fn test_unknown_endpoint_yields_nothing() {
        let graph = edges(&[("A", "B")]);
        let finder = PathFinder::default();
        assert!(finder.find_all_paths(&graph, &id("A"), &id("Z")).paths.is_empty());
        assert!(finder.find_all_paths(&graph, &id("Z"), &id("Z")).paths.is_empty());
        assert!(finder.find_all_paths(&[], &id("A"), &id("B")).paths.is_empty());
    }

    #[test]
    fn test_disconnected_endpoints_short_circuit() {
        let graph = edges(&[("A", "B"), ("C", "D"), ("D", "B")]);
        let search = PathFinder::default().find_all_paths(&graph, &id("A"), &id("D"));
        assert!(search.paths.is_empty());
        assert_eq!(search.stats.dfs_calls, 0);
    }

    #[test]
    fn test_wrong_direction_short_circuits() {
        let graph = edges(&[("A", "B")]);
        let search = PathFinder::default().find_all_paths(&graph, &id("B"), &id("A"));
        assert!(search.paths.is_empty());
        assert_eq!(search.stats.dfs_calls, 0);
    }

    #[test]
    fn test_pruning_drops_dead_branches() {
        let graph = edges(&[("A", "B"), ("B", "D"), ("A", "X"), ("X", "Y"), ("Y", "Z")]);
        let search = PathFinder::default().find_all_paths(&graph, &id("A"), &id("D"));
        assert_eq!(search.stats.useful_nodes, 3);
        assert_eq!(search.stats.pruned_edges, 2);
        assert_eq!(search.stats.dfs_calls, 3);

        let unpruned = PathFinder::default().find_all_paths_unpruned(&graph, &id("A"), &id("D"));
        assert!(unpruned.stats.dfs_calls > search.stats.dfs_calls);
        assert_eq!(unpruned.paths, search.paths);
    }

    /// Layered DAG with `width` nodes per layer and complete bipartite links.
    fn layered(layers: usize, width: usize) -> Vec<EdgeRef> {
        let mut graph = Vec::new();
        let name = |layer: usize, i: usize| format!("L{layer}N{i}");
        for i in 0..width {
            graph.push(EdgeRef::new(format!("S->{i}"), "S", &name(0, i)));
            graph.push(EdgeRef::new(format!("{i}->T"), &name(layers - 1, i), "T"));
        }
        for layer in 0..layers - 1 {
            for i in 0..width {
                for j in 0..width {
                    let (s, t) = (name(layer, i), name(layer + 1, j));
                    graph.push(EdgeRef::new(format!("{s}->{t}"), &s, &t));
                }
            }
        }
        graph
    }

    #[test]
    fn test_result_limit_is_enforced_during_search() {
        let graph = layered(4, 4); // 256 paths
        let search = PathFinder::new(MAX_PATH_LENGTH, 10).find_all_paths(&graph, &id("S"), &id("T"));
        assert_eq!(search.paths.len(), 10);
        assert!(search.stats.truncated);

        let full = PathFinder::default().find_all_paths(&graph, &id("S"), &id("T"));
        assert_eq!(full.paths.len(), 256);
        assert!(!full.stats.truncated);
        assert!(search.stats.dfs_calls < full.stats.dfs_calls);
    }

    #[test]
    fn test_depth_limit_is_enforced_during_search() {
        let graph = edges(&[("A", "B"), ("B", "C"), ("C", "D"), ("A", "D")]);
        let search = PathFinder::new(1, MAX_PATHS_TO_FIND).find_all_paths(&graph, &id("A"), &id("D"));
        assert_eq!(node_sequences(&search), vec![vec!["A", "D"]]);
        assert!(search.stats.depth_limited);

        let search = PathFinder::new(3, MAX_PATHS_TO_FIND).find_all_paths(&graph, &id("A"), &id("D"));
        assert_eq!(search.paths.len(), 2);
        assert!(!search.stats.depth_limited);
    }

    #[test]
    fn test_stacks_are_restored_after_search() {
        let graph = edges(&[("A", "B"), ("B", "C"), ("A", "C"), ("C", "D"), ("B", "D")]);
        let indexed = IndexedGraph::new(&graph);
        let (start, end) = (indexed.get(&id("A")).unwrap(), indexed.get(&id("D")).unwrap());
        let finder = PathFinder::default();
        let mut search =
            DepthFirstSearch::new(&indexed.outgoing, &indexed.nodes, &graph, end, &finder);

        search.visit(start, 0);
        assert_eq!(search.found.len(), 3);
        assert!(search.node_stack.is_empty());
        assert!(search.edge_stack.is_empty());
        assert!(search.on_path.iter().all(|on| !on));

        // A second walk from the same state finds the same paths.
        let first = std::mem::take(&mut search.found);
        search.visit(start, 0);
        assert_eq!(search.found, first);
    }

    fn random_edges() -> impl Strategy<Value = (usize, Vec<(usize, usize)>)> {
        (2usize..9).prop_flat_map(|n| (Just(n), prop::collection::vec((0..n, 0..n), 0..24)))
    }

    proptest! {
        #[test]
        fn prop_pruning_never_loses_paths((n, pairs) in random_edges(), start in 0usize..9, end in 0usize..9) {
            let graph: Vec<EdgeRef> = pairs
                .iter()
                .enumerate()
                .map(|(i, (s, t))| EdgeRef::new(format!("e{i}"), &format!("N{s}"), &format!("N{t}")))
                .collect();
            let (start, end) = (id(&format!("N{}", start % n)), id(&format!("N{}", end % n)));
            let finder = PathFinder::new(n, usize::MAX);

            let pruned = finder.find_all_paths(&graph, &start, &end);
            let exhaustive = finder.find_all_paths_unpruned(&graph, &start, &end);
            let as_set = |s: &PathSearch| -> HashSet<(Vec<NodeId>, Vec<EdgeId>)> {
                s.paths.iter().map(|p| (p.nodes.clone(), p.edges.clone())).collect()
            };
            prop_assert_eq!(pruned.paths.len(), exhaustive.paths.len(), "pruned result size differs");
            prop_assert_eq!(as_set(&pruned), as_set(&exhaustive));
        }

        #[test]
        fn prop_paths_are_simple_and_within_limits(
            (n, pairs) in random_edges(),
            max_len in 1usize..5,
            max_paths in 1usize..6,
        ) {
            let graph: Vec<EdgeRef> = pairs
                .iter()
                .enumerate()
                .map(|(i, (s, t))| EdgeRef::new(format!("e{i}"), &format!("N{s}"), &format!("N{t}")))
                .collect();
            let by_id: HashMap<&EdgeId, &EdgeRef> = graph.iter().map(|e| (&e.id, e)).collect();
            let search = PathFinder::new(max_len, max_paths)
                .find_all_paths(&graph, &id("N0"), &id(&format!("N{}", n - 1)));

            prop_assert!(search.paths.len() <= max_paths);
            for path in &search.paths {
                prop_assert!(path.is_simple(), "path {:?} is not simple", path.nodes);
                prop_assert!(path.hops() <= max_len);
                for (edge, pair) in path.edges.iter().zip(path.nodes.windows(2)) {
                    let edge = by_id[edge];
                    prop_assert_eq!(&edge.source, &pair[0]);
                    prop_assert_eq!(&edge.target, &pair[1]);
                }
            }
        }
    }
}
