//! Ghost nodes and edges for selected paths that leave the filtered view.

use crate::model::{GraphData, GraphEdge, GraphNode};
use crate::path::Path;
use crate::style::EdgeStyle;
use procflow_core::{EdgeId, NodeId, format_duration};
use std::collections::HashSet;

/// Returns `graph` extended with every node and hop of `path` it lacks.
///
/// Existing elements are never touched. Ghost edges carry no weight and are
/// excluded from statistics; their tooltip shows the path's own duration.
pub fn inject_ghosts(graph: &GraphData, path: &Path) -> GraphData {
    let mut nodes = graph.nodes.clone();
    let mut edges = graph.edges.clone();

    let mut known_nodes: HashSet<NodeId> = graph.nodes.iter().map(|n| n.id.clone()).collect();
    for id in &path.nodes {
        if known_nodes.insert(id.clone()) {
            nodes.push(GraphNode {
                is_ghost: true,
                ..GraphNode::activity(id.clone())
            });
        }
    }

    let mut known_pairs: HashSet<(NodeId, NodeId)> = graph
        .edges
        .iter()
        .map(|e| (e.source.clone(), e.target.clone()))
        .collect();
    let mut taken_ids: HashSet<EdgeId> = graph.edges.iter().map(|e| e.id.clone()).collect();
    for (i, (source, target)) in path.pairs().enumerate() {
        if !known_pairs.insert((source.clone(), target.clone())) {
            continue;
        }
        let mut id = path
            .edges
            .get(i)
            .cloned()
            .unwrap_or_else(|| EdgeId::between(source, target));
        let mut suffix = 1;
        while taken_ids.contains(&id) {
            id = EdgeId::indexed(source, target, suffix);
            suffix += 1;
        }
        taken_ids.insert(id.clone());

        let duration = path.durations.get(i).copied().flatten();
        edges.push(GraphEdge {
            id,
            source: source.clone(),
            target: target.clone(),
            weight: 0.0,
            label: String::new(),
            mean_duration_seconds: duration,
            total_duration_seconds: None,
            tooltip_mean_time: format_duration(duration),
            tooltip_total_time: String::new(),
            is_structural: false,
            is_ghost: true,
            style: EdgeStyle::ghost(),
            route: Vec::new(),
        });
    }

    GraphData::new(nodes, edges)
}
