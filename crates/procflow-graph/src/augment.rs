//! Synthetic START/END anchors.
//!
//! Anchoring is purely structural: any node without incoming edges in the
//! *current filtered* edge set is connected from `START_NODE`, any node
//! without outgoing edges is connected to `END_NODE`. This is independent of
//! the engine's semantic start/end classification, which is only recorded on
//! the nodes (`is_true_start` / `is_true_end`). A filter that cuts every
//! incoming edge of a mid-process activity makes it a structural start even
//! though the engine never listed it as an entry point; [`AugmentReport`]
//! lists those cases separately.

use crate::model::{GraphData, GraphEdge, GraphNode};
use crate::style::EdgeStyle;
use procflow_core::{EdgeId, NodeId, NodeKind};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AugmentReport {
    pub structural_starts: Vec<NodeId>,
    pub structural_ends: Vec<NodeId>,
    /// Structural starts the engine did not classify as true starts.
    pub unlisted_starts: Vec<NodeId>,
    /// Structural ends the engine did not classify as true ends.
    pub unlisted_ends: Vec<NodeId>,
}

pub struct StructuralAugmenter {
    true_starts: HashSet<String>,
    true_ends: HashSet<String>,
}

impl StructuralAugmenter {
    pub fn new(true_starts: &[String], true_ends: &[String]) -> Self {
        Self {
            true_starts: true_starts.iter().cloned().collect(),
            true_ends: true_ends.iter().cloned().collect(),
        }
    }

    /// Returns a new graph with anchors added. Anchors and structural edges
    /// already present in `graph` are replaced, so augmenting twice is a no-op.
    pub fn augment(&self, graph: &GraphData) -> (GraphData, AugmentReport) {
        let mut nodes: Vec<GraphNode> = graph
            .nodes
            .iter()
            .filter(|n| !n.id.is_anchor())
            .map(|n| GraphNode {
                is_true_start: self.true_starts.contains(n.id.as_str()),
                is_true_end: self.true_ends.contains(n.id.as_str()),
                ..n.clone()
            })
            .collect();
        let mut edges: Vec<GraphEdge> = graph
            .edges
            .iter()
            .filter(|e| !e.is_structural)
            .cloned()
            .collect();

        let mut report = AugmentReport::default();
        if nodes.is_empty() {
            return (GraphData::new(nodes, edges), report);
        }

        let mut in_degree: HashMap<&NodeId, usize> = nodes.iter().map(|n| (&n.id, 0)).collect();
        let mut out_degree = in_degree.clone();
        for edge in &edges {
            if let Some(count) = in_degree.get_mut(&edge.target) {
                *count += 1;
            }
            if let Some(count) = out_degree.get_mut(&edge.source) {
                *count += 1;
            }
        }

        let start = NodeId::start();
        let end = NodeId::end();
        let mut structural = Vec::new();
        for node in &nodes {
            if in_degree[&node.id] == 0 {
                structural.push(structural_edge(&start, &node.id));
                report.structural_starts.push(node.id.clone());
                if !node.is_true_start {
                    report.unlisted_starts.push(node.id.clone());
                }
            }
            if out_degree[&node.id] == 0 {
                structural.push(structural_edge(&node.id, &end));
                report.structural_ends.push(node.id.clone());
                if !node.is_true_end {
                    report.unlisted_ends.push(node.id.clone());
                }
            }
        }

        if !report.unlisted_starts.is_empty() || !report.unlisted_ends.is_empty() {
            tracing::debug!(
                "Filtered view produced {} unlisted structural starts and {} unlisted ends",
                report.unlisted_starts.len(),
                report.unlisted_ends.len()
            );
        }

        nodes.insert(0, GraphNode::anchor(NodeKind::Start));
        nodes.push(GraphNode::anchor(NodeKind::End));
        edges.extend(structural);
        (GraphData::new(nodes, edges), report)
    }
}

fn structural_edge(source: &NodeId, target: &NodeId) -> GraphEdge {
    GraphEdge {
        id: EdgeId::between(source, target),
        source: source.clone(),
        target: target.clone(),
        weight: 0.0,
        label: String::new(),
        mean_duration_seconds: None,
        total_duration_seconds: None,
        tooltip_mean_time: String::new(),
        tooltip_total_time: String::new(),
        is_structural: true,
        is_ghost: false,
        style: EdgeStyle::structural(),
        route: Vec::new(),
    }
}
