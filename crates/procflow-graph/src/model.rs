use crate::style::EdgeStyle;
use procflow_core::{EdgeId, LayerConstraint, NodeId, NodeKind};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::{HashMap, HashSet};
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

const DEFAULT_NODE_WIDTH: f32 = 100.0;
const DEFAULT_NODE_HEIGHT: f32 = 30.0;
const LABEL_CHAR_WIDTH: f32 = 7.0;
const LABEL_PADDING: f32 = 24.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub label: String,
    pub kind: NodeKind,
    /// Top-left corner, assigned by the layout engine.
    pub position: Vec2,
    pub size: Vec2,
    #[serde(default)]
    pub layer: Option<LayerConstraint>,
    #[serde(default)]
    pub is_ghost: bool,
    #[serde(default)]
    pub selected: bool,
    /// The engine classified this activity as a legitimate process entry.
    #[serde(default)]
    pub is_true_start: bool,
    #[serde(default)]
    pub is_true_end: bool,
}

impl GraphNode {
    pub fn activity(id: NodeId) -> Self {
        let label = id.0.clone();
        let width = (label.chars().count() as f32 * LABEL_CHAR_WIDTH + LABEL_PADDING)
            .max(DEFAULT_NODE_WIDTH);
        Self {
            id,
            label,
            kind: NodeKind::Activity,
            position: Vec2::default(),
            size: Vec2::new(width, DEFAULT_NODE_HEIGHT),
            layer: None,
            is_ghost: false,
            selected: false,
            is_true_start: false,
            is_true_end: false,
        }
    }

    pub fn anchor(kind: NodeKind) -> Self {
        let (id, layer) = match kind {
            NodeKind::Start => (NodeId::start(), LayerConstraint::First),
            _ => (NodeId::end(), LayerConstraint::Last),
        };
        Self {
            label: match kind {
                NodeKind::Start => "Start".to_string(),
                _ => "End".to_string(),
            },
            kind,
            layer: Some(layer),
            size: Vec2::new(DEFAULT_NODE_HEIGHT * 2.0, DEFAULT_NODE_HEIGHT),
            ..Self::activity(id)
        }
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new(
            self.position.x + self.size.x / 2.0,
            self.position.y + self.size.y / 2.0,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    pub weight: f64,
    pub label: String,
    #[serde(default)]
    pub mean_duration_seconds: Option<f64>,
    #[serde(default)]
    pub total_duration_seconds: Option<f64>,
    #[serde(default)]
    pub tooltip_mean_time: String,
    #[serde(default)]
    pub tooltip_total_time: String,
    #[serde(default)]
    pub is_structural: bool,
    #[serde(default)]
    pub is_ghost: bool,
    pub style: EdgeStyle,
    /// Polyline from source to target, filled in by the layout engine.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub route: Vec<Vec2>,
}

impl GraphEdge {
    /// Edges that take part in weight and duration statistics.
    pub fn is_statistical(&self) -> bool {
        !self.is_structural && !self.is_ghost
    }

    pub fn endpoints(&self) -> (&NodeId, &NodeId) {
        (&self.source, &self.target)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphData {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphData {
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: &NodeId) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| &n.id == id)
    }

    pub fn edge(&self, id: &EdgeId) -> Option<&GraphEdge> {
        self.edges.iter().find(|e| &e.id == id)
    }

    pub fn node_ids(&self) -> HashSet<&NodeId> {
        self.nodes.iter().map(|n| &n.id).collect()
    }

    pub fn edge_lookup(&self) -> HashMap<&EdgeId, &GraphEdge> {
        self.edges.iter().map(|e| (&e.id, e)).collect()
    }

    /// First edge for each `(source, target)` pair.
    pub fn pair_lookup(&self) -> HashMap<(&NodeId, &NodeId), &GraphEdge> {
        let mut pairs = HashMap::with_capacity(self.edges.len());
        for edge in &self.edges {
            pairs.entry((&edge.source, &edge.target)).or_insert(edge);
        }
        pairs
    }

    pub fn topology_key(&self) -> TopologyKey {
        TopologyKey::of(self)
    }
}

/// Fingerprint of everything the layout engine depends on.
///
/// Styling changes leave the key untouched, so callers can skip the solver
/// when only colours moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TopologyKey(pub u64);

impl TopologyKey {
    pub fn of(graph: &GraphData) -> Self {
        let mut nodes: Vec<(&str, Option<LayerConstraint>, u32, u32)> = graph
            .nodes
            .iter()
            .map(|n| {
                (
                    n.id.as_str(),
                    n.layer,
                    n.size.x.to_bits(),
                    n.size.y.to_bits(),
                )
            })
            .collect();
        nodes.sort_unstable();
        let mut edges: Vec<(&str, &str, &str)> = graph
            .edges
            .iter()
            .map(|e| (e.id.as_str(), e.source.as_str(), e.target.as_str()))
            .collect();
        edges.sort_unstable();

        let mut hasher = DefaultHasher::new();
        nodes.hash(&mut hasher);
        edges.hash(&mut hasher);
        Self(hasher.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Color, EdgeStyle};

    fn edge(source: &str, target: &str) -> GraphEdge {
        GraphEdge {
            id: EdgeId::between(&NodeId::new(source), &NodeId::new(target)),
            source: NodeId::new(source),
            target: NodeId::new(target),
            weight: 1.0,
            label: "1".to_string(),
            mean_duration_seconds: None,
            total_duration_seconds: None,
            tooltip_mean_time: String::new(),
            tooltip_total_time: String::new(),
            is_structural: false,
            is_ghost: false,
            style: EdgeStyle::default(),
            route: Vec::new(),
        }
    }

    #[test]
    fn test_activity_node_defaults() {
        let node = GraphNode::activity(NodeId::new("Register order with a long label"));
        assert_eq!(node.kind, NodeKind::Activity);
        assert_eq!(node.position, Vec2::default());
        assert!(node.size.x > DEFAULT_NODE_WIDTH);
        assert_eq!(node.label, "Register order with a long label");
    }

    #[test]
    fn test_anchor_nodes_are_pinned() {
        let start = GraphNode::anchor(NodeKind::Start);
        let end = GraphNode::anchor(NodeKind::End);
        assert_eq!(start.id, NodeId::start());
        assert_eq!(start.layer, Some(LayerConstraint::First));
        assert_eq!(end.id, NodeId::end());
        assert_eq!(end.layer, Some(LayerConstraint::Last));
    }

    #[test]
    fn test_topology_key_ignores_style_and_order() {
        let nodes = vec![
            GraphNode::activity(NodeId::new("A")),
            GraphNode::activity(NodeId::new("B")),
        ];
        let graph = GraphData::new(nodes.clone(), vec![edge("A", "B")]);

        let mut restyled = graph.clone();
        restyled.edges[0].style = EdgeStyle::cached(Color::rgb(1, 2, 3), 5.0);
        restyled.nodes.reverse();
        restyled.nodes[0].position = Vec2::new(10.0, 10.0);
        assert_eq!(graph.topology_key(), restyled.topology_key());

        let mut grown = graph.clone();
        grown.edges.push(edge("B", "A"));
        assert_ne!(graph.topology_key(), grown.topology_key());
    }
}
