use crate::model::{GraphData, GraphEdge, GraphNode, Vec2};
use procflow_core::{EdgeId, LayerConstraint, LayoutDirection, NodeId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LayoutError {
    #[error("Duplicate node id in layout input: {0}")]
    DuplicateNode(NodeId),
    #[error("Edge {edge} references unknown node {node}")]
    UnknownNode { edge: EdgeId, node: NodeId },
    #[error("Invalid size for node {0}")]
    InvalidSize(NodeId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeRouting {
    #[default]
    Polyline,
    Orthogonal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutOptions {
    pub direction: LayoutDirection,
    /// Gap between neighbouring nodes inside a layer.
    pub node_spacing: f32,
    /// Gap between consecutive layers.
    pub layer_spacing: f32,
    /// Gap reserved around edge bend points inside a layer.
    pub edge_spacing: f32,
    pub edge_routing: EdgeRouting,
    /// Crossing-minimisation and alignment sweeps.
    pub sweeps: usize,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            direction: LayoutDirection::Horizontal,
            node_spacing: 40.0,
            layer_spacing: 120.0,
            edge_spacing: 15.0,
            edge_routing: EdgeRouting::Polyline,
            sweeps: 4,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutNode {
    pub id: NodeId,
    pub size: Option<Vec2>,
    pub layer: Option<LayerConstraint>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutEdge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
}

/// Topology-only view of a graph; the solver never sees styling.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayoutInput {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
}

impl LayoutInput {
    pub fn from_graph(graph: &GraphData) -> Self {
        Self {
            nodes: graph
                .nodes
                .iter()
                .map(|n| LayoutNode {
                    id: n.id.clone(),
                    size: Some(n.size),
                    layer: n.layer,
                })
                .collect(),
            edges: graph
                .edges
                .iter()
                .map(|e| LayoutEdge {
                    id: e.id.clone(),
                    source: e.source.clone(),
                    target: e.target.clone(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutResult {
    /// Top-left corner of every node.
    pub positions: HashMap<NodeId, Vec2>,
    pub routes: HashMap<EdgeId, Vec<Vec2>>,
    pub layers: HashMap<NodeId, usize>,
    pub size: Vec2,
}

impl LayoutResult {
    /// Copy positions and routes onto a graph with the same topology.
    pub fn apply_to(&self, graph: &GraphData) -> GraphData {
        let nodes = graph
            .nodes
            .iter()
            .map(|node| GraphNode {
                position: self.positions.get(&node.id).copied().unwrap_or(node.position),
                ..node.clone()
            })
            .collect();
        let edges = graph
            .edges
            .iter()
            .map(|edge| GraphEdge {
                route: self.routes.get(&edge.id).cloned().unwrap_or_default(),
                ..edge.clone()
            })
            .collect();
        GraphData::new(nodes, edges)
    }
}

pub trait Layouter {
    fn execute(&self, input: &LayoutInput) -> Result<LayoutResult, LayoutError>;
}

/// Layered (Sugiyama-style) layout.
///
/// Pipeline: cycle breaking by DFS back-edge reversal, longest-path ranking
/// with `First`/`Last` pins forced to the extreme layers, dummy nodes for
/// edges spanning several layers, barycenter sweeps keeping the ordering with
/// the fewest crossings, then coordinate assignment and edge routing.
pub struct LayeredLayouter {
    pub options: LayoutOptions,
}

impl Default for LayeredLayouter {
    fn default() -> Self {
        Self::new(LayoutOptions::default())
    }
}

#[derive(Debug, Clone, Copy)]
struct ResolvedEdge {
    input: usize,
    source: usize,
    target: usize,
}

/// An edge spanning two or more layers, oriented from low to high rank.
struct EdgeChain {
    input: usize,
    vnodes: Vec<usize>,
    reversed: bool,
}

/// Proper layering: real nodes keep their index, dummies are appended.
struct VirtualGraph {
    ranks: Vec<usize>,
    along: Vec<f32>,
    cross: Vec<f32>,
    is_dummy: Vec<bool>,
    layers: Vec<Vec<usize>>,
    upper: Vec<Vec<usize>>,
    lower: Vec<Vec<usize>>,
    chains: Vec<EdgeChain>,
    flat: Vec<ResolvedEdge>,
    self_loops: Vec<ResolvedEdge>,
}

impl VirtualGraph {
    fn len(&self) -> usize {
        self.ranks.len()
    }

    fn add_dummy(&mut self, rank: usize) -> usize {
        let id = self.ranks.len();
        self.ranks.push(rank);
        self.along.push(0.0);
        self.cross.push(0.0);
        self.is_dummy.push(true);
        self.upper.push(Vec::new());
        self.lower.push(Vec::new());
        id
    }

    fn link(&mut self, upper: usize, lower: usize) {
        self.lower[upper].push(lower);
        self.upper[lower].push(upper);
    }
}

impl LayeredLayouter {
    const DEFAULT_NODE_WIDTH: f32 = 100.0;
    const DEFAULT_NODE_HEIGHT: f32 = 30.0;

    pub fn new(options: LayoutOptions) -> Self {
        Self { options }
    }

    fn default_node_size() -> Vec2 {
        Vec2::new(Self::DEFAULT_NODE_WIDTH, Self::DEFAULT_NODE_HEIGHT)
    }

    /// Split a world size into (extent along the layer axis, extent across it).
    fn abstract_size(&self, size: Vec2) -> (f32, f32) {
        match self.options.direction {
            LayoutDirection::Horizontal => (size.x, size.y),
            LayoutDirection::Vertical => (size.y, size.x),
        }
    }

    fn world(&self, along: f32, cross: f32) -> Vec2 {
        match self.options.direction {
            LayoutDirection::Horizontal => Vec2::new(along, cross),
            LayoutDirection::Vertical => Vec2::new(cross, along),
        }
    }

    fn index_nodes(input: &LayoutInput) -> Result<HashMap<&NodeId, usize>, LayoutError> {
        let mut index = HashMap::with_capacity(input.nodes.len());
        for (i, node) in input.nodes.iter().enumerate() {
            if let Some(size) = node.size
                && !(size.x.is_finite() && size.y.is_finite() && size.x >= 0.0 && size.y >= 0.0)
            {
                return Err(LayoutError::InvalidSize(node.id.clone()));
            }
            if index.insert(&node.id, i).is_some() {
                return Err(LayoutError::DuplicateNode(node.id.clone()));
            }
        }
        Ok(index)
    }

    fn resolve_edges(
        input: &LayoutInput,
        index: &HashMap<&NodeId, usize>,
    ) -> Result<Vec<ResolvedEdge>, LayoutError> {
        input
            .edges
            .iter()
            .enumerate()
            .map(|(i, edge)| {
                let lookup = |id: &NodeId| {
                    index
                        .get(id)
                        .copied()
                        .ok_or_else(|| LayoutError::UnknownNode {
                            edge: edge.id.clone(),
                            node: id.clone(),
                        })
                };
                Ok(ResolvedEdge {
                    input: i,
                    source: lookup(&edge.source)?,
                    target: lookup(&edge.target)?,
                })
            })
            .collect()
    }

    /// Marks DFS back edges among unpinned nodes; reversing them leaves a DAG.
    fn find_back_edges(
        node_count: usize,
        edges: &[ResolvedEdge],
        constraints: &[Option<LayerConstraint>],
    ) -> Vec<bool> {
        #[derive(Clone, Copy, PartialEq)]
        enum Mark {
            New,
            Active,
            Done,
        }

        let mut adjacency: Vec<Vec<(usize, usize)>> = vec![Vec::new(); node_count];
        for (i, edge) in edges.iter().enumerate() {
            if edge.source != edge.target
                && constraints[edge.source].is_none()
                && constraints[edge.target].is_none()
            {
                adjacency[edge.source].push((edge.target, i));
            }
        }

        let mut marks = vec![Mark::New; node_count];
        let mut back = vec![false; edges.len()];
        for root in 0..node_count {
            if marks[root] != Mark::New {
                continue;
            }
            marks[root] = Mark::Active;
            let mut stack = vec![(root, 0usize)];
            while let Some((node, cursor)) = stack.last_mut() {
                let node = *node;
                if let Some(&(target, edge)) = adjacency[node].get(*cursor) {
                    *cursor += 1;
                    match marks[target] {
                        Mark::New => {
                            marks[target] = Mark::Active;
                            stack.push((target, 0));
                        }
                        Mark::Active => back[edge] = true,
                        Mark::Done => {}
                    }
                } else {
                    marks[node] = Mark::Done;
                    stack.pop();
                }
            }
        }
        back
    }

    fn assign_ranks(
        node_count: usize,
        edges: &[ResolvedEdge],
        back: &[bool],
        constraints: &[Option<LayerConstraint>],
    ) -> Vec<usize> {
        let free = |i: usize| constraints[i].is_none();
        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); node_count];
        let mut in_degree = vec![0usize; node_count];
        for (i, edge) in edges.iter().enumerate() {
            if edge.source == edge.target || !free(edge.source) || !free(edge.target) {
                continue;
            }
            let (u, v) = if back[i] {
                (edge.target, edge.source)
            } else {
                (edge.source, edge.target)
            };
            successors[u].push(v);
            in_degree[v] += 1;
        }

        let mut ranks = vec![0usize; node_count];
        let mut queue: VecDeque<usize> = (0..node_count)
            .filter(|&i| free(i) && in_degree[i] == 0)
            .collect();
        let mut visited = 0;
        while let Some(u) = queue.pop_front() {
            visited += 1;
            for &v in &successors[u] {
                ranks[v] = ranks[v].max(ranks[u] + 1);
                in_degree[v] -= 1;
                if in_degree[v] == 0 {
                    queue.push_back(v);
                }
            }
        }

        let free_count = (0..node_count).filter(|&i| free(i)).count();
        if visited < free_count {
            tracing::warn!(
                "Ranking visited {} of {} nodes; remaining nodes keep rank 0",
                visited,
                free_count
            );
        }

        let offset = usize::from(constraints.contains(&Some(LayerConstraint::First)));
        let last_rank = (0..node_count)
            .filter(|&i| free(i))
            .map(|i| ranks[i] + offset + 1)
            .max()
            .unwrap_or(offset);
        for (i, rank) in ranks.iter_mut().enumerate() {
            *rank = match constraints[i] {
                None => *rank + offset,
                Some(LayerConstraint::First) => 0,
                Some(LayerConstraint::Last) => last_rank,
            };
        }

        Self::compress_ranks(&mut ranks);
        ranks
    }

    fn compress_ranks(ranks: &mut [usize]) {
        if ranks.is_empty() {
            return;
        }

        let mut unique_ranks: Vec<usize> = ranks.to_vec();
        unique_ranks.sort_unstable();
        unique_ranks.dedup();

        let remap: HashMap<usize, usize> = unique_ranks
            .iter()
            .enumerate()
            .map(|(i, rank)| (*rank, i))
            .collect();

        for rank in ranks.iter_mut() {
            if let Some(new_rank) = remap.get(rank) {
                *rank = *new_rank;
            }
        }
    }

    fn build_virtual_graph(
        &self,
        input: &LayoutInput,
        edges: &[ResolvedEdge],
        ranks: &[usize],
    ) -> VirtualGraph {
        let node_count = input.nodes.len();
        let (along, cross): (Vec<f32>, Vec<f32>) = input
            .nodes
            .iter()
            .map(|n| self.abstract_size(n.size.unwrap_or_else(Self::default_node_size)))
            .unzip();
        let layer_count = ranks.iter().max().map_or(0, |r| r + 1);

        let mut graph = VirtualGraph {
            ranks: ranks.to_vec(),
            along,
            cross,
            is_dummy: vec![false; node_count],
            layers: vec![Vec::new(); layer_count],
            upper: vec![Vec::new(); node_count],
            lower: vec![Vec::new(); node_count],
            chains: Vec::new(),
            flat: Vec::new(),
            self_loops: Vec::new(),
        };
        for (node, &rank) in ranks.iter().enumerate() {
            graph.layers[rank].push(node);
        }

        for &edge in edges {
            let (rs, rt) = (ranks[edge.source], ranks[edge.target]);
            if edge.source == edge.target {
                graph.self_loops.push(edge);
                continue;
            }
            if rs == rt {
                graph.flat.push(edge);
                continue;
            }
            let reversed = rs > rt;
            let (low, high) = if reversed {
                (edge.target, edge.source)
            } else {
                (edge.source, edge.target)
            };
            let mut vnodes = vec![low];
            for rank in ranks[low] + 1..ranks[high] {
                let dummy = graph.add_dummy(rank);
                graph.layers[rank].push(dummy);
                vnodes.push(dummy);
            }
            vnodes.push(high);
            for pair in vnodes.windows(2) {
                graph.link(pair[0], pair[1]);
            }
            graph.chains.push(EdgeChain {
                input: edge.input,
                vnodes,
                reversed,
            });
        }
        graph
    }

    fn positions_in_layers(layers: &[Vec<usize>], vnode_count: usize) -> Vec<usize> {
        let mut pos = vec![0usize; vnode_count];
        for layer in layers {
            for (i, &v) in layer.iter().enumerate() {
                pos[v] = i;
            }
        }
        pos
    }

    fn count_crossings(layers: &[Vec<usize>], lower: &[Vec<usize>], pos: &[usize]) -> usize {
        let mut total = 0;
        for layer in layers {
            let mut segments: Vec<(usize, usize)> = layer
                .iter()
                .flat_map(|&u| lower[u].iter().map(move |&v| (pos[u], pos[v])))
                .collect();
            segments.sort_unstable();
            for i in 0..segments.len() {
                for j in (i + 1)..segments.len() {
                    if segments[i].0 < segments[j].0 && segments[i].1 > segments[j].1 {
                        total += 1;
                    }
                }
            }
        }
        total
    }

    fn order_layer_by_barycenter(layer: &mut [usize], pos: &[usize], neighbors: &[Vec<usize>]) {
        let barycenter = |node: usize| {
            let adjacent = &neighbors[node];
            if adjacent.is_empty() {
                pos[node] as f32
            } else {
                adjacent.iter().map(|&n| pos[n] as f32).sum::<f32>() / adjacent.len() as f32
            }
        };
        let mut keyed: Vec<(f32, usize)> = layer.iter().map(|&n| (barycenter(n), n)).collect();
        keyed.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        for (slot, (_, node)) in layer.iter_mut().zip(keyed) {
            *slot = node;
        }
    }

    fn minimize_crossings(&self, graph: &mut VirtualGraph) {
        let mut pos = Self::positions_in_layers(&graph.layers, graph.len());
        let mut best = Self::count_crossings(&graph.layers, &graph.lower, &pos);
        let mut best_layers = graph.layers.clone();

        for _ in 0..self.options.sweeps {
            if best == 0 {
                break;
            }
            for rank in 1..graph.layers.len() {
                Self::order_layer_by_barycenter(&mut graph.layers[rank], &pos, &graph.upper);
                for (i, &v) in graph.layers[rank].iter().enumerate() {
                    pos[v] = i;
                }
            }
            for rank in (0..graph.layers.len().saturating_sub(1)).rev() {
                Self::order_layer_by_barycenter(&mut graph.layers[rank], &pos, &graph.lower);
                for (i, &v) in graph.layers[rank].iter().enumerate() {
                    pos[v] = i;
                }
            }

            let crossings = Self::count_crossings(&graph.layers, &graph.lower, &pos);
            if crossings < best {
                best = crossings;
                best_layers = graph.layers.clone();
            }
        }

        tracing::debug!("Layer ordering settled with {} crossings", best);
        graph.layers = best_layers;
    }

    fn gap(&self, graph: &VirtualGraph, a: usize, b: usize) -> f32 {
        if graph.is_dummy[a] || graph.is_dummy[b] {
            self.options.edge_spacing
        } else {
            self.options.node_spacing
        }
    }

    /// Pack a layer in order, each node as close to its desired centre as the
    /// spacing allows, then shift the whole layer to cancel the average drift.
    fn pack_layer(&self, graph: &VirtualGraph, layer: &[usize], desired: &[f32], centers: &mut [f32]) {
        let mut previous: Option<usize> = None;
        for &v in layer {
            let wanted = desired[v];
            centers[v] = match previous {
                None => wanted,
                Some(p) => {
                    let min = centers[p]
                        + graph.cross[p] / 2.0
                        + self.gap(graph, p, v)
                        + graph.cross[v] / 2.0;
                    wanted.max(min)
                }
            };
            previous = Some(v);
        }
        if !layer.is_empty() {
            let drift = layer
                .iter()
                .map(|&v| desired[v] - centers[v])
                .sum::<f32>()
                / layer.len() as f32;
            for &v in layer {
                centers[v] += drift;
            }
        }
    }

    fn assign_cross_coordinates(&self, graph: &VirtualGraph) -> Vec<f32> {
        let mut centers = vec![0.0f32; graph.len()];

        // Initial packing, each layer centred on zero.
        for layer in &graph.layers {
            let mut cursor = 0.0;
            for (i, &v) in layer.iter().enumerate() {
                if i > 0 {
                    cursor += self.gap(graph, layer[i - 1], v);
                }
                centers[v] = cursor + graph.cross[v] / 2.0;
                cursor += graph.cross[v];
            }
            for &v in layer {
                centers[v] -= cursor / 2.0;
            }
        }

        let mut desired = vec![0.0f32; graph.len()];
        for _ in 0..self.options.sweeps {
            for (sweep_down, neighbors) in [(true, &graph.upper), (false, &graph.lower)] {
                let ranks: Vec<usize> = if sweep_down {
                    (1..graph.layers.len()).collect()
                } else {
                    (0..graph.layers.len().saturating_sub(1)).rev().collect()
                };
                for rank in ranks {
                    let layer = &graph.layers[rank];
                    for &v in layer {
                        let adjacent = &neighbors[v];
                        desired[v] = if adjacent.is_empty() {
                            centers[v]
                        } else {
                            adjacent.iter().map(|&n| centers[n]).sum::<f32>() / adjacent.len() as f32
                        };
                    }
                    self.pack_layer(graph, layer, &desired, &mut centers);
                }
            }
        }
        centers
    }

    fn layer_offsets(&self, graph: &VirtualGraph) -> (Vec<f32>, Vec<f32>) {
        let thickness: Vec<f32> = graph
            .layers
            .iter()
            .map(|layer| layer.iter().map(|&v| graph.along[v]).fold(0.0, f32::max))
            .collect();
        let mut starts = Vec::with_capacity(thickness.len());
        let mut cursor = 0.0;
        for t in &thickness {
            starts.push(cursor);
            cursor += t + self.options.layer_spacing;
        }
        (starts, thickness)
    }

    fn orthogonalize(points: Vec<(f32, f32)>) -> Vec<(f32, f32)> {
        let mut routed = Vec::with_capacity(points.len() * 2);
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            routed.push(a);
            if (a.1 - b.1).abs() > f32::EPSILON && (a.0 - b.0).abs() > f32::EPSILON {
                let mid = (a.0 + b.0) / 2.0;
                routed.push((mid, a.1));
                routed.push((mid, b.1));
            }
        }
        if let Some(&last) = points.last() {
            routed.push(last);
        }
        routed
    }

    fn route_edges(
        &self,
        input: &LayoutInput,
        graph: &VirtualGraph,
        centers: &[f32],
        starts: &[f32],
        thickness: &[f32],
    ) -> HashMap<EdgeId, Vec<Vec2>> {
        let column_center = |v: usize| starts[graph.ranks[v]] + thickness[graph.ranks[v]] / 2.0;
        let exit = |v: usize| column_center(v) + graph.along[v] / 2.0;
        let entry = |v: usize| column_center(v) - graph.along[v] / 2.0;

        let mut routes = HashMap::with_capacity(input.edges.len());
        for chain in &graph.chains {
            let last = chain.vnodes.len() - 1;
            let mut points: Vec<(f32, f32)> = chain
                .vnodes
                .iter()
                .enumerate()
                .map(|(i, &v)| {
                    let along = if i == 0 {
                        exit(v)
                    } else if i == last {
                        entry(v)
                    } else {
                        column_center(v)
                    };
                    (along, centers[v])
                })
                .collect();
            if self.options.edge_routing == EdgeRouting::Orthogonal {
                points = Self::orthogonalize(points);
            }
            if chain.reversed {
                points.reverse();
            }
            routes.insert(
                input.edges[chain.input].id.clone(),
                points.into_iter().map(|(a, c)| self.world(a, c)).collect(),
            );
        }

        for edge in &graph.flat {
            let (s, t) = (edge.source, edge.target);
            let direction = if centers[s] <= centers[t] { 1.0 } else { -1.0 };
            let points = [
                (column_center(s), centers[s] + direction * graph.cross[s] / 2.0),
                (column_center(t), centers[t] - direction * graph.cross[t] / 2.0),
            ];
            routes.insert(
                input.edges[edge.input].id.clone(),
                points.iter().map(|&(a, c)| self.world(a, c)).collect(),
            );
        }

        let reach = self.options.edge_spacing.max(1.0) * 2.0;
        for edge in &graph.self_loops {
            let v = edge.source;
            let side = centers[v] + graph.cross[v] / 2.0;
            let points = [
                (exit(v), centers[v]),
                (exit(v) + reach, centers[v]),
                (exit(v) + reach, side + reach),
                (column_center(v), side + reach),
                (column_center(v), side),
            ];
            routes.insert(
                input.edges[edge.input].id.clone(),
                points.iter().map(|&(a, c)| self.world(a, c)).collect(),
            );
        }
        routes
    }
}

impl Layouter for LayeredLayouter {
    fn execute(&self, input: &LayoutInput) -> Result<LayoutResult, LayoutError> {
        let index = Self::index_nodes(input)?;
        let edges = Self::resolve_edges(input, &index)?;
        if input.nodes.is_empty() {
            return Ok(LayoutResult::default());
        }

        let node_count = input.nodes.len();
        let constraints: Vec<Option<LayerConstraint>> =
            input.nodes.iter().map(|n| n.layer).collect();
        let back = Self::find_back_edges(node_count, &edges, &constraints);
        let ranks = Self::assign_ranks(node_count, &edges, &back, &constraints);

        let mut graph = self.build_virtual_graph(input, &edges, &ranks);
        self.minimize_crossings(&mut graph);
        let mut centers = self.assign_cross_coordinates(&graph);
        let (starts, thickness) = self.layer_offsets(&graph);

        // Shift so the topmost node edge sits at zero.
        let min_cross = (0..graph.len())
            .map(|v| centers[v] - graph.cross[v] / 2.0)
            .fold(f32::INFINITY, f32::min);
        if min_cross.is_finite() {
            for c in centers.iter_mut() {
                *c -= min_cross;
            }
        }

        let mut result = LayoutResult::default();
        let mut extent = (0.0f32, 0.0f32);
        for (i, node) in input.nodes.iter().enumerate() {
            let rank = graph.ranks[i];
            let along = starts[rank] + (thickness[rank] - graph.along[i]) / 2.0;
            let cross = centers[i] - graph.cross[i] / 2.0;
            extent.0 = extent.0.max(along + graph.along[i]);
            extent.1 = extent.1.max(cross + graph.cross[i]);
            result.positions.insert(node.id.clone(), self.world(along, cross));
            result.layers.insert(node.id.clone(), rank);
        }
        result.size = self.world(extent.0, extent.1);
        result.routes = self.route_edges(input, &graph, &centers, &starts, &thickness);
        Ok(result)
    }
}
