//! Selection and pathfinding state machine.
//!
//! [`InteractionState`] owns the render arrays once the pipeline hands them
//! over. Every intent that changes styling or selection replaces the node and
//! edge arrays wholesale; nothing downstream ever sees a half-updated graph.

use procflow_core::{EdgeId, NodeId};
use procflow_graph::style::{HIGHLIGHT_COLOR, PATH_HIGHLIGHT_COLOR};
use procflow_graph::{GraphData, GraphEdge, GraphNode, Palette, Path, PathSortKey, restyle_edges, sort_paths};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    #[default]
    Idle,
    NodeInspect {
        node: NodeId,
    },
    EdgeInspect {
        edge: EdgeId,
    },
    AwaitingStart,
    AwaitingEnd {
        start: NodeId,
    },
    Results {
        start: NodeId,
        end: NodeId,
        loading: bool,
    },
}

impl Mode {
    pub fn is_pathfinding(&self) -> bool {
        matches!(
            self,
            Mode::AwaitingStart | Mode::AwaitingEnd { .. } | Mode::Results { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Intent {
    ClickNode(NodeId),
    ClickEdge(EdgeId),
    ClickCanvas,
    CloseTooltip,
    SetPathfinding(bool),
    /// Index into the full result set, not the current page.
    SelectPath(usize),
    HighlightPath(Path),
    ClearPathSelection,
    PathsArrived(Vec<Path>),
    PathSearchFailed(String),
    SortPaths(PathSortKey),
    ShowPage(usize),
    SetPalette(Palette),
}

/// Work the owner of the state has to carry out after a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    FindPaths { start: NodeId, end: NodeId },
    CancelPathSearch,
    /// The selected path changed; the view may need ghost elements.
    SelectionChanged,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tooltip {
    Node {
        id: NodeId,
        incoming: Vec<EdgeId>,
        outgoing: Vec<EdgeId>,
    },
    Edge {
        id: EdgeId,
    },
}

#[derive(Debug, Clone)]
pub struct InteractionState {
    mode: Mode,
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    tooltip: Option<Tooltip>,
    highlighted_edge: Option<EdgeId>,
    results: Vec<Path>,
    page: usize,
    page_size: usize,
    selected_path: Option<Path>,
    selected_path_nodes: HashSet<NodeId>,
    selected_path_edges: HashSet<EdgeId>,
    palette: Palette,
}

impl InteractionState {
    pub fn new(page_size: usize, palette: Palette) -> Self {
        Self {
            mode: Mode::Idle,
            nodes: Vec::new(),
            edges: Vec::new(),
            tooltip: None,
            highlighted_edge: None,
            results: Vec::new(),
            page: 0,
            page_size: page_size.max(1),
            selected_path: None,
            selected_path_nodes: HashSet::new(),
            selected_path_edges: HashSet::new(),
            palette,
        }
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn graph(&self) -> GraphData {
        GraphData::new(self.nodes.clone(), self.edges.clone())
    }

    pub fn tooltip(&self) -> Option<&Tooltip> {
        self.tooltip.as_ref()
    }

    pub fn highlighted_edge(&self) -> Option<&EdgeId> {
        self.highlighted_edge.as_ref()
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    pub fn results(&self) -> &[Path] {
        &self.results
    }

    pub fn selected_path(&self) -> Option<&Path> {
        self.selected_path.as_ref()
    }

    pub fn selected_path_nodes(&self) -> &HashSet<NodeId> {
        &self.selected_path_nodes
    }

    pub fn selected_path_edges(&self) -> &HashSet<EdgeId> {
        &self.selected_path_edges
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.mode, Mode::Results { loading: true, .. })
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_count(&self) -> usize {
        self.results.len().div_ceil(self.page_size)
    }

    /// Paths in the current result page.
    pub fn current_page(&self) -> &[Path] {
        let start = (self.page * self.page_size).min(self.results.len());
        let end = (start + self.page_size).min(self.results.len());
        &self.results[start..end]
    }

    /// Swap in a new render graph while keeping selection state.
    ///
    /// Selections that no longer resolve in the new graph are dropped.
    pub fn replace_graph(&mut self, graph: GraphData) {
        self.nodes = graph.nodes;
        self.edges = graph.edges;

        if let Some(id) = &self.highlighted_edge
            && !self.edges.iter().any(|e| &e.id == id)
        {
            self.highlighted_edge = None;
            if matches!(self.mode, Mode::EdgeInspect { .. }) {
                self.mode = Mode::Idle;
                self.tooltip = None;
            }
        }
        if let Mode::NodeInspect { node } = &self.mode {
            if self.nodes.iter().any(|n| &n.id == node) {
                self.tooltip = Some(self.node_tooltip(node));
            } else {
                self.mode = Mode::Idle;
                self.tooltip = None;
            }
        }
        self.refresh();
    }

    /// Swap in a new render graph and forget every selection.
    pub fn reset_graph(&mut self, graph: GraphData) {
        self.mode = Mode::Idle;
        self.tooltip = None;
        self.highlighted_edge = None;
        self.results.clear();
        self.page = 0;
        self.selected_path = None;
        self.replace_graph(graph);
    }

    pub fn apply(&mut self, intent: Intent) -> Vec<Effect> {
        let effects = match intent {
            Intent::ClickNode(id) => self.click_node(id),
            Intent::ClickEdge(id) => self.click_edge(id),
            Intent::ClickCanvas | Intent::CloseTooltip => self.dismiss(),
            Intent::SetPathfinding(enabled) => self.set_pathfinding(enabled),
            Intent::SelectPath(index) => match self.results.get(index) {
                Some(path) => {
                    self.selected_path = Some(path.clone());
                    vec![Effect::SelectionChanged]
                }
                None => {
                    tracing::debug!("Ignoring selection of missing path {}", index);
                    Vec::new()
                }
            },
            Intent::HighlightPath(path) => {
                self.selected_path = Some(path);
                vec![Effect::SelectionChanged]
            }
            Intent::ClearPathSelection => {
                if self.selected_path.take().is_some() {
                    vec![Effect::SelectionChanged]
                } else {
                    Vec::new()
                }
            }
            Intent::PathsArrived(paths) => {
                if let Mode::Results { loading, .. } = &mut self.mode
                    && *loading
                {
                    *loading = false;
                    self.results = paths;
                    self.page = 0;
                } else {
                    tracing::debug!("Discarding {} paths that arrived with no search pending", paths.len());
                }
                Vec::new()
            }
            Intent::PathSearchFailed(message) => {
                if let Mode::Results { loading, .. } = &mut self.mode {
                    tracing::warn!("Path search failed: {}", message);
                    *loading = false;
                    self.results.clear();
                    self.page = 0;
                }
                Vec::new()
            }
            Intent::SortPaths(key) => {
                let lookup: HashMap<&EdgeId, &GraphEdge> =
                    self.edges.iter().map(|e| (&e.id, e)).collect();
                self.results = sort_paths(std::mem::take(&mut self.results), key, &lookup);
                self.page = 0;
                Vec::new()
            }
            Intent::ShowPage(page) => {
                self.page = page.min(self.page_count().saturating_sub(1));
                Vec::new()
            }
            Intent::SetPalette(palette) => {
                self.palette = palette;
                self.edges = restyle_edges(&self.edges, &palette);
                Vec::new()
            }
        };
        self.refresh();
        effects
    }

    fn click_node(&mut self, id: NodeId) -> Vec<Effect> {
        if !self.nodes.iter().any(|n| n.id == id) {
            tracing::debug!("Ignoring click on unknown node {}", id);
            return Vec::new();
        }
        match std::mem::take(&mut self.mode) {
            Mode::AwaitingStart => {
                self.mode = Mode::AwaitingEnd { start: id };
                Vec::new()
            }
            Mode::AwaitingEnd { start } if start == id => {
                self.mode = Mode::AwaitingEnd { start };
                Vec::new()
            }
            Mode::AwaitingEnd { start } => {
                self.results.clear();
                self.page = 0;
                self.mode = Mode::Results {
                    start: start.clone(),
                    end: id.clone(),
                    loading: true,
                };
                vec![Effect::FindPaths { start, end: id }]
            }
            Mode::Results { loading, .. } => {
                self.results.clear();
                self.page = 0;
                self.mode = Mode::AwaitingEnd { start: id };
                let mut effects = Vec::new();
                if loading {
                    effects.push(Effect::CancelPathSearch);
                }
                if self.selected_path.take().is_some() {
                    effects.push(Effect::SelectionChanged);
                }
                effects
            }
            Mode::Idle | Mode::NodeInspect { .. } | Mode::EdgeInspect { .. } => {
                self.highlighted_edge = None;
                self.tooltip = Some(self.node_tooltip(&id));
                self.mode = Mode::NodeInspect { node: id };
                Vec::new()
            }
        }
    }

    fn click_edge(&mut self, id: EdgeId) -> Vec<Effect> {
        if self.mode.is_pathfinding() {
            return Vec::new();
        }
        let Some(index) = self.edges.iter().position(|e| e.id == id) else {
            tracing::debug!("Ignoring click on unknown edge {}", id);
            return Vec::new();
        };

        if self.highlighted_edge.as_ref() == Some(&id) {
            self.highlighted_edge = None;
            self.tooltip = None;
            self.mode = Mode::Idle;
        } else {
            let edge = self.edges.remove(index);
            self.edges.push(edge);
            self.highlighted_edge = Some(id.clone());
            self.tooltip = Some(Tooltip::Edge { id: id.clone() });
            self.mode = Mode::EdgeInspect { edge: id };
        }
        Vec::new()
    }

    fn dismiss(&mut self) -> Vec<Effect> {
        let was_loading = self.is_loading();
        self.tooltip = None;
        self.highlighted_edge = None;
        self.results.clear();
        self.page = 0;
        self.mode = Mode::Idle;

        let mut effects = Vec::new();
        if was_loading {
            effects.push(Effect::CancelPathSearch);
        }
        if self.selected_path.take().is_some() {
            effects.push(Effect::SelectionChanged);
        }
        effects
    }

    fn set_pathfinding(&mut self, enabled: bool) -> Vec<Effect> {
        let was_loading = self.is_loading();
        let had_selection = self.selected_path.take().is_some();
        self.tooltip = None;
        self.highlighted_edge = None;
        self.results.clear();
        self.page = 0;
        self.mode = if enabled { Mode::AwaitingStart } else { Mode::Idle };

        let mut effects = Vec::new();
        if was_loading {
            effects.push(Effect::CancelPathSearch);
        }
        if had_selection {
            effects.push(Effect::SelectionChanged);
        }
        effects
    }

    fn node_tooltip(&self, id: &NodeId) -> Tooltip {
        Tooltip::Node {
            id: id.clone(),
            incoming: self
                .edges
                .iter()
                .filter(|e| &e.target == id)
                .map(|e| e.id.clone())
                .collect(),
            outgoing: self
                .edges
                .iter()
                .filter(|e| &e.source == id)
                .map(|e| e.id.clone())
                .collect(),
        }
    }

    /// Recompute every override from the cached original styles.
    fn refresh(&mut self) {
        self.selected_path_nodes.clear();
        self.selected_path_edges.clear();
        if let Some(path) = &self.selected_path {
            self.selected_path_nodes.extend(path.nodes.iter().cloned());
            let pairs: HashSet<(&NodeId, &NodeId)> = path.pairs().collect();
            self.selected_path_edges.extend(
                self.edges
                    .iter()
                    .filter(|e| pairs.contains(&(&e.source, &e.target)))
                    .map(|e| e.id.clone()),
            );
        }

        let focus = match &self.mode {
            Mode::NodeInspect { node } => Some(node),
            _ => None,
        };
        let edges = self
            .edges
            .iter()
            .map(|edge| {
                let style = if self.highlighted_edge.as_ref() == Some(&edge.id)
                    || focus == Some(&edge.source)
                {
                    edge.style.highlighted(HIGHLIGHT_COLOR)
                } else if self.selected_path.is_none() {
                    edge.style.restored()
                } else if self.selected_path_edges.contains(&edge.id) {
                    edge.style.highlighted(PATH_HIGHLIGHT_COLOR)
                } else {
                    edge.style.dimmed()
                };
                GraphEdge {
                    style,
                    ..edge.clone()
                }
            })
            .collect();

        let selected: Vec<&NodeId> = match &self.mode {
            Mode::NodeInspect { node } => vec![node],
            Mode::AwaitingEnd { start } => vec![start],
            Mode::Results { start, end, .. } => vec![start, end],
            _ => Vec::new(),
        };
        let nodes = self
            .nodes
            .iter()
            .map(|node| GraphNode {
                selected: selected.contains(&&node.id),
                ..node.clone()
            })
            .collect();

        self.edges = edges;
        self.nodes = nodes;
    }
}
