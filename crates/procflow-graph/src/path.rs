use crate::model::GraphEdge;
use procflow_core::{EdgeId, NodeId, format_duration};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathKind {
    /// A full-length variant as mined by the engine.
    Absolute,
    /// A window into a longer node sequence.
    Relative,
    /// The trajectory of one case.
    Case,
}

/// Read-only annotations carried by mined paths. The pathfinding engine
/// neither produces nor reads these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathProvenance {
    pub kind: PathKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_index: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
}

impl PathProvenance {
    pub fn new(kind: PathKind) -> Self {
        Self {
            kind,
            frequency: None,
            percentage: None,
            start_index: None,
            end_index: None,
            case_id: None,
        }
    }
}

/// `edges[i]` connects `nodes[i]` to `nodes[i + 1]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Path {
    pub nodes: Vec<NodeId>,
    pub edges: Vec<EdgeId>,
    /// Per-edge seconds when known from the source of the path.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub durations: Vec<Option<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<PathProvenance>,
}

impl Path {
    /// Path over `nodes` using conventional `"{source}->{target}"` edge ids.
    pub fn from_nodes(nodes: Vec<NodeId>) -> Self {
        let edges = nodes
            .windows(2)
            .map(|pair| EdgeId::between(&pair[0], &pair[1]))
            .collect();
        Self {
            nodes,
            edges,
            durations: Vec::new(),
            provenance: None,
        }
    }

    pub fn hops(&self) -> usize {
        self.edges.len()
    }

    pub fn start(&self) -> Option<&NodeId> {
        self.nodes.first()
    }

    pub fn end(&self) -> Option<&NodeId> {
        self.nodes.last()
    }

    /// `(source, target)` of every hop.
    pub fn pairs(&self) -> impl Iterator<Item = (&NodeId, &NodeId)> {
        self.nodes.windows(2).map(|pair| (&pair[0], &pair[1]))
    }

    /// Edge count matches node count and no node repeats.
    pub fn is_simple(&self) -> bool {
        if self.nodes.is_empty() {
            return self.edges.is_empty();
        }
        let mut seen = HashSet::with_capacity(self.nodes.len());
        self.edges.len() + 1 == self.nodes.len() && self.nodes.iter().all(|n| seen.insert(n))
    }

    /// Every edge id exists and joins the matching consecutive nodes.
    pub fn is_connected_in(&self, lookup: &HashMap<&EdgeId, &GraphEdge>) -> bool {
        self.edges.len() + 1 == self.nodes.len()
            && self.edges.iter().zip(self.pairs()).all(|(id, (s, t))| {
                lookup
                    .get(id)
                    .is_some_and(|edge| &edge.source == s && &edge.target == t)
            })
    }

    /// Sub-path over node indices `start..=end`.
    pub fn window(&self, start: usize, end: usize) -> Option<Path> {
        if start >= end || end >= self.nodes.len() {
            return None;
        }
        let parent = self.provenance.as_ref();
        let offset = parent.and_then(|p| p.start_index).unwrap_or(0);
        let provenance = PathProvenance {
            kind: PathKind::Relative,
            frequency: parent.and_then(|p| p.frequency),
            percentage: parent.and_then(|p| p.percentage),
            start_index: Some(offset + start),
            end_index: Some(offset + end),
            case_id: parent.and_then(|p| p.case_id.clone()),
        };
        Some(Path {
            nodes: self.nodes[start..=end].to_vec(),
            edges: self.edges.get(start..end)?.to_vec(),
            durations: self.durations.get(start..end).map(<[_]>::to_vec).unwrap_or_default(),
            provenance: Some(provenance),
        })
    }

    fn duration_at(&self, index: usize, lookup: &HashMap<&EdgeId, &GraphEdge>) -> Option<f64> {
        self.durations
            .get(index)
            .copied()
            .flatten()
            .or_else(|| {
                lookup
                    .get(&self.edges[index])
                    .filter(|edge| edge.is_statistical())
                    .and_then(|edge| edge.mean_duration_seconds)
            })
            .filter(|d| d.is_finite())
    }

    pub fn metrics(&self, lookup: &HashMap<&EdgeId, &GraphEdge>) -> PathMetrics {
        let known: Vec<f64> = (0..self.edges.len())
            .filter_map(|i| self.duration_at(i, lookup))
            .collect();
        let total = (!known.is_empty()).then(|| known.iter().sum::<f64>());
        PathMetrics {
            hops: self.hops(),
            known_durations: known.len(),
            total_duration_seconds: total,
            average_duration_seconds: total.map(|t| t / known.len() as f64),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PathMetrics {
    pub hops: usize,
    /// Edges that contributed a duration.
    pub known_durations: usize,
    pub total_duration_seconds: Option<f64>,
    pub average_duration_seconds: Option<f64>,
}

impl PathMetrics {
    pub fn total_label(&self) -> String {
        format_duration(self.total_duration_seconds)
    }

    pub fn average_label(&self) -> String {
        format_duration(self.average_duration_seconds)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PathSortKey {
    #[default]
    Hops,
    TotalDuration,
    AverageDuration,
}

impl FromStr for PathSortKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hops" => Ok(Self::Hops),
            "total" | "total-duration" => Ok(Self::TotalDuration),
            "average" | "average-duration" => Ok(Self::AverageDuration),
            other => Err(format!("unknown sort key: {other}")),
        }
    }
}

/// Ascending sort by `key`. Stable; paths without the metric go last.
pub fn sort_paths(
    paths: Vec<Path>,
    key: PathSortKey,
    lookup: &HashMap<&EdgeId, &GraphEdge>,
) -> Vec<Path> {
    let mut keyed: Vec<(Option<f64>, Path)> = paths
        .into_iter()
        .map(|path| {
            let metrics = path.metrics(lookup);
            let value = match key {
                PathSortKey::Hops => Some(metrics.hops as f64),
                PathSortKey::TotalDuration => metrics.total_duration_seconds,
                PathSortKey::AverageDuration => metrics.average_duration_seconds,
            };
            (value, path)
        })
        .collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    keyed.into_iter().map(|(_, path)| path).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::GraphBuilder;
    use crate::style::Palette;
    use procflow_core::EdgeRecord;

    fn ids(names: &[&str]) -> Vec<NodeId> {
        names.iter().map(|n| NodeId::new(*n)).collect()
    }

    fn timed(source: &str, target: &str, seconds: f64) -> EdgeRecord {
        EdgeRecord {
            mean_duration_seconds: Some(seconds),
            ..EdgeRecord::new(source, target, 1.0)
        }
    }

    #[test]
    fn test_from_nodes_uses_conventional_edge_ids() {
        let path = Path::from_nodes(ids(&["A", "B", "C"]));
        assert_eq!(path.edges, vec![EdgeId::from("A->B"), EdgeId::from("B->C")]);
        assert!(path.is_simple());
        assert_eq!(path.hops(), 2);
    }

    #[test]
    fn test_repeated_node_is_not_simple() {
        assert!(!Path::from_nodes(ids(&["A", "B", "A"])).is_simple());
        let mut broken = Path::from_nodes(ids(&["A", "B"]));
        broken.edges.clear();
        assert!(!broken.is_simple());
    }

    #[test]
    fn test_window_records_relative_markers() {
        let mut path = Path::from_nodes(ids(&["A", "B", "C", "D"]));
        path.durations = vec![Some(1.0), Some(2.0), Some(3.0)];
        path.provenance = Some(PathProvenance {
            frequency: Some(7),
            ..PathProvenance::new(PathKind::Absolute)
        });

        let window = path.window(1, 3).unwrap();
        assert_eq!(window.nodes, ids(&["B", "C", "D"]));
        assert_eq!(window.durations, vec![Some(2.0), Some(3.0)]);
        let provenance = window.provenance.as_ref().unwrap();
        assert_eq!(provenance.kind, PathKind::Relative);
        assert_eq!(provenance.frequency, Some(7));
        assert_eq!((provenance.start_index, provenance.end_index), (Some(1), Some(3)));

        let nested = window.window(0, 1).unwrap();
        let provenance = nested.provenance.unwrap();
        assert_eq!((provenance.start_index, provenance.end_index), (Some(1), Some(2)));
    }

    #[test]
    fn test_window_rejects_bad_bounds() {
        let path = Path::from_nodes(ids(&["A", "B"]));
        assert!(path.window(1, 1).is_none());
        assert!(path.window(0, 2).is_none());
    }

    #[test]
    fn test_metrics_skip_unknown_durations() {
        let graph = GraphBuilder::new(&Palette::Blues).build(&[
            timed("A", "B", 60.0),
            EdgeRecord::new("B", "C", 1.0),
            timed("C", "D", 120.0),
        ]);
        let lookup = graph.edge_lookup();
        let metrics = Path::from_nodes(ids(&["A", "B", "C", "D"])).metrics(&lookup);

        assert_eq!(metrics.hops, 3);
        assert_eq!(metrics.known_durations, 2);
        assert_eq!(metrics.total_duration_seconds, Some(180.0));
        assert_eq!(metrics.average_duration_seconds, Some(90.0));
        assert_eq!(metrics.total_label(), "03m");
    }

    #[test]
    fn test_stored_durations_take_precedence() {
        let graph = GraphBuilder::new(&Palette::Blues).build(&[timed("A", "B", 60.0)]);
        let mut path = Path::from_nodes(ids(&["A", "B"]));
        path.durations = vec![Some(5.0)];
        let metrics = path.metrics(&graph.edge_lookup());
        assert_eq!(metrics.total_duration_seconds, Some(5.0));
    }

    #[test]
    fn test_sort_paths_is_explicit_and_stable() {
        let graph = GraphBuilder::new(&Palette::Blues).build(&[
            timed("A", "B", 100.0),
            timed("B", "D", 100.0),
            timed("A", "D", 500.0),
            EdgeRecord::new("A", "C", 1.0),
            EdgeRecord::new("C", "D", 1.0),
        ]);
        let lookup = graph.edge_lookup();
        let paths = vec![
            Path::from_nodes(ids(&["A", "D"])),
            Path::from_nodes(ids(&["A", "C", "D"])),
            Path::from_nodes(ids(&["A", "B", "D"])),
        ];

        let by_total = sort_paths(paths.clone(), PathSortKey::TotalDuration, &lookup);
        assert_eq!(by_total[0].nodes, ids(&["A", "B", "D"]));
        assert_eq!(by_total[1].nodes, ids(&["A", "D"]));
        assert_eq!(by_total[2].nodes, ids(&["A", "C", "D"]));

        let by_hops = sort_paths(paths, PathSortKey::Hops, &lookup);
        assert_eq!(by_hops[0].nodes, ids(&["A", "D"]));
        assert_eq!(by_hops[1].nodes, ids(&["A", "C", "D"]));
    }

    #[test]
    fn test_connected_in_checks_endpoints() {
        let graph = GraphBuilder::new(&Palette::Blues).build(&[EdgeRecord::new("A", "B", 1.0)]);
        let lookup = graph.edge_lookup();
        assert!(Path::from_nodes(ids(&["A", "B"])).is_connected_in(&lookup));
        assert!(!Path::from_nodes(ids(&["B", "A"])).is_connected_in(&lookup));
    }
}
