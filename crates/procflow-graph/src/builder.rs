//! Raw engine edge records → typed, styled graph.

use crate::model::{GraphData, GraphEdge, GraphNode};
use crate::style::{ColorPalette, EdgeStyle, normalize_weight, stroke_width_for};
use procflow_core::{EdgeId, EdgeRecord, NodeId};
use std::collections::{HashMap, HashSet};

/// Min/max of the statistical edge weights.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightRange {
    pub min: f64,
    pub max: f64,
}

impl WeightRange {
    pub fn from_weights(weights: impl IntoIterator<Item = f64>) -> Option<Self> {
        weights
            .into_iter()
            .filter(|w| w.is_finite())
            .fold(None, |range, w| match range {
                None => Some(WeightRange { min: w, max: w }),
                Some(r) => Some(WeightRange {
                    min: r.min.min(w),
                    max: r.max.max(w),
                }),
            })
    }

    /// Range with a zero span widened by one.
    pub fn guarded(&self) -> Self {
        if self.max <= self.min {
            Self {
                min: self.min,
                max: self.min + 1.0,
            }
        } else {
            *self
        }
    }

    pub fn normalize(&self, weight: f64) -> f64 {
        let range = self.guarded();
        normalize_weight(weight, range.min, range.max)
    }

    pub fn style_for(&self, weight: f64, palette: &dyn ColorPalette) -> EdgeStyle {
        let range = self.guarded();
        EdgeStyle::cached(
            palette.color_for(weight, range.min, range.max),
            stroke_width_for(self.normalize(weight)),
        )
    }
}

pub struct GraphBuilder<'p> {
    palette: &'p dyn ColorPalette,
}

impl<'p> GraphBuilder<'p> {
    pub fn new(palette: &'p dyn ColorPalette) -> Self {
        Self { palette }
    }

    pub fn build(&self, records: &[EdgeRecord]) -> GraphData {
        let mut nodes = Vec::new();
        let mut seen_nodes: HashSet<&str> = HashSet::new();
        let mut valid = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            let Some((source, target)) = record.endpoints() else {
                tracing::warn!(
                    "Skipping edge record {} with missing source or target: {:?} -> {:?}",
                    index,
                    record.source,
                    record.target
                );
                continue;
            };
            for name in [source, target] {
                if seen_nodes.insert(name) {
                    nodes.push(GraphNode::activity(NodeId::new(name)));
                }
            }
            valid.push((source, target, record));
        }

        let Some(range) = WeightRange::from_weights(valid.iter().map(|(_, _, r)| r.weight)) else {
            return GraphData::new(nodes, Vec::new());
        };

        let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();
        let edges = valid
            .into_iter()
            .map(|(source, target, record)| {
                let source_id = NodeId::new(source);
                let target_id = NodeId::new(target);
                let occurrence = pair_counts.entry((source, target)).or_insert(0);
                let id = if *occurrence == 0 {
                    EdgeId::between(&source_id, &target_id)
                } else {
                    EdgeId::indexed(&source_id, &target_id, *occurrence)
                };
                *occurrence += 1;

                GraphEdge {
                    id,
                    source: source_id,
                    target: target_id,
                    weight: record.weight,
                    label: record.label.clone(),
                    mean_duration_seconds: record.mean_duration_seconds,
                    total_duration_seconds: record.total_duration_seconds,
                    tooltip_mean_time: record.tooltip_mean_time.clone(),
                    tooltip_total_time: record.tooltip_total_time.clone(),
                    is_structural: false,
                    is_ghost: false,
                    style: range.style_for(record.weight, self.palette),
                    route: Vec::new(),
                }
            })
            .collect();

        GraphData::new(nodes, edges)
    }
}

/// Recompute the cached base style of every statistical edge under a new
/// palette. Structural and ghost edges keep their fixed styles.
pub fn restyle_edges(edges: &[GraphEdge], palette: &dyn ColorPalette) -> Vec<GraphEdge> {
    let range = WeightRange::from_weights(
        edges
            .iter()
            .filter(|e| e.is_statistical())
            .map(|e| e.weight),
    );
    edges
        .iter()
        .map(|edge| match range {
            Some(range) if edge.is_statistical() => GraphEdge {
                style: range.style_for(edge.weight, palette),
                ..edge.clone()
            },
            _ => edge.clone(),
        })
        .collect()
}
