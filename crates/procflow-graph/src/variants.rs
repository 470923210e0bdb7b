//! Engine variants and case traces mapped into [`Path`]s.

use crate::path::{Path, PathKind, PathProvenance};
use procflow_core::{CaseTrace, NodeId, VariantRecord};

/// A mined variant as an absolute path.
///
/// `Avg_Timings` holds seconds since case start for each activity, so the
/// duration of hop `i` is the difference between entries `i + 1` and `i`.
pub fn variant_to_path(variant: &VariantRecord) -> Path {
    let mut path = Path::from_nodes(variant.path.iter().map(NodeId::new).collect());
    path.durations = (0..path.hops())
        .map(|i| match (variant.avg_timings.get(i), variant.avg_timings.get(i + 1)) {
            (Some(from), Some(to)) if from.is_finite() && to.is_finite() => Some((to - from).max(0.0)),
            _ => None,
        })
        .collect();
    path.provenance = Some(PathProvenance {
        frequency: Some(variant.frequency),
        percentage: Some(variant.percentage),
        ..PathProvenance::new(PathKind::Absolute)
    });
    path
}

/// Variants with at least one activity, in engine order.
pub fn variants_to_paths(variants: &[VariantRecord]) -> Vec<Path> {
    variants
        .iter()
        .filter(|v| !v.path.is_empty())
        .map(variant_to_path)
        .collect()
}

pub fn case_trace_to_path(trace: &CaseTrace) -> Path {
    let mut path = Path::from_nodes(trace.path.iter().map(NodeId::new).collect());
    path.durations = (0..path.hops())
        .map(|i| trace.durations.get(i).copied().filter(|d| d.is_finite()))
        .collect();
    path.provenance = Some(PathProvenance {
        case_id: Some(trace.case_id.clone()),
        ..PathProvenance::new(PathKind::Case)
    });
    path
}
