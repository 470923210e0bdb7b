use procflow_core::{EdgeRecord, NodeId};
use procflow_graph::EdgeRef;

/// `S`, then `layers` layers of `width` nodes fully connected to the next
/// layer, then `T`. There are `width.pow(layers)` paths from `S` to `T`.
pub fn layered_edges(layers: usize, width: usize) -> (Vec<EdgeRef>, NodeId, NodeId) {
    let name = |layer: usize, i: usize| format!("L{layer}_{i}");
    let mut edges = Vec::new();
    for i in 0..width {
        edges.push(EdgeRef::new(format!("S->{}", name(0, i)), "S", &name(0, i)));
        let last = name(layers - 1, i);
        edges.push(EdgeRef::new(format!("{last}->T"), &last, "T"));
    }
    for layer in 0..layers.saturating_sub(1) {
        for i in 0..width {
            for j in 0..width {
                let (from, to) = (name(layer, i), name(layer + 1, j));
                edges.push(EdgeRef::new(format!("{from}->{to}"), &from, &to));
            }
        }
    }
    (edges, NodeId::new("S"), NodeId::new("T"))
}

/// A synthetic process with `activities` steps: a main chain, forward skips
/// and occasional rework loops, with deterministic weights.
pub fn process_records(activities: usize, seed: u64) -> Vec<EdgeRecord> {
    let mut state = seed.max(1);
    let mut next = move || {
        state = state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        state >> 33
    };

    let name = |i: usize| format!("Activity {i:03}");
    let mut records = Vec::new();
    for i in 0..activities.saturating_sub(1) {
        records.push(EdgeRecord::new(&name(i), &name(i + 1), (next() % 500 + 1) as f64));
        if next() % 3 == 0 && i + 3 < activities {
            let skip = i + 2 + (next() % 2) as usize;
            records.push(EdgeRecord::new(&name(i), &name(skip), (next() % 50 + 1) as f64));
        }
        if next() % 10 == 0 && i > 2 {
            let back = i - 1 - (next() % 2) as usize;
            records.push(EdgeRecord::new(&name(i), &name(back), (next() % 20 + 1) as f64));
        }
    }
    records
}
