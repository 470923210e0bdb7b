use criterion::{Criterion, criterion_group, criterion_main};
use procflow_bench::util;
use procflow_graph::{EdgeRef, GraphBuilder, Palette, PathFinder, StructuralAugmenter};
use std::hint::black_box;

fn bench_layered_6x4(c: &mut Criterion) {
    // 4^6 = 4096 paths, well under the default limit.
    let (edges, start, end) = util::layered_edges(6, 4);
    let finder = PathFinder::default();

    c.bench_function("find_all_paths_layered_6x4", |b| {
        b.iter(|| {
            let search = finder.find_all_paths(black_box(&edges), &start, &end);
            black_box(search.paths.len());
        })
    });
}

fn bench_truncated_search(c: &mut Criterion) {
    let (edges, start, end) = util::layered_edges(10, 6);
    let finder = PathFinder {
        max_paths: 10_000,
        ..PathFinder::default()
    };

    c.bench_function("find_all_paths_truncated_10k", |b| {
        b.iter(|| {
            let search = finder.find_all_paths(black_box(&edges), &start, &end);
            black_box(search.stats.truncated);
        })
    });
}

fn bench_pruning_on_process_graph(c: &mut Criterion) {
    let records = util::process_records(24, 7);
    let graph = GraphBuilder::new(&Palette::Blues).build(&records);
    let (graph, _) = StructuralAugmenter::new(&[], &[]).augment(&graph);
    let edges: Vec<EdgeRef> = graph.edges.iter().map(EdgeRef::from).collect();
    let start = graph.nodes[0].id.clone();
    let end = graph.nodes[graph.nodes.len() / 2].id.clone();
    let finder = PathFinder::default();

    let mut group = c.benchmark_group("process_graph_paths");
    group.bench_function("pruned", |b| {
        b.iter(|| black_box(finder.find_all_paths(black_box(&edges), &start, &end)))
    });
    group.bench_function("unpruned", |b| {
        b.iter(|| black_box(finder.find_all_paths_unpruned(black_box(&edges), &start, &end)))
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_layered_6x4,
    bench_truncated_search,
    bench_pruning_on_process_graph
);
criterion_main!(benches);
