use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{rngs::StdRng, Rng, SeedableRng};

use mapmerge_3d::RigidTransform;
use mapmerge_graph::{
    compute_global_transforms, largest_connected_component, max_spanning_tree, TransformEstimate,
};

fn complete_graph(num_nodes: usize) -> Vec<TransformEstimate> {
    let mut rng = StdRng::seed_from_u64(0);
    let mut estimates = Vec::new();
    for i in 0..num_nodes {
        for j in (i + 1)..num_nodes {
            let t = RigidTransform::from_translation([
                rng.random_range(-1.0..1.0),
                rng.random_range(-1.0..1.0),
                0.0,
            ]);
            estimates.push(TransformEstimate::new(i, j, Some(t), rng.random_range(0.0..50.0)));
        }
    }
    estimates
}

fn bench_spanning_tree(c: &mut Criterion) {
    let mut group = c.benchmark_group("spanning_tree");

    for num_nodes in [8, 32, 128] {
        let estimates = complete_graph(num_nodes);

        group.bench_with_input(
            BenchmarkId::new("max_spanning_tree", num_nodes),
            &estimates,
            |b, estimates| {
                b.iter(|| {
                    let component = largest_connected_component(num_nodes, estimates).unwrap();
                    black_box(max_spanning_tree(num_nodes, &component).unwrap().centers())
                })
            },
        );

        group.bench_with_input(
            BenchmarkId::new("compute_global_transforms", num_nodes),
            &estimates,
            |b, estimates| b.iter(|| black_box(compute_global_transforms(estimates, num_nodes, 10.0))),
        );
    }
    group.finish();
}

criterion_group!(benches, bench_spanning_tree);
criterion_main!(benches);
