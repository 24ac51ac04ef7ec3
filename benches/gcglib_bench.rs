//! Performance benchmarks

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use gcglib::mesh::{focus_oracle, GridOracle, MeshConfig, Semiregular48};
use gcglib::ordered::{AvlTree, HashTable, HashTableConfig, NaturalOrder, Order, StdHashOrder};

/// Scrambled but reproducible keys.
fn keys(n: u64) -> Vec<u64> {
    (0..n).map(|i| i.wrapping_mul(0x9E37_79B9_7F4A_7C15) >> 16).collect()
}

fn benchmark_ordered(c: &mut Criterion) {
    let keys = keys(10_000);

    c.bench_function("avl_insert_10k", |b| {
        b.iter(|| {
            let mut tree = AvlTree::new(NaturalOrder);
            for &key in &keys {
                let _ = tree.insert(black_box(key));
            }
            tree
        });
    });

    c.bench_function("avl_remove_10k", |b| {
        b.iter_batched(
            || {
                let mut tree = AvlTree::new(NaturalOrder);
                for &key in &keys {
                    let _ = tree.insert(key);
                }
                tree
            },
            |mut tree| {
                for key in &keys {
                    black_box(tree.remove(key));
                }
            },
            BatchSize::LargeInput,
        );
    });

    let mut tree = AvlTree::new(NaturalOrder);
    for &key in &keys {
        let _ = tree.insert(key);
    }
    c.bench_function("avl_iterate_10k", |b| {
        b.iter(|| tree.iter(Order::Ascending).fold(0u64, |acc, k| acc ^ k));
    });

    c.bench_function("hash_insert_10k", |b| {
        b.iter(|| {
            let config = HashTableConfig::new().with_load_limits(0.5, 2.0);
            let mut table = HashTable::with_config(StdHashOrder, config).unwrap();
            for &key in &keys {
                let _ = table.insert(black_box(key));
            }
            table
        });
    });
}

fn benchmark_mesh(c: &mut Criterion) {
    c.bench_function("mesh_uniform_level_12", |b| {
        let mut mesh = Semiregular48::new(MeshConfig::new().with_max_level(12)).unwrap();
        b.iter(|| {
            let mut oracle = GridOracle::new(|_, _| true);
            mesh.tessellate_breadth_first(usize::MAX, &mut oracle).unwrap()
        });
    });

    c.bench_function("mesh_focus_depth_first", |b| {
        let mut mesh = Semiregular48::new(MeshConfig::new().with_max_level(20)).unwrap();
        b.iter(|| {
            let mut oracle = focus_oracle(black_box([0.3, 0.6]), 1.0);
            mesh.tessellate_depth_first(&mut oracle).unwrap()
        });
    });
}

criterion_group!(benches, benchmark_ordered, benchmark_mesh);
criterion_main!(benches);
