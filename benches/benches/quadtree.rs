// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::Rect;
use umbra_quadtree::{QuadTree, QuadTreeConfig};

const WORLD: Rect = Rect::new(0.0, 0.0, 4096.0, 4096.0);

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
    fn next_f64(&mut self) -> f64 {
        let v = self.next_u64() >> 11;
        (v as f64) / ((1u64 << 53) as f64)
    }
}

fn gen_random_rects(count: usize, size: f64, seed: u64) -> Vec<Rect> {
    let mut rng = Rng::new(seed);
    (0..count)
        .map(|_| {
            let x0 = rng.next_f64() * (WORLD.width() - size);
            let y0 = rng.next_f64() * (WORLD.height() - size);
            Rect::new(x0, y0, x0 + size, y0 + size)
        })
        .collect()
}

fn gen_clustered_rects(n_clusters: usize, per_cluster: usize, spread: f64) -> Vec<Rect> {
    let mut rng = Rng::new(0xC1A5_7E55_9999_ABCD);
    let mut out = Vec::with_capacity(n_clusters * per_cluster);
    for _ in 0..n_clusters {
        let cx = spread + rng.next_f64() * (WORLD.width() - 2.0 * spread);
        let cy = spread + rng.next_f64() * (WORLD.height() - 2.0 * spread);
        for _ in 0..per_cluster {
            let x0 = cx + (rng.next_f64() - 0.5) * spread;
            let y0 = cy + (rng.next_f64() - 0.5) * spread;
            out.push(Rect::new(x0, y0, x0 + 12.0, y0 + 12.0));
        }
    }
    out
}

fn fresh_tree(rects: &[Rect]) -> QuadTree<usize, impl Fn(&usize) -> Rect + '_> {
    QuadTree::new(
        WORLD,
        move |&i: &usize| rects[i],
        QuadTreeConfig::default().with_unit_size(16.0),
    )
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("insert");
    for &n in &[1_000usize, 10_000] {
        let rects = gen_random_rects(n, 24.0, 0xCAFE_F00D_DEAD_BEEF);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("fresh_n{n}"), |b| {
            b.iter_batched(
                || fresh_tree(&rects),
                |mut tree| {
                    tree.insert_range(0..n);
                    black_box(tree.node_count());
                },
                BatchSize::SmallInput,
            );
        });
        group.bench_function(format!("soft_clear_refill_n{n}"), |b| {
            let mut tree = fresh_tree(&rects);
            tree.insert_range(0..n);
            b.iter(|| {
                tree.soft_clear();
                tree.insert_range(0..n);
                black_box(tree.count());
            });
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    let uniform = gen_random_rects(10_000, 24.0, 0xFACE_FEED_CAFE_BABE);
    let clustered = gen_clustered_rects(40, 250, 300.0);
    for (name, rects) in [("uniform", &uniform), ("clustered", &clustered)] {
        let mut tree = fresh_tree(rects);
        tree.insert_range(0..rects.len());
        let viewports = gen_random_rects(64, 640.0, 0xBADC_F00D_1234_5678);
        group.bench_function(format!("viewport_{name}"), |b| {
            let mut out = Vec::new();
            b.iter(|| {
                let mut hits = 0;
                for &v in &viewports {
                    out.clear();
                    tree.get_nodes(&mut out, v);
                    hits += out.len();
                }
                black_box(hits);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_insert, bench_query);
criterion_main!(benches);
