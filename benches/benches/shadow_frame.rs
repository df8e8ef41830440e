// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Rect};
use umbra_shadow::{
    Caster, CasterFlags, CasterKind, CommandRecorder, Light, LightId, MeshHandle, MeshShadow,
    NoAncestry, RealmConfig, RenderTargetId, RendererHandle, ShadowRenderer, ShadowWorld,
};

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

/// `n` mesh casters spread over the world; a tenth static, groups of up to 8 members.
fn populate(n: usize, iterations_per_frame: usize) -> ShadowWorld {
    let config = RealmConfig::default()
        .with_world_rect(WORLD)
        .with_iterations_per_frame(iterations_per_frame);
    let mut world = ShadowWorld::new(config).expect("valid realm config");
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    for i in 0..n {
        let x0 = rng.next_f64() * (WORLD.width() - 32.0);
        let y0 = rng.next_f64() * (WORLD.height() - 32.0);
        let mut flags = CasterFlags::default();
        if i % 10 == 0 {
            flags |= CasterFlags::STATIC;
        }
        let caster = Caster::new(
            CasterKind::Mesh(MeshShadow::new(MeshHandle(i as u64))),
            Rect::new(x0, y0, x0 + 32.0, y0 + 32.0),
        )
        .with_flags(flags)
        .with_shadow_group((i / 8) as i32)
        .with_silhouette_renderer(RendererHandle(i as u64));
        world.add_caster(caster);
    }
    world.update(&NoAncestry);
    while !world.tick() {}
    world
}

fn bench_rebuild(c: &mut Criterion) {
    let mut group = c.benchmark_group("rebuild");
    for &n in &[1_000usize, 10_000] {
        let mut world = populate(n, n);
        group.throughput(Throughput::Elements(n as u64));
        group.bench_function(format!("full_tick_n{n}"), |b| {
            b.iter(|| black_box(world.tick()));
        });
        let mut world = populate(n, 100);
        group.bench_function(format!("sliced_tick_n{n}"), |b| {
            b.iter(|| black_box(world.tick()));
        });
    }
    group.finish();
}

fn bench_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame");
    let mut world = populate(10_000, 10_000);
    let viewport = Rect::new(1024.0, 1024.0, 2944.0, 2104.0);
    group.bench_function("optimize_shadows", |b| {
        b.iter(|| {
            world.optimize_shadows(viewport);
            black_box(world.culled_casters().len());
        });
    });

    world.optimize_shadows(viewport);
    let lights: Vec<Light> = (0..8)
        .map(|i| {
            let x = viewport.x0 + f64::from(i) * viewport.width() / 8.0;
            Light::new(LightId(i), Point::new(x, viewport.center().y), 300.0)
        })
        .collect();
    let mut renderer = ShadowRenderer::default();
    group.bench_function("render_8_lights", |b| {
        let mut sink = CommandRecorder::new();
        b.iter(|| {
            for light in &lights {
                let stats = renderer.render_shadows(&mut sink, &world, 0, light, RenderTargetId(0));
                black_box(stats);
            }
            black_box(sink.take().len());
        });
    });
    group.finish();
}

criterion_group!(benches, bench_rebuild, bench_frame);
criterion_main!(benches);
