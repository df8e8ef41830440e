// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! One frame of shadow compositing for two lights.
//!
//! Builds a small world with a composite (two wall segments that must not shadow each
//! other), a static pillar, and a standing sprite. Prints the culled list and the draw
//! commands recorded for each light.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p umbra_demos --example shadow_frame`

use kurbo::{Point, Rect, Vec2};
use umbra_shadow::{
    Caster, CasterFlags, CasterId, CasterKind, CommandRecorder, CompositeId, GroupAncestry, Light,
    LightId, MeshHandle, MeshShadow, RealmConfig, RendererHandle, ShadowRenderer, ShadowWorld,
    SpriteShadow, TextureHandle,
};

/// The wall segments belong to one composite.
struct Walls {
    composite: CompositeId,
    members: [CasterId; 2],
}

impl GroupAncestry for Walls {
    fn group_ancestor(&self, caster: CasterId) -> Option<CompositeId> {
        self.members.contains(&caster).then_some(self.composite)
    }
}

fn main() -> umbra_shadow::Result<()> {
    env_logger::init();

    let world_rect = Rect::new(0.0, 0.0, 2048.0, 2048.0);
    let mut world = ShadowWorld::new(
        RealmConfig::default()
            .with_world_rect(world_rect)
            .with_iterations_per_frame(2),
    )?;

    let composite = world.add_composite(10);
    let wall = |x: f64, mesh: u64| {
        Caster::new(
            CasterKind::Mesh(MeshShadow::new(MeshHandle(mesh))),
            Rect::new(x, 200.0, x + 64.0, 216.0),
        )
        .with_silhouette_renderer(RendererHandle(mesh))
    };
    let left = world.add_caster(wall(100.0, 1));
    let right = world.add_caster(wall(164.0, 2));
    let pillar = world.add_caster(
        Caster::new(
            CasterKind::Mesh(MeshShadow::new(MeshHandle(3))),
            Rect::new(300.0, 300.0, 316.0, 316.0),
        )
        .with_flags(CasterFlags::default() | CasterFlags::STATIC)
        .with_shadow_group(2),
    );
    let tree = world.add_caster(Caster::sprite(
        SpriteShadow {
            texture: Some(TextureHandle(7)),
            size: Vec2::new(24.0, 48.0),
            base_point: 0.1,
            ..SpriteShadow::default()
        },
        Point::new(250.0, 150.0),
    ));

    let walls = Walls {
        composite,
        members: [left, right],
    };
    world.update(&walls);

    // The dynamic tree is rebuilt two insertions at a time.
    let mut frames = 1;
    while !world.tick() {
        frames += 1;
    }
    log::info!("dynamic tree published after {frames} ticks");

    world.optimize_shadows(Rect::new(0.0, 0.0, 640.0, 480.0));
    let names = [
        (left, "left wall"),
        (right, "right wall"),
        (pillar, "pillar"),
        (tree, "tree"),
    ];
    for &id in world.culled_casters() {
        let name = names
            .iter()
            .find(|(n, _)| *n == id)
            .map_or("?", |(_, s)| *s);
        println!(
            "culled: {name:<10} group {:?}",
            world.effective_shadow_group(id)
        );
    }

    let mut renderer = ShadowRenderer::default();
    let mut sink = CommandRecorder::new();
    renderer.create_shadow_render_texture(&mut sink, 0, 1280, 720)?;
    let lights = [
        Light::new(LightId(0), Point::new(200.0, 260.0), 180.0),
        Light::new(LightId(1), Point::new(600.0, 400.0), 120.0),
    ];
    for light in &lights {
        let stats = renderer.prerender_shadows(&mut sink, &world, 0, light, 0)?;
        println!("light {:?}: {stats:?}", light.id);
        for command in sink.take() {
            println!("  {command:?}");
        }
        renderer.set_global_shadow_texture(&mut sink, light, 0)?;
        sink.take();
    }
    renderer.release_shadow_render_texture(&mut sink, 0)?;
    println!("materials created: {}", renderer.materials_created());
    Ok(())
}
