// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Static casters across a world re-initialization and a scene unload.
//!
//! Static casters added before the world rect is known are deferred, indexed when the
//! realm initializes, re-indexed when it is re-initialized, and dropped on scene unload.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p umbra_demos --example static_rebuild`

use kurbo::Rect;
use umbra_shadow::{
    Caster, CasterFlags, CasterKind, MeshHandle, MeshShadow, RealmConfig, ShadowWorld,
};

fn main() -> umbra_shadow::Result<()> {
    env_logger::init();

    let mut world = ShadowWorld::new(RealmConfig::default())?;
    for i in 0..6_u32 {
        let x = f64::from(i) * 40.0;
        world.add_caster(
            Caster::new(
                CasterKind::Tile(MeshShadow::new(MeshHandle(u64::from(i)))),
                Rect::new(x, 0.0, x + 32.0, 32.0),
            )
            .with_flags(CasterFlags::default() | CasterFlags::STATIC),
        );
    }
    println!(
        "before init: initialized={} statics={}",
        world.realm().is_initialized(),
        world.realm().static_count()
    );

    world.init_world(Rect::new(0.0, 0.0, 512.0, 512.0))?;
    println!("after init: statics={}", world.realm().static_count());

    if let Err(err) = world.init_world(Rect::new(10.0, 10.0, 10.0, 10.0)) {
        println!("degenerate rect rejected: {err}");
    }

    world.init_world(Rect::new(-256.0, -256.0, 1024.0, 1024.0))?;
    world.optimize_shadows(Rect::new(0.0, 0.0, 100.0, 100.0));
    println!(
        "after re-init: culled {} of {}",
        world.culled_casters().len(),
        world.realm().static_count()
    );

    let [statics, active, building] = world.realm().debug_grids();
    println!(
        "grid nodes: static={} active={} building={}",
        statics.len(),
        active.len(),
        building.len()
    );

    world.scene_unloaded();
    world.optimize_shadows(Rect::new(0.0, 0.0, 100.0, 100.0));
    println!(
        "after unload: statics={} culled={}",
        world.realm().static_count(),
        world.culled_casters().len()
    );
    Ok(())
}
