// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=umbra_shadow --heading-base-level=0

//! Umbra Shadow: 2D shadow caster culling and per-light shadow compositing.
//!
//! The crate tracks shadow casters, culls them against the viewport with quad-trees from
//! [`umbra_quadtree`], and records each light's shadow pass into a host [`DrawSink`].
//!
//! ## Frame flow
//!
//! 1. [`ShadowWorld::update`] runs each caster's staggered logical update, keeping its
//!    shadow group membership in sync with its composite ancestry.
//! 2. [`ShadowWorld::tick`] advances the dynamic tree rebuild by a bounded number of
//!    insertions. A finished tree replaces the active one.
//! 3. [`ShadowWorld::optimize_shadows`] queries the static and active trees with the
//!    viewport, appends persistent casters, and sorts the result by shadow group.
//! 4. [`ShadowRenderer::render_shadows`] draws each light's shadows group by group,
//!    removing self-shadowing from under each group's silhouettes.
//!
//! ## Shadow groups
//!
//! Casters sharing a shadow group do not shadow each other. A caster belongs to its
//! outermost composite ancestor's group if it has one (see [`GroupAncestry`]), and to its own
//! group otherwise. Each group gets a stencil index during rendering, so up to
//! [`rendering::STENCIL_GROUPS`] groups stay distinct per pass.
//!
//! ## Host resources
//!
//! Meshes, materials, renderers, textures, and render targets are opaque handles. The
//! renderer asks the sink to create the materials it needs on first use and keeps them
//! for the rest of its life. [`CommandRecorder`] records every call and is used by the
//! tests.
//!
//! # Example
//!
//! ```rust
//! use kurbo::{Point, Rect};
//! use umbra_shadow::{
//!     Caster, CasterKind, CommandRecorder, Light, LightId, MeshHandle, MeshShadow,
//!     NoAncestry, RealmConfig, RenderTargetId, ShadowRenderer, ShadowWorld,
//! };
//!
//! let config = RealmConfig::default().with_world_rect(Rect::new(0.0, 0.0, 1024.0, 1024.0));
//! let mut world = ShadowWorld::new(config)?;
//!
//! let wall = world.add_caster(
//!     Caster::new(
//!         CasterKind::Mesh(MeshShadow::new(MeshHandle(1))),
//!         Rect::new(100.0, 100.0, 140.0, 110.0),
//!     )
//!     .with_shadow_group(3),
//! );
//!
//! world.update(&NoAncestry);
//! while !world.tick() {}
//! world.optimize_shadows(Rect::new(0.0, 0.0, 512.0, 512.0));
//! assert_eq!(world.culled_casters(), &[wall]);
//!
//! let mut renderer = ShadowRenderer::default();
//! let mut sink = CommandRecorder::new();
//! let light = Light::new(LightId(0), Point::new(120.0, 150.0), 80.0);
//! let stats = renderer.render_shadows(&mut sink, &world, 0, &light, RenderTargetId(0));
//! assert_eq!(stats.casters_drawn, 1);
//! # Ok::<(), umbra_shadow::ShadowError>(())
//! ```

pub mod caster;
pub mod error;
pub mod light;
pub mod realm;
pub mod registry;
pub mod rendering;
pub mod sink;
pub mod types;
pub mod world;

pub use caster::{Caster, CasterKind, CustomShadow, MeshShadow, SpriteShadow, SpriteStyle};
pub use error::{Result, ShadowError};
pub use light::Light;
pub use realm::{RealmConfig, RealmEntry, RebuildState, ShadowRealm};
pub use registry::{
    CasterGroup, GroupAncestry, HierarchyAncestry, NoAncestry, SceneParent, ShadowCasterRegistry,
};
pub use rendering::{RenderStats, RendererConfig, ShadowRenderer};
pub use sink::{
    CommandRecorder, DrawCommand, DrawSink, MaterialHandle, MeshHandle, Pass, RenderTargetId,
    RendererHandle, ShaderProperty, ShadowShader, TargetDescriptor, TextureHandle, TextureRef,
    Topology,
};
pub use types::{
    CasterFlags, CasterId, CompositeId, GroupRef, LightFilter, LightId, ShadowMaterialType,
    SortingLayers,
};
pub use world::{ShadowWorld, TICK_COUNT};
