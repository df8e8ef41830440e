// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Shadow casters and their per-variant draw contracts.

use kurbo::{Affine, Point, Rect, Vec2};

use crate::light::Light;
use crate::sink::{
    DrawSink, MaterialHandle, MeshHandle, Pass, RendererHandle, ShaderProperty, TextureHandle,
    TextureRef, Topology, uniform,
};
use crate::types::{CasterFlags, LightFilter, ShadowMaterialType, SortingLayers};

/// Extruded mesh shadow.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshShadow {
    /// Pre-generated shadow mesh.
    pub mesh: MeshHandle,
    /// Extrusion height.
    pub height: f64,
    /// Falloff of the extruded shadow.
    pub falloff_rate: f64,
}

impl MeshShadow {
    /// A mesh shadow with unit height and falloff.
    pub fn new(mesh: MeshHandle) -> Self {
        Self {
            mesh,
            height: 1.0,
            falloff_rate: 1.0,
        }
    }
}

/// How a sprite shadow is laid out.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum SpriteStyle {
    /// Billboard standing up from the base point, expanded from a single vertex on the GPU.
    #[default]
    Standing,
    /// Quad lying on the ground plane.
    Flat,
}

/// Textured sprite shadow.
#[derive(Clone, Debug, PartialEq)]
pub struct SpriteShadow {
    /// Layout of the shadow quad.
    pub style: SpriteStyle,
    /// Shadow texture.
    pub texture: Option<TextureHandle>,
    /// Width and height of the shadow quad.
    pub size: Vec2,
    /// Direction the shadow points in, in degrees.
    pub direction_degrees: f64,
    /// Turn the shadow away from each light instead of using a fixed direction.
    pub reorient_per_light: bool,
    /// Fraction of the height below the pivot, in `[0, 1]`.
    pub base_point: f64,
    /// Quad mesh for [`SpriteStyle::Flat`]. Regenerated by the host when the direction changes.
    pub mesh: Option<MeshHandle>,
}

impl Default for SpriteShadow {
    fn default() -> Self {
        Self {
            style: SpriteStyle::Standing,
            texture: None,
            size: Vec2::new(1.0, 1.0),
            direction_degrees: 0.0,
            reorient_per_light: false,
            base_point: 0.0,
            mesh: None,
        }
    }
}

impl SpriteShadow {
    /// Material family for this layout.
    pub fn material_type(&self) -> ShadowMaterialType {
        match self.style {
            SpriteStyle::Standing => ShadowMaterialType::SpriteShadow,
            SpriteStyle::Flat => ShadowMaterialType::SpriteShadowSimple,
        }
    }

    /// Radius of a circle around the pivot enclosing the shadow in any direction.
    pub fn radius(&self) -> f64 {
        match self.style {
            SpriteStyle::Standing => self.size.x,
            SpriteStyle::Flat => self.size.hypot(),
        }
    }

    /// Bounds around the pivot, in local space.
    pub fn local_bounds(&self) -> Rect {
        let r = self.radius();
        Rect::new(-r, -r, r, r)
    }

    /// Shadow direction in radians for a light at `light` casting onto `center`.
    pub fn direction_for(&self, center: Point, light: Point) -> f64 {
        if self.reorient_per_light {
            let to_light = light - center;
            (self.direction_degrees + 90.0).to_radians() + to_light.y.atan2(to_light.x)
        } else {
            self.direction_degrees.to_radians()
        }
    }
}

/// Caster drawn through the host's own renderer and material.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomShadow {
    /// Renderer drawn once per pass.
    pub renderer: Option<RendererHandle>,
    /// Material the renderer is drawn with. Receives the stencil group before drawing.
    pub material: Option<MaterialHandle>,
    /// Passes to draw.
    pub passes: Vec<Pass>,
}

impl CustomShadow {
    /// Draw every pass of `material` through `renderer`.
    pub fn new(renderer: RendererHandle, material: MaterialHandle) -> Self {
        Self {
            renderer: Some(renderer),
            material: Some(material),
            passes: vec![Pass::All],
        }
    }
}

/// The closed set of caster variants.
#[derive(Clone, Debug, PartialEq)]
pub enum CasterKind {
    /// Extruded mesh.
    Mesh(MeshShadow),
    /// Textured sprite.
    Sprite(SpriteShadow),
    /// Host renderer and material.
    Custom(CustomShadow),
    /// Mesh combined from tile shapes, usually silhouetted by its tile-map renderer.
    Tile(MeshShadow),
}

/// A shadow caster.
#[derive(Clone, Debug, PartialEq)]
pub struct Caster {
    /// World-space bounds used for culling. Must be finite to be indexed.
    pub bounds: Rect,
    /// Local-to-world transform passed to draws.
    pub transform: Affine,
    /// Height offset of the shadow center.
    pub z_position: f64,
    /// Declared shadow group; `0` for ungrouped.
    pub shadow_group: i32,
    /// Shadow switches.
    pub flags: CasterFlags,
    /// Layers shadowed by this caster.
    pub sorting_layers: SortingLayers,
    /// Lights allowed or denied.
    pub light_filter: LightFilter,
    /// Renderers whose silhouettes are excluded from the group shadow.
    pub silhouette_renderers: Vec<RendererHandle>,
    /// Variant payload.
    pub kind: CasterKind,
}

impl Caster {
    /// A caster with default flags, every layer, no filter, and ungrouped.
    pub fn new(kind: CasterKind, bounds: Rect) -> Self {
        Self {
            bounds,
            transform: Affine::IDENTITY,
            z_position: 0.0,
            shadow_group: 0,
            flags: CasterFlags::default(),
            sorting_layers: SortingLayers::All,
            light_filter: LightFilter::Unrestricted,
            silhouette_renderers: Vec::new(),
            kind,
        }
    }

    /// A sprite caster at `position`, bounded by the sprite's radius.
    pub fn sprite(sprite: SpriteShadow, position: Point) -> Self {
        let bounds = sprite.local_bounds() + position.to_vec2();
        Self::new(CasterKind::Sprite(sprite), bounds)
            .with_transform(Affine::translate(position.to_vec2()))
    }

    /// Set the transform.
    pub fn with_transform(mut self, transform: Affine) -> Self {
        self.transform = transform;
        self
    }

    /// Set the declared shadow group.
    pub fn with_shadow_group(mut self, group: i32) -> Self {
        self.shadow_group = group;
        self
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: CasterFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Restrict the shadowed layers.
    pub fn with_sorting_layers(mut self, layers: SortingLayers) -> Self {
        self.sorting_layers = layers;
        self
    }

    /// Set the light filter.
    pub fn with_light_filter(mut self, filter: LightFilter) -> Self {
        self.light_filter = filter;
        self
    }

    /// Add a silhouette renderer.
    pub fn with_silhouette_renderer(mut self, renderer: RendererHandle) -> Self {
        self.add_silhouette_renderer(renderer);
        self
    }

    /// Add a silhouette renderer if not already present.
    pub fn add_silhouette_renderer(&mut self, renderer: RendererHandle) {
        if !self.silhouette_renderers.contains(&renderer) {
            self.silhouette_renderers.push(renderer);
        }
    }

    /// Material family selecting the shared material row.
    pub fn material_type(&self) -> ShadowMaterialType {
        match &self.kind {
            CasterKind::Mesh(_) | CasterKind::Tile(_) => ShadowMaterialType::MeshShadow,
            CasterKind::Sprite(s) => s.material_type(),
            CasterKind::Custom(_) => ShadowMaterialType::Custom,
        }
    }

    /// Whether the caster emits shadow geometry.
    pub fn casts_shadows(&self) -> bool {
        self.flags.contains(CasterFlags::CASTS_SHADOWS)
    }

    /// Whether shadows are cast into `layer`.
    pub fn is_shadowed_layer(&self, layer: i32) -> bool {
        self.sorting_layers.contains(layer)
    }

    /// Whether the caster's silhouettes are removed from its group shadow.
    ///
    /// Requires the flag and at least one renderer to draw the silhouette with.
    pub fn uses_silhouette_exclusion(&self) -> bool {
        self.flags.contains(CasterFlags::USE_RENDERER_SILHOUETTE)
            && !self.silhouette_renderers.is_empty()
    }

    /// Shadow center: the transform's translation and the z offset.
    pub fn shadow_center(&self) -> (Point, f64) {
        (self.transform.translation().to_point(), self.z_position)
    }

    fn shadow_center_uniform(&self) -> [f32; 4] {
        let (p, z) = self.shadow_center();
        [uniform(p.x), uniform(p.y), uniform(z), 0.0]
    }

    /// Record this caster's shadow geometry.
    ///
    /// `material` is the shared material for the caster's type and group, or `None` for
    /// custom casters, which bring their own. Nothing is drawn if the caster does not
    /// cast shadows, does not shadow `layer`, or has no material to draw with.
    ///
    /// Returns whether any draw was recorded.
    pub fn cast_shadows(
        &self,
        sink: &mut impl DrawSink,
        layer: i32,
        light: &Light,
        material: Option<MaterialHandle>,
        group_index: u32,
    ) -> bool {
        if !self.casts_shadows() || !self.is_shadowed_layer(layer) {
            return false;
        }
        match &self.kind {
            CasterKind::Mesh(mesh) | CasterKind::Tile(mesh) => {
                let Some(material) = material else {
                    return false;
                };
                sink.set_global_float(ShaderProperty::ShadowHeight, uniform(mesh.height));
                sink.set_global_vector(ShaderProperty::ShadowCenter, self.shadow_center_uniform());
                sink.set_global_float(ShaderProperty::FalloffRate, uniform(mesh.falloff_rate));
                sink.draw_mesh(mesh.mesh, self.transform, material, 0, Pass::All);
                true
            }
            CasterKind::Sprite(sprite) => {
                let Some(material) = material else {
                    return false;
                };
                sink.set_global_vector(ShaderProperty::ShadowCenter, self.shadow_center_uniform());
                if let Some(texture) = sprite.texture {
                    sink.set_global_texture(
                        ShaderProperty::ShadowTexture,
                        TextureRef::Texture(texture),
                    );
                }
                let (center, _) = self.shadow_center();
                let dir = sprite.direction_for(center, light.position);
                sink.set_global_vector(
                    ShaderProperty::ShadowInfo,
                    [
                        uniform(sprite.size.x),
                        uniform(sprite.size.y * (1.0 - sprite.base_point)),
                        uniform(dir),
                        uniform(sprite.base_point),
                    ],
                );
                match sprite.style {
                    SpriteStyle::Standing => {
                        sink.draw_procedural(
                            self.transform,
                            material,
                            Pass::All,
                            Topology::Points,
                            1,
                        );
                        true
                    }
                    SpriteStyle::Flat => {
                        let Some(mesh) = sprite.mesh else {
                            return false;
                        };
                        sink.draw_mesh(mesh, self.transform, material, 0, Pass::All);
                        true
                    }
                }
            }
            CasterKind::Custom(custom) => {
                let (Some(renderer), Some(own)) = (custom.renderer, custom.material) else {
                    return false;
                };
                sink.set_material_float(
                    own,
                    ShaderProperty::ShadowStencilGroup,
                    group_index as f32,
                );
                for &pass in &custom.passes {
                    sink.draw_renderer(renderer, own, 0, pass);
                }
                !custom.passes.is_empty()
            }
        }
    }

    /// Record the silhouette of every renderer of this caster with `material`.
    ///
    /// A no-op unless silhouette exclusion is on and `layer` is shadowed. Returns whether
    /// anything was drawn.
    pub fn exclude_silhouettes(
        &self,
        sink: &mut impl DrawSink,
        layer: i32,
        material: MaterialHandle,
        _group_index: u32,
    ) -> bool {
        if !self.uses_silhouette_exclusion() || !self.is_shadowed_layer(layer) {
            return false;
        }
        for &renderer in &self.silhouette_renderers {
            sink.draw_renderer(renderer, material, 0, Pass::All);
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::{CommandRecorder, DrawCommand};
    use crate::types::LightId;

    fn light_at(x: f64, y: f64) -> Light {
        Light::new(LightId(1), Point::new(x, y), 10.0)
    }

    fn mesh_caster() -> Caster {
        Caster::new(
            CasterKind::Mesh(MeshShadow {
                mesh: MeshHandle(7),
                height: 2.0,
                falloff_rate: 0.5,
            }),
            Rect::new(0.0, 0.0, 1.0, 1.0),
        )
        .with_transform(Affine::translate((3.0, 4.0)))
    }

    #[test]
    fn mesh_sets_uniforms_then_draws() {
        let mut c = mesh_caster();
        c.z_position = 1.5;
        let mut rec = CommandRecorder::new();
        assert!(c.cast_shadows(&mut rec, 0, &light_at(0.0, 0.0), Some(MaterialHandle(2)), 1));
        assert_eq!(
            rec.commands(),
            &[
                DrawCommand::SetGlobalFloat {
                    property: ShaderProperty::ShadowHeight,
                    value: 2.0
                },
                DrawCommand::SetGlobalVector {
                    property: ShaderProperty::ShadowCenter,
                    value: [3.0, 4.0, 1.5, 0.0]
                },
                DrawCommand::SetGlobalFloat {
                    property: ShaderProperty::FalloffRate,
                    value: 0.5
                },
                DrawCommand::DrawMesh {
                    mesh: MeshHandle(7),
                    transform: Affine::translate((3.0, 4.0)),
                    material: MaterialHandle(2),
                    submesh: 0,
                    pass: Pass::All,
                },
            ]
        );
    }

    #[test]
    fn nothing_drawn_when_disabled_or_unshadowed_layer() {
        let mut rec = CommandRecorder::new();
        let light = light_at(0.0, 0.0);
        let c = mesh_caster().with_flags(CasterFlags::empty());
        assert!(!c.cast_shadows(&mut rec, 0, &light, Some(MaterialHandle(2)), 1));
        let c = mesh_caster().with_sorting_layers(SortingLayers::Only(vec![4]));
        assert!(!c.cast_shadows(&mut rec, 0, &light, Some(MaterialHandle(2)), 1));
        assert!(!mesh_caster().cast_shadows(&mut rec, 0, &light, None, 1));
        let flat = Caster::sprite(
            SpriteShadow {
                style: SpriteStyle::Flat,
                ..SpriteShadow::default()
            },
            Point::ORIGIN,
        );
        assert!(!flat.cast_shadows(&mut rec, 0, &light, Some(MaterialHandle(2)), 1));
        assert_eq!(rec.draws().count(), 0);
    }

    #[test]
    fn self_shadows_flag_does_not_change_commands() {
        let light = light_at(0.0, 0.0);
        let mut plain = CommandRecorder::new();
        assert!(mesh_caster().cast_shadows(&mut plain, 0, &light, Some(MaterialHandle(2)), 1));
        let mut caster = mesh_caster();
        caster.flags.insert(CasterFlags::SELF_SHADOWS);
        let mut flagged = CommandRecorder::new();
        assert!(caster.cast_shadows(&mut flagged, 0, &light, Some(MaterialHandle(2)), 1));
        assert_eq!(plain.commands(), flagged.commands());
    }

    #[test]
    fn standing_sprite_draws_one_point() {
        let sprite = SpriteShadow {
            texture: Some(TextureHandle(5)),
            size: Vec2::new(2.0, 4.0),
            base_point: 0.25,
            direction_degrees: 180.0,
            ..SpriteShadow::default()
        };
        let c = Caster::sprite(sprite, Point::new(10.0, 10.0));
        assert_eq!(c.bounds, Rect::new(8.0, 8.0, 12.0, 12.0));
        let mut rec = CommandRecorder::new();
        c.cast_shadows(&mut rec, 0, &light_at(0.0, 0.0), Some(MaterialHandle(1)), 1);
        let info = rec.commands().iter().find_map(|c| match c {
            DrawCommand::SetGlobalVector {
                property: ShaderProperty::ShadowInfo,
                value,
            } => Some(*value),
            _ => None,
        });
        assert_eq!(info, Some([2.0, 3.0, uniform(core::f64::consts::PI), 0.25]));
        assert!(matches!(
            rec.draws().last(),
            Some(DrawCommand::DrawProcedural {
                topology: Topology::Points,
                vertex_count: 1,
                ..
            })
        ));
    }

    #[test]
    fn reoriented_sprite_turns_away_from_light() {
        let sprite = SpriteShadow {
            reorient_per_light: true,
            ..SpriteShadow::default()
        };
        // Light directly to the right: atan2 = 0, plus 90 degrees.
        let d = sprite.direction_for(Point::new(0.0, 0.0), Point::new(5.0, 0.0));
        assert!((d - core::f64::consts::FRAC_PI_2).abs() < 1e-12);
        // Light above: atan2 = pi/2.
        let d = sprite.direction_for(Point::new(0.0, 0.0), Point::new(0.0, 5.0));
        assert!((d - core::f64::consts::PI).abs() < 1e-12);
    }

    #[test]
    fn flat_sprite_bounds_use_diagonal() {
        let sprite = SpriteShadow {
            style: SpriteStyle::Flat,
            size: Vec2::new(3.0, 4.0),
            ..SpriteShadow::default()
        };
        assert_eq!(sprite.radius(), 5.0);
        assert_eq!(
            sprite.material_type(),
            ShadowMaterialType::SpriteShadowSimple
        );
    }

    #[test]
    fn custom_tags_own_material_and_draws_each_pass() {
        let mut custom = CustomShadow::new(RendererHandle(9), MaterialHandle(40));
        custom.passes = vec![Pass::Index(0), Pass::Index(2)];
        let c = Caster::new(CasterKind::Custom(custom), Rect::new(0.0, 0.0, 1.0, 1.0));
        assert_eq!(c.material_type(), ShadowMaterialType::Custom);
        let mut rec = CommandRecorder::new();
        c.cast_shadows(&mut rec, 0, &light_at(0.0, 0.0), None, 3);
        assert_eq!(
            rec.commands()[0],
            DrawCommand::SetMaterialFloat {
                material: MaterialHandle(40),
                property: ShaderProperty::ShadowStencilGroup,
                value: 3.0,
            }
        );
        let passes: Vec<Pass> = rec
            .draws()
            .filter_map(|d| match d {
                DrawCommand::DrawRenderer { pass, .. } => Some(*pass),
                _ => None,
            })
            .collect();
        assert_eq!(passes, vec![Pass::Index(0), Pass::Index(2)]);
    }

    #[test]
    fn silhouette_exclusion_requires_a_renderer() {
        let mut c = mesh_caster();
        assert!(!c.uses_silhouette_exclusion());
        c.add_silhouette_renderer(RendererHandle(1));
        c.add_silhouette_renderer(RendererHandle(1));
        c.add_silhouette_renderer(RendererHandle(2));
        assert!(c.uses_silhouette_exclusion());
        let mut rec = CommandRecorder::new();
        assert!(c.exclude_silhouettes(&mut rec, 0, MaterialHandle(99), 1));
        assert_eq!(rec.draws().count(), 2);
        c.sorting_layers = SortingLayers::Only(vec![4]);
        assert!(!c.exclude_silhouettes(&mut rec, 0, MaterialHandle(99), 1));
        assert_eq!(rec.draws().count(), 2);
        c.flags.remove(CasterFlags::USE_RENDERER_SILHOUETTE);
        assert!(!c.uses_silhouette_exclusion());
    }
}
