// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-light shadow compositing.
//!
//! [`ShadowRenderer::render_shadows`] walks a world's culled caster list, which is sorted by
//! shadow group. Each run of equal groups gets a sequential group index starting at `1`;
//! that index, modulo [`STENCIL_GROUPS`], selects the stencil-tagged material the run is
//! drawn with. After a run's shadow geometry is drawn, the silhouettes of the run's casters
//! are drawn through a remove-self-shadow material with the same index, clearing the group's
//! shadow from under its own casters.

use kurbo::Rect;
use umbra_quadtree::rect::overlaps;

use crate::error::{Result, ShadowError};
use crate::light::Light;
use crate::sink::{
    DrawSink, MaterialHandle, RenderTargetId, ShaderProperty, ShadowShader, TargetDescriptor,
    TextureRef, uniform,
};
use crate::types::{CasterId, ShadowMaterialType};
use crate::world::ShadowWorld;

/// Distinct stencil groups per material type.
pub const STENCIL_GROUPS: usize = 255;

/// Renderer tuning.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RendererConfig {
    /// Shadow textures that may be live at once.
    pub max_texture_count: usize,
    /// Shadow texture resolution relative to the camera target, clamped to `[0.01, 1]`.
    pub render_texture_scale: f64,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_texture_count: 4,
            render_texture_scale: 1.0,
        }
    }
}

/// Counters from one [`ShadowRenderer::render_shadows`] call.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    /// Casters that recorded shadow geometry.
    pub casters_drawn: usize,
    /// Casters skipped as stale, filtered, or outside the light.
    pub casters_skipped: usize,
    /// Runs of equal shadow groups.
    pub groups: usize,
    /// Silhouette flushes, one per group.
    pub flushes: usize,
    /// Casters whose silhouettes were drawn to remove their group's shadow.
    pub silhouettes_excluded: usize,
}

/// Shared material tables and scratch state for shadow passes.
pub struct ShadowRenderer {
    config: RendererConfig,
    shadow_materials: Vec<Option<MaterialHandle>>,
    remove_self_materials: Vec<Option<MaterialHandle>>,
    targets: Vec<RenderTargetId>,
    silhouettes: Vec<CasterId>,
}

impl core::fmt::Debug for ShadowRenderer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ShadowRenderer")
            .field("config", &self.config)
            .field("materials_created", &self.materials_created())
            .field("targets", &self.targets.len())
            .finish_non_exhaustive()
    }
}

impl Default for ShadowRenderer {
    fn default() -> Self {
        Self::new(RendererConfig::default())
    }
}

impl ShadowRenderer {
    /// Create a renderer with empty material tables and a texture budget from `config`.
    pub fn new(config: RendererConfig) -> Self {
        let mut renderer = Self {
            config,
            shadow_materials: vec![None; ShadowMaterialType::COUNT * STENCIL_GROUPS],
            remove_self_materials: vec![None; STENCIL_GROUPS],
            targets: Vec::new(),
            silhouettes: Vec::new(),
        };
        renderer.initialize_budget(config.max_texture_count);
        renderer
    }

    /// Configuration.
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    /// Number of materials created so far across both tables.
    pub fn materials_created(&self) -> usize {
        self.shadow_materials
            .iter()
            .chain(&self.remove_self_materials)
            .filter(|m| m.is_some())
            .count()
    }

    /// Allocate `max_texture_count` shadow texture slots, `RenderTargetId(0)` upward.
    /// A no-op if the budget is unchanged.
    #[allow(clippy::cast_possible_truncation, reason = "Texture budgets are tiny.")]
    pub fn initialize_budget(&mut self, max_texture_count: usize) {
        if self.targets.len() == max_texture_count {
            return;
        }
        self.config.max_texture_count = max_texture_count;
        self.targets = (0..max_texture_count)
            .map(|i| RenderTargetId(i as u32))
            .collect();
    }

    /// Number of shadow texture slots.
    pub fn max_texture_count(&self) -> usize {
        self.targets.len()
    }

    /// Render target of shadow texture slot `index`.
    pub fn shadow_target(&self, index: usize) -> Result<RenderTargetId> {
        self.targets
            .get(index)
            .copied()
            .ok_or(ShadowError::TextureSlotOutOfBudget {
                index,
                budget: self.targets.len(),
            })
    }

    /// Allocate the temporary texture for slot `index`, sized from the camera target.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        reason = "Scaled camera sizes are non-negative and fit in u32."
    )]
    pub fn create_shadow_render_texture(
        &self,
        sink: &mut impl DrawSink,
        index: usize,
        camera_width: u32,
        camera_height: u32,
    ) -> Result<()> {
        let target = self.shadow_target(index)?;
        let scale = self.config.render_texture_scale.clamp(0.01, 1.0);
        let descriptor = TargetDescriptor {
            width: (f64::from(camera_width) * scale) as u32,
            height: (f64::from(camera_height) * scale) as u32,
            depth_bits: 24,
            msaa_samples: 1,
            mip_maps: false,
            point_filter: true,
        };
        sink.get_temporary_render_target(target, descriptor);
        Ok(())
    }

    /// Release the temporary texture of slot `index`.
    pub fn release_shadow_render_texture(
        &self,
        sink: &mut impl DrawSink,
        index: usize,
    ) -> Result<()> {
        sink.release_temporary_render_target(self.shadow_target(index)?);
        Ok(())
    }

    /// Bind slot `index` as the global shadow texture with `light`'s intensities.
    pub fn set_global_shadow_texture(
        &self,
        sink: &mut impl DrawSink,
        light: &Light,
        index: usize,
    ) -> Result<()> {
        let target = self.shadow_target(index)?;
        sink.set_global_texture(ShaderProperty::ShadowTex, TextureRef::Target(target));
        sink.set_global_float(
            ShaderProperty::ShadowIntensity,
            uniform(1.0 - light.shadow_intensity),
        );
        sink.set_global_float(
            ShaderProperty::ShadowVolumeIntensity,
            uniform(1.0 - light.shadow_volume_intensity),
        );
        Ok(())
    }

    /// Turn shadowing off for lit passes that follow.
    pub fn disable_global_shadow_texture(&self, sink: &mut impl DrawSink) {
        sink.set_global_float(ShaderProperty::ShadowIntensity, 1.0);
        sink.set_global_float(ShaderProperty::ShadowVolumeIntensity, 1.0);
    }

    /// Render `light`'s shadows into texture slot `index`.
    pub fn prerender_shadows(
        &mut self,
        sink: &mut impl DrawSink,
        world: &ShadowWorld,
        layer: i32,
        light: &Light,
        index: usize,
    ) -> Result<RenderStats> {
        let target = self.shadow_target(index)?;
        Ok(self.render_shadows(sink, world, layer, light, target))
    }

    /// Shared material for `material_type` and group index, created on first use.
    ///
    /// Custom casters bring their own material, so [`ShadowMaterialType::Custom`] yields
    /// `None`.
    pub fn shadow_material(
        &mut self,
        sink: &mut impl DrawSink,
        material_type: ShadowMaterialType,
        group_index: u32,
    ) -> Option<MaterialHandle> {
        if material_type == ShadowMaterialType::Custom {
            return None;
        }
        let slot = stencil_slot(group_index);
        let entry = &mut self.shadow_materials[material_type.index() * STENCIL_GROUPS + slot];
        Some(*entry.get_or_insert_with(|| {
            new_tagged_material(sink, ShadowShader::Cast(material_type), slot)
        }))
    }

    /// Remove-self-shadow material for a group index, created on first use.
    pub fn remove_self_shadow_material(
        &mut self,
        sink: &mut impl DrawSink,
        group_index: u32,
    ) -> MaterialHandle {
        let slot = stencil_slot(group_index);
        *self.remove_self_materials[slot]
            .get_or_insert_with(|| new_tagged_material(sink, ShadowShader::RemoveSelfShadow, slot))
    }

    /// Render shadows of `world`'s culled casters for `light` into `target`.
    ///
    /// Binds and clears `target`, sets the light position, then walks the culled list:
    /// casters that are stale, denied by their light filter, or outside the light's
    /// influence rect are skipped. The rest are drawn run by run, with a silhouette flush
    /// at each group boundary and after the last caster.
    pub fn render_shadows(
        &mut self,
        sink: &mut impl DrawSink,
        world: &ShadowWorld,
        layer: i32,
        light: &Light,
        target: RenderTargetId,
    ) -> RenderStats {
        sink.set_render_target(target);
        sink.clear_render_target(true, true, [0.0, 0.0, 0.0, 1.0]);
        sink.set_global_vector(ShaderProperty::LightPos, light.position_uniform());
        let light_rect: Rect = light.influence_rect();

        let mut stats = RenderStats::default();
        let mut group_index = 0_u32;
        let mut previous_group: Option<i32> = None;
        self.silhouettes.clear();

        for &id in world.culled_casters() {
            let (Some(caster), Some(group)) = (world.caster(id), world.effective_shadow_group(id))
            else {
                stats.casters_skipped += 1;
                continue;
            };
            if !caster.light_filter.admits(light.id) || !overlaps(light_rect, caster.bounds) {
                stats.casters_skipped += 1;
                continue;
            }
            if previous_group != Some(group) {
                if previous_group.is_some() {
                    self.flush_silhouettes(sink, world, layer, group_index, &mut stats);
                }
                previous_group = Some(group);
                group_index += 1;
                stats.groups += 1;
            }
            let material = self.shadow_material(sink, caster.material_type(), group_index);
            if caster.cast_shadows(sink, layer, light, material, group_index) {
                stats.casters_drawn += 1;
            }
            if caster.uses_silhouette_exclusion() && caster.is_shadowed_layer(layer) {
                self.silhouettes.push(id);
            }
        }
        if previous_group.is_some() {
            self.flush_silhouettes(sink, world, layer, group_index, &mut stats);
        }
        stats
    }

    fn flush_silhouettes(
        &mut self,
        sink: &mut impl DrawSink,
        world: &ShadowWorld,
        layer: i32,
        group_index: u32,
        stats: &mut RenderStats,
    ) {
        stats.flushes += 1;
        if self.silhouettes.is_empty() {
            return;
        }
        let material = self.remove_self_shadow_material(sink, group_index);
        for &id in &self.silhouettes {
            if world
                .caster(id)
                .is_some_and(|c| c.exclude_silhouettes(sink, layer, material, group_index))
            {
                stats.silhouettes_excluded += 1;
            }
        }
        self.silhouettes.clear();
    }
}

fn stencil_slot(group_index: u32) -> usize {
    group_index as usize % STENCIL_GROUPS
}

#[allow(clippy::cast_precision_loss, reason = "Stencil slots are below 255.")]
fn new_tagged_material(
    sink: &mut impl DrawSink,
    shader: ShadowShader,
    slot: usize,
) -> MaterialHandle {
    let material = sink.create_material(shader);
    sink.set_material_float(material, ShaderProperty::ShadowStencilGroup, slot as f32);
    material
}
