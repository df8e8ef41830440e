// Copyright 2025 the Umbra Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The draw sink: the abstract command buffer shadow passes are recorded into.
//!
//! The host owns every GPU resource. This crate only sees opaque handles and asks the
//! sink to create materials, bind targets, set uniforms, and issue draws.
//! [`CommandRecorder`] is a reference sink that records every call.

use kurbo::Affine;

use crate::types::ShadowMaterialType;

/// Host mesh.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MeshHandle(pub u64);

/// Host material instance.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct MaterialHandle(pub u64);

/// Host renderer, drawn with a substitute material for silhouette exclusion and custom casters.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RendererHandle(pub u64);

/// Host texture.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TextureHandle(pub u64);

/// Named render target slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct RenderTargetId(pub u32);

/// Uniforms written by the shadow passes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShaderProperty {
    /// Light position, with z negated.
    LightPos,
    /// `1 - shadow intensity` of the light being composited.
    ShadowIntensity,
    /// `1 - shadow volume intensity` of the light being composited.
    ShadowVolumeIntensity,
    /// Stencil group a material writes to.
    ShadowStencilGroup,
    /// Extrusion height of a mesh shadow.
    ShadowHeight,
    /// Caster position with its z offset.
    ShadowCenter,
    /// Mesh shadow falloff.
    FalloffRate,
    /// Sprite shadow texture.
    ShadowTexture,
    /// Packed sprite shadow parameters: width, height above base, direction, base point.
    ShadowInfo,
    /// Finished shadow texture sampled by lit passes.
    ShadowTex,
}

impl ShaderProperty {
    /// Shader-side uniform name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::LightPos => "_LightPos",
            Self::ShadowIntensity => "_ShadowIntensity",
            Self::ShadowVolumeIntensity => "_ShadowVolumeIntensity",
            Self::ShadowStencilGroup => "_ShadowStencilGroup",
            Self::ShadowHeight => "_ShadowHeight",
            Self::ShadowCenter => "_ShadowCenter",
            Self::FalloffRate => "_FalloffRate",
            Self::ShadowTexture => "_ShadowTexture",
            Self::ShadowInfo => "_ShadowInfo",
            Self::ShadowTex => "_ShadowTex",
        }
    }
}

/// Shaders the renderer instantiates materials from.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ShadowShader {
    /// Shadow casting shader for a material type.
    Cast(ShadowMaterialType),
    /// Shader that clears a group's stencil under its casters' silhouettes.
    RemoveSelfShadow,
}

/// Shader pass selector.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Pass {
    /// Every pass of the material.
    #[default]
    All,
    /// A single pass.
    Index(u32),
}

/// Primitive topology for procedural draws.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Topology {
    /// One primitive per vertex, expanded by the shader.
    Points,
}

/// A texture binding: either a host texture or a render target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TextureRef {
    /// Host texture.
    Texture(TextureHandle),
    /// Render target slot.
    Target(RenderTargetId),
}

/// Description of a temporary render target.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TargetDescriptor {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Depth-stencil bits.
    pub depth_bits: u32,
    /// Multisample count.
    pub msaa_samples: u32,
    /// Whether mip levels are allocated.
    pub mip_maps: bool,
    /// Point (unfiltered) sampling.
    pub point_filter: bool,
}

/// An abstract command buffer.
///
/// Calls are issued in order and are expected to be replayed in order by the host.
pub trait DrawSink {
    /// Instantiate a material from `shader`.
    fn create_material(&mut self, shader: ShadowShader) -> MaterialHandle;

    /// Set a float on a material instance. Takes effect immediately, not at replay.
    fn set_material_float(
        &mut self,
        material: MaterialHandle,
        property: ShaderProperty,
        value: f32,
    );

    /// Allocate a temporary render target for `target`.
    fn get_temporary_render_target(&mut self, target: RenderTargetId, descriptor: TargetDescriptor);

    /// Release a temporary render target.
    fn release_temporary_render_target(&mut self, target: RenderTargetId);

    /// Bind `target` for subsequent draws.
    fn set_render_target(&mut self, target: RenderTargetId);

    /// Clear the bound target.
    fn clear_render_target(&mut self, clear_stencil: bool, clear_color: bool, color: [f32; 4]);

    /// Set a global float uniform.
    fn set_global_float(&mut self, property: ShaderProperty, value: f32);

    /// Set a global vector uniform.
    fn set_global_vector(&mut self, property: ShaderProperty, value: [f32; 4]);

    /// Bind a global texture.
    fn set_global_texture(&mut self, property: ShaderProperty, texture: TextureRef);

    /// Draw `mesh` with `material`.
    fn draw_mesh(
        &mut self,
        mesh: MeshHandle,
        transform: Affine,
        material: MaterialHandle,
        submesh: u32,
        pass: Pass,
    );

    /// Draw `vertex_count` procedurally generated vertices.
    fn draw_procedural(
        &mut self,
        transform: Affine,
        material: MaterialHandle,
        pass: Pass,
        topology: Topology,
        vertex_count: u32,
    );

    /// Draw a host renderer with a substitute material.
    fn draw_renderer(
        &mut self,
        renderer: RendererHandle,
        material: MaterialHandle,
        submesh: u32,
        pass: Pass,
    );
}

/// Narrow a world-space scalar to a shader float.
#[inline]
#[allow(
    clippy::cast_possible_truncation,
    reason = "Shader uniforms are 32-bit; precision loss is expected."
)]
pub(crate) fn uniform(v: f64) -> f32 {
    v as f32
}

/// A recorded [`DrawSink`] call.
#[derive(Clone, Debug, PartialEq)]
#[allow(missing_docs, reason = "Fields mirror the DrawSink method parameters.")]
pub enum DrawCommand {
    CreateMaterial {
        material: MaterialHandle,
        shader: ShadowShader,
    },
    SetMaterialFloat {
        material: MaterialHandle,
        property: ShaderProperty,
        value: f32,
    },
    GetTemporaryRenderTarget {
        target: RenderTargetId,
        descriptor: TargetDescriptor,
    },
    ReleaseTemporaryRenderTarget(RenderTargetId),
    SetRenderTarget(RenderTargetId),
    ClearRenderTarget {
        clear_stencil: bool,
        clear_color: bool,
        color: [f32; 4],
    },
    SetGlobalFloat {
        property: ShaderProperty,
        value: f32,
    },
    SetGlobalVector {
        property: ShaderProperty,
        value: [f32; 4],
    },
    SetGlobalTexture {
        property: ShaderProperty,
        texture: TextureRef,
    },
    DrawMesh {
        mesh: MeshHandle,
        transform: Affine,
        material: MaterialHandle,
        submesh: u32,
        pass: Pass,
    },
    DrawProcedural {
        transform: Affine,
        material: MaterialHandle,
        pass: Pass,
        topology: Topology,
        vertex_count: u32,
    },
    DrawRenderer {
        renderer: RendererHandle,
        material: MaterialHandle,
        submesh: u32,
        pass: Pass,
    },
}

impl DrawCommand {
    /// Whether this command draws geometry.
    pub fn is_draw(&self) -> bool {
        matches!(
            self,
            Self::DrawMesh { .. } | Self::DrawProcedural { .. } | Self::DrawRenderer { .. }
        )
    }

    /// Material used by a draw command.
    pub fn draw_material(&self) -> Option<MaterialHandle> {
        match self {
            Self::DrawMesh { material, .. }
            | Self::DrawProcedural { material, .. }
            | Self::DrawRenderer { material, .. } => Some(*material),
            _ => None,
        }
    }
}

/// A [`DrawSink`] that records every call in order.
///
/// Material handles are allocated sequentially from `1`.
#[derive(Clone, Debug, Default)]
pub struct CommandRecorder {
    commands: Vec<DrawCommand>,
    next_material: u64,
    shaders: Vec<ShadowShader>,
}

impl CommandRecorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Recorded commands in issue order.
    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    /// Take the recorded commands, leaving the recorder empty. Material handles keep counting.
    pub fn take(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Number of materials created so far.
    pub fn materials_created(&self) -> usize {
        self.shaders.len()
    }

    /// Shader a recorded material was created from.
    pub fn shader_of(&self, material: MaterialHandle) -> Option<ShadowShader> {
        let idx = usize::try_from(material.0.checked_sub(1)?).ok()?;
        self.shaders.get(idx).copied()
    }

    /// Recorded draw commands in issue order.
    pub fn draws(&self) -> impl Iterator<Item = &DrawCommand> + '_ {
        self.commands.iter().filter(|c| c.is_draw())
    }
}

impl DrawSink for CommandRecorder {
    fn create_material(&mut self, shader: ShadowShader) -> MaterialHandle {
        self.next_material += 1;
        let material = MaterialHandle(self.next_material);
        self.shaders.push(shader);
        self.commands
            .push(DrawCommand::CreateMaterial { material, shader });
        material
    }

    fn set_material_float(
        &mut self,
        material: MaterialHandle,
        property: ShaderProperty,
        value: f32,
    ) {
        self.commands.push(DrawCommand::SetMaterialFloat {
            material,
            property,
            value,
        });
    }

    fn get_temporary_render_target(
        &mut self,
        target: RenderTargetId,
        descriptor: TargetDescriptor,
    ) {
        self.commands
            .push(DrawCommand::GetTemporaryRenderTarget { target, descriptor });
    }

    fn release_temporary_render_target(&mut self, target: RenderTargetId) {
        self.commands
            .push(DrawCommand::ReleaseTemporaryRenderTarget(target));
    }

    fn set_render_target(&mut self, target: RenderTargetId) {
        self.commands.push(DrawCommand::SetRenderTarget(target));
    }

    fn clear_render_target(&mut self, clear_stencil: bool, clear_color: bool, color: [f32; 4]) {
        self.commands.push(DrawCommand::ClearRenderTarget {
            clear_stencil,
            clear_color,
            color,
        });
    }

    fn set_global_float(&mut self, property: ShaderProperty, value: f32) {
        self.commands
            .push(DrawCommand::SetGlobalFloat { property, value });
    }

    fn set_global_vector(&mut self, property: ShaderProperty, value: [f32; 4]) {
        self.commands
            .push(DrawCommand::SetGlobalVector { property, value });
    }

    fn set_global_texture(&mut self, property: ShaderProperty, texture: TextureRef) {
        self.commands
            .push(DrawCommand::SetGlobalTexture { property, texture });
    }

    fn draw_mesh(
        &mut self,
        mesh: MeshHandle,
        transform: Affine,
        material: MaterialHandle,
        submesh: u32,
        pass: Pass,
    ) {
        self.commands.push(DrawCommand::DrawMesh {
            mesh,
            transform,
            material,
            submesh,
            pass,
        });
    }

    fn draw_procedural(
        &mut self,
        transform: Affine,
        material: MaterialHandle,
        pass: Pass,
        topology: Topology,
        vertex_count: u32,
    ) {
        self.commands.push(DrawCommand::DrawProcedural {
            transform,
            material,
            pass,
            topology,
            vertex_count,
        });
    }

    fn draw_renderer(
        &mut self,
        renderer: RendererHandle,
        material: MaterialHandle,
        submesh: u32,
        pass: Pass,
    ) {
        self.commands.push(DrawCommand::DrawRenderer {
            renderer,
            material,
            submesh,
            pass,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorder_allocates_sequential_materials() {
        let mut rec = CommandRecorder::new();
        let a = rec.create_material(ShadowShader::RemoveSelfShadow);
        let b = rec.create_material(ShadowShader::Cast(ShadowMaterialType::MeshShadow));
        assert_eq!((a, b), (MaterialHandle(1), MaterialHandle(2)));
        assert_eq!(rec.materials_created(), 2);
        assert_eq!(
            rec.shader_of(b),
            Some(ShadowShader::Cast(ShadowMaterialType::MeshShadow))
        );
        assert_eq!(rec.shader_of(MaterialHandle(0)), None);
    }

    #[test]
    fn take_drains_commands() {
        let mut rec = CommandRecorder::new();
        rec.set_global_float(ShaderProperty::ShadowIntensity, 1.0);
        rec.draw_renderer(RendererHandle(3), MaterialHandle(9), 0, Pass::All);
        assert_eq!(rec.draws().count(), 1);
        let taken = rec.take();
        assert_eq!(taken.len(), 2);
        assert!(rec.commands().is_empty());
    }

    #[test]
    fn property_names_match_shaders() {
        assert_eq!(ShaderProperty::LightPos.name(), "_LightPos");
        assert_eq!(
            ShaderProperty::ShadowStencilGroup.name(),
            "_ShadowStencilGroup"
        );
        assert_eq!(ShaderProperty::ShadowTex.name(), "_ShadowTex");
    }
}
