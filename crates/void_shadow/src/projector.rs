//! Projective shadow emitter
//!
//! Shares the capture camera's transform and half-size but uses a deeper
//! frustum that starts at the volume center and extends by the casting
//! distance, so the silhouette lands on ground well below the character.

use glam::{Mat4, Quat, Vec3, Vec4};

use crate::alignment::{ClipRange, ProjectionFrame};
use crate::host::{RenderTargetHandle, TextureHandle};
use crate::layer::{LayerId, LayerMask};
use crate::pipeline::{PipelineState, TextureSlot, PROJECTOR_PASS};

/// Textures bound to the projector pass
#[derive(Clone, Debug, PartialEq)]
pub struct ProjectorMaterial {
    pub pass: &'static PipelineState,
    /// Captured silhouette, rebound every frame
    pub shadow_texture: Option<RenderTargetHandle>,
    /// Static falloff cookie, bound once at setup
    pub falloff_texture: Option<TextureHandle>,
}

impl ProjectorMaterial {
    fn new(falloff_texture: Option<TextureHandle>) -> Self {
        Self {
            pass: &PROJECTOR_PASS,
            shadow_texture: None,
            falloff_texture,
        }
    }

    /// Frame-buffer multiplier for one receiving fragment, `None` if discarded
    pub fn coverage(&self, shadow_texel: Vec4, falloff_texel: Vec4) -> Option<Vec4> {
        self.pass.shade(Vec4::ONE, |slot| match slot {
            TextureSlot::Shadow => shadow_texel,
            TextureSlot::Falloff => falloff_texel,
            TextureSlot::None => Vec4::ONE,
        })
    }
}

/// GPU projector data (uniform buffer)
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GpuProjectorUniforms {
    /// World to shadow texture space
    pub projector: [[f32; 4]; 4],
    /// World to falloff coordinate
    pub projector_clip: [[f32; 4]; 4],
    /// Orthographic half-size
    pub half_size: f32,
    /// Near plane
    pub near: f32,
    /// Far plane
    pub far: f32,
    /// Padding to align to 16 bytes
    pub _pad: f32,
}

/// Orthographic projector aligned with the capture camera
#[derive(Clone, Debug)]
pub struct ShadowProjector {
    position: Vec3,
    rotation: Quat,
    half_size: f32,
    clip: ClipRange,
    projector_matrix: Mat4,
    projector_clip_matrix: Mat4,
    /// Layers that never receive the projection
    ignore_layers: LayerMask,
    material: ProjectorMaterial,
}

impl ShadowProjector {
    /// Create a projector that skips the target's own layer
    pub fn new(target_layer: LayerId, falloff_texture: Option<TextureHandle>) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            half_size: 1.0,
            clip: ClipRange { near: 0.1, far: 100.0 },
            projector_matrix: Mat4::IDENTITY,
            projector_clip_matrix: Mat4::IDENTITY,
            ignore_layers: LayerMask::only(target_layer),
            material: ProjectorMaterial::new(falloff_texture),
        }
    }

    /// Fit the projector to this frame's volume
    pub fn align(&mut self, frame: &ProjectionFrame) {
        self.position = frame.origin;
        self.rotation = frame.rotation;
        self.half_size = frame.half_size;
        self.clip = frame.projector_clip;
        self.projector_matrix = frame.projector_matrix();
        self.projector_clip_matrix = frame.projector_clip_matrix();
    }

    /// Exclude a new target layer from receiving the shadow
    pub fn set_target_layer(&mut self, target_layer: LayerId) {
        self.ignore_layers = LayerMask::only(target_layer);
    }

    /// Bind the captured silhouette
    pub fn set_shadow_texture(&mut self, texture: Option<RenderTargetHandle>) {
        self.material.shadow_texture = texture;
    }

    /// Check if a node on `layer` receives the projection
    pub fn receives(&self, layer: LayerId) -> bool {
        !self.ignore_layers.contains(layer)
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn half_size(&self) -> f32 {
        self.half_size
    }

    pub fn clip(&self) -> ClipRange {
        self.clip
    }

    pub fn ignore_layers(&self) -> LayerMask {
        self.ignore_layers
    }

    pub fn material(&self) -> &ProjectorMaterial {
        &self.material
    }

    /// World to shadow texture space
    pub fn projector_matrix(&self) -> Mat4 {
        self.projector_matrix
    }

    /// World to falloff coordinate
    pub fn projector_clip_matrix(&self) -> Mat4 {
        self.projector_clip_matrix
    }

    /// Pack for upload
    pub fn uniforms(&self) -> GpuProjectorUniforms {
        GpuProjectorUniforms {
            projector: self.projector_matrix.to_cols_array_2d(),
            projector_clip: self.projector_clip_matrix.to_cols_array_2d(),
            half_size: self.half_size,
            near: self.clip.near,
            far: self.clip.far,
            _pad: 0.0,
        }
    }
}
