//! Host seams
//!
//! The shadow caster never owns the scene, the GPU or the frame loop. Everything
//! it needs from the engine goes through the traits in this module:
//!
//! - [`SceneGraph`]: node hierarchy, render layers, transforms and bounds
//! - [`RenderDevice`]: offscreen targets plus camera/projector submission
//! - [`ImmediateContext`]: GL-style immediate drawing for the composite pass

use glam::{Vec2, Vec3, Vec4};

use crate::bounds::Aabb;
use crate::capture::{CaptureCamera, RenderTargetDesc};
use crate::layer::LayerId;
use crate::pipeline::PipelineState;
use crate::projector::ShadowProjector;

/// Handle to a scene node owned by the host
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

/// Handle to a host texture (e.g. the falloff cookie)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TextureHandle(pub u64);

/// Handle to an offscreen render target created through [`RenderDevice`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RenderTargetHandle(pub u64);

/// Read/write access to the host scene graph
pub trait SceneGraph {
    /// Current render layer of a node
    fn layer(&self, node: NodeId) -> LayerId;

    /// Move a node onto another render layer
    fn set_layer(&mut self, node: NodeId, layer: LayerId);

    /// Direct children of a node
    fn children(&self, node: NodeId) -> &[NodeId];

    /// World-space position of a node
    fn world_position(&self, node: NodeId) -> Vec3;

    /// World-space bounds of the node's renderable, if it has one
    fn renderable_bounds(&self, node: NodeId) -> Option<Aabb>;
}

/// Renderer services used by the capture camera and the projector
pub trait RenderDevice {
    /// Allocate an offscreen color + depth target
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> RenderTargetHandle;

    /// Free a target previously returned by `create_render_target`
    fn release_render_target(&mut self, handle: RenderTargetHandle);

    /// Push the capture camera state for this frame
    fn update_capture_camera(&mut self, camera: &CaptureCamera);

    /// Push the projector state for this frame
    fn update_projector(&mut self, projector: &ShadowProjector);
}

/// Primitive topology for immediate-mode draws
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Four vertices per quad
    Quads,
    /// Fan around the first vertex
    TriangleFan,
}

/// Immediate-mode drawing on the current frame buffer
pub trait ImmediateContext {
    /// Save the current model-view-projection state
    fn push_matrix(&mut self);

    /// Load a screen-space orthographic projection (0..1 in x and y)
    fn load_ortho(&mut self);

    /// Restore the last saved model-view-projection state
    fn pop_matrix(&mut self);

    /// Set the active (primary) color
    fn set_color(&mut self, color: Vec4);

    /// Bind blend, depth and texture stage state for one material pass
    fn apply_pass(&mut self, pass: &PipelineState);

    /// Start a primitive batch
    fn begin(&mut self, topology: Topology);

    /// Texture coordinate for the next vertex
    fn tex_coord(&mut self, uv: Vec2);

    /// Emit a vertex
    fn vertex(&mut self, position: Vec3);

    /// Finish the primitive batch
    fn end(&mut self);
}
