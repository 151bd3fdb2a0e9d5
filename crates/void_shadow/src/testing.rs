//! Minimal host implementations for unit tests

use glam::{Vec2, Vec3, Vec4};

use crate::bounds::Aabb;
use crate::capture::{CaptureCamera, RenderTargetDesc};
use crate::host::{ImmediateContext, NodeId, RenderDevice, RenderTargetHandle, SceneGraph, Topology};
use crate::layer::LayerId;
use crate::pipeline::PipelineState;
use crate::projector::ShadowProjector;

struct TestNode {
    layer: LayerId,
    children: Vec<NodeId>,
    position: Vec3,
    bounds: Option<Aabb>,
}

pub(crate) struct TestScene {
    nodes: Vec<TestNode>,
}

impl TestScene {
    pub(crate) fn new() -> Self {
        Self { nodes: Vec::new() }
    }

    pub(crate) fn add(&mut self, parent: Option<NodeId>, layer: LayerId) -> NodeId {
        let id = NodeId(self.nodes.len() as u64);
        self.nodes.push(TestNode {
            layer,
            children: Vec::new(),
            position: Vec3::ZERO,
            bounds: None,
        });
        if let Some(parent) = parent {
            self.nodes[parent.0 as usize].children.push(id);
        }
        id
    }

    pub(crate) fn set_position(&mut self, node: NodeId, position: Vec3) {
        self.nodes[node.0 as usize].position = position;
    }

    pub(crate) fn set_bounds(&mut self, node: NodeId, bounds: Aabb) {
        self.nodes[node.0 as usize].bounds = Some(bounds);
    }
}

impl SceneGraph for TestScene {
    fn layer(&self, node: NodeId) -> LayerId {
        self.nodes[node.0 as usize].layer
    }

    fn set_layer(&mut self, node: NodeId, layer: LayerId) {
        self.nodes[node.0 as usize].layer = layer;
    }

    fn children(&self, node: NodeId) -> &[NodeId] {
        &self.nodes[node.0 as usize].children
    }

    fn world_position(&self, node: NodeId) -> Vec3 {
        self.nodes[node.0 as usize].position
    }

    fn renderable_bounds(&self, node: NodeId) -> Option<Aabb> {
        self.nodes[node.0 as usize].bounds
    }
}

#[derive(Default)]
pub(crate) struct TestDevice {
    next_handle: u64,
    pub(crate) live: Vec<(RenderTargetHandle, RenderTargetDesc)>,
    pub(crate) created: usize,
    pub(crate) camera: Option<CaptureCamera>,
    pub(crate) projector_updates: usize,
}

impl RenderDevice for TestDevice {
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> RenderTargetHandle {
        self.next_handle += 1;
        let handle = RenderTargetHandle(self.next_handle);
        self.live.push((handle, desc.clone()));
        self.created += 1;
        handle
    }

    fn release_render_target(&mut self, handle: RenderTargetHandle) {
        self.live.retain(|(live, _)| *live != handle);
    }

    fn update_capture_camera(&mut self, camera: &CaptureCamera) {
        self.camera = Some(camera.clone());
    }

    fn update_projector(&mut self, _projector: &ShadowProjector) {
        self.projector_updates += 1;
    }
}

/// Counts quads, ignores everything else
#[derive(Default)]
pub(crate) struct QuadCounter {
    pub(crate) quads: usize,
    pub(crate) color: Option<Vec4>,
}

impl ImmediateContext for QuadCounter {
    fn push_matrix(&mut self) {}
    fn load_ortho(&mut self) {}
    fn pop_matrix(&mut self) {}
    fn set_color(&mut self, color: Vec4) {
        self.color = Some(color);
    }
    fn apply_pass(&mut self, _pass: &PipelineState) {}
    fn begin(&mut self, _topology: Topology) {
        self.quads += 1;
    }
    fn tex_coord(&mut self, _uv: Vec2) {}
    fn vertex(&mut self, _position: Vec3) {}
    fn end(&mut self) {}
}
