//! Recording render device
//!
//! Tracks offscreen target allocations and keeps the last camera and
//! projector state pushed by the caster, so tests and tools can inspect what
//! a real backend would have received.

use std::collections::HashMap;

use void_shadow::{
    CaptureCamera, GpuProjectorUniforms, LayerMask, RenderDevice, RenderTargetDesc, RenderTargetHandle,
    ShadowProjector,
};

/// Allocation event
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DeviceEvent {
    Created(RenderTargetHandle, RenderTargetDesc),
    Released(RenderTargetHandle),
}

/// Device statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DeviceStats {
    pub targets_created: u64,
    pub targets_released: u64,
    pub camera_updates: u64,
    pub projector_updates: u64,
    /// Releases of handles that were not live
    pub invalid_releases: u64,
}

/// Render device that only records what it is asked to do
#[derive(Debug, Default)]
pub struct RecordingDevice {
    next_handle: u64,
    live: HashMap<RenderTargetHandle, RenderTargetDesc>,
    events: Vec<DeviceEvent>,
    camera: Option<CaptureCamera>,
    projector: Option<GpuProjectorUniforms>,
    projector_ignore: Option<LayerMask>,
    stats: DeviceStats,
}

impl RecordingDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Description of a live target
    pub fn target(&self, handle: RenderTargetHandle) -> Option<&RenderTargetDesc> {
        self.live.get(&handle)
    }

    /// Number of live targets
    pub fn live_targets(&self) -> usize {
        self.live.len()
    }

    /// Allocation history
    pub fn events(&self) -> &[DeviceEvent] {
        &self.events
    }

    /// Last capture camera pushed
    pub fn camera(&self) -> Option<&CaptureCamera> {
        self.camera.as_ref()
    }

    /// Last projector uniforms pushed
    pub fn projector(&self) -> Option<&GpuProjectorUniforms> {
        self.projector.as_ref()
    }

    /// Layers the last projector was told to skip
    pub fn projector_ignore_layers(&self) -> Option<LayerMask> {
        self.projector_ignore
    }

    pub fn stats(&self) -> DeviceStats {
        self.stats
    }
}

impl RenderDevice for RecordingDevice {
    fn create_render_target(&mut self, desc: &RenderTargetDesc) -> RenderTargetHandle {
        self.next_handle += 1;
        let handle = RenderTargetHandle(self.next_handle);
        self.live.insert(handle, desc.clone());
        self.events.push(DeviceEvent::Created(handle, desc.clone()));
        self.stats.targets_created += 1;
        log::debug!(
            "Created render target {:?} '{}' ({}x{}, {}-bit depth)",
            handle,
            desc.label,
            desc.width,
            desc.height,
            desc.depth_bits
        );
        handle
    }

    fn release_render_target(&mut self, handle: RenderTargetHandle) {
        if self.live.remove(&handle).is_none() {
            log::warn!("Release of unknown render target {:?}", handle);
            self.stats.invalid_releases += 1;
            return;
        }
        self.events.push(DeviceEvent::Released(handle));
        self.stats.targets_released += 1;
    }

    fn update_capture_camera(&mut self, camera: &CaptureCamera) {
        self.camera = Some(camera.clone());
        self.stats.camera_updates += 1;
    }

    fn update_projector(&mut self, projector: &ShadowProjector) {
        self.projector = Some(projector.uniforms());
        self.projector_ignore = Some(projector.ignore_layers());
        self.stats.projector_updates += 1;
    }
}
