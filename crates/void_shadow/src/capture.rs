//! Offscreen silhouette capture
//!
//! An orthographic camera that only sees the private isolation layer and
//! renders it into a square color + depth target cleared to white. The
//! target is created lazily on the first frame after (re)enable and freed on
//! disable; a new texture size only applies when the surface is recreated.

use glam::{Quat, Vec3, Vec4};

use crate::alignment::{ClipRange, ProjectionFrame};
use crate::host::{RenderDevice, RenderTargetHandle};
use crate::layer::{LayerId, LayerMask};

/// Clear color of the capture surface
pub const CAPTURE_CLEAR_COLOR: Vec4 = Vec4::ONE;

/// Color format of an offscreen target
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ColorFormat {
    Rgba8Unorm,
}

/// Description of an offscreen render target
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderTargetDesc {
    pub label: &'static str,
    pub width: u32,
    pub height: u32,
    pub format: ColorFormat,
    pub depth_bits: u32,
    pub power_of_two: bool,
}

impl RenderTargetDesc {
    /// Square capture target
    pub fn capture(size: u32, depth_bits: u32) -> Self {
        Self {
            label: "Shadow Capture",
            width: size,
            height: size,
            format: ColorFormat::Rgba8Unorm,
            depth_bits,
            power_of_two: size.is_power_of_two(),
        }
    }
}

/// Live capture surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CaptureSurface {
    pub handle: RenderTargetHandle,
    pub size: u32,
}

/// Camera state pushed to the host every frame
#[derive(Clone, Debug, PartialEq)]
pub struct CaptureCamera {
    pub position: Vec3,
    pub rotation: Quat,
    /// Orthographic half-size
    pub half_size: f32,
    pub clip: ClipRange,
    pub clear_color: Vec4,
    /// Exactly the private layer
    pub culling_mask: LayerMask,
    pub target: Option<RenderTargetHandle>,
}

impl CaptureCamera {
    fn new(private: LayerId) -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            half_size: 1.0,
            clip: ClipRange { near: 0.3, far: 1000.0 },
            clear_color: CAPTURE_CLEAR_COLOR,
            culling_mask: LayerMask::only(private),
            target: None,
        }
    }
}

/// Offscreen camera plus its lazily created target
#[derive(Debug)]
pub struct SilhouetteCapture {
    camera: CaptureCamera,
    surface: Option<CaptureSurface>,
}

impl SilhouetteCapture {
    /// Create a capture camera culling everything but `private`
    pub fn new(private: LayerId) -> Self {
        Self {
            camera: CaptureCamera::new(private),
            surface: None,
        }
    }

    /// Point the culling mask at a different private layer
    pub fn set_private_layer(&mut self, private: LayerId) {
        self.camera.culling_mask = LayerMask::only(private);
    }

    /// Create the surface if there is none yet
    ///
    /// Returns the live surface and whether it was created by this call.
    pub fn ensure_surface<D>(&mut self, device: &mut D, size: u32, depth_bits: u32) -> (CaptureSurface, bool)
    where
        D: RenderDevice + ?Sized,
    {
        if let Some(surface) = self.surface {
            return (surface, false);
        }

        let handle = device.create_render_target(&RenderTargetDesc::capture(size, depth_bits));
        let surface = CaptureSurface { handle, size };
        self.surface = Some(surface);
        self.camera.target = Some(handle);
        log::info!("Created {}x{} shadow capture surface {:?}", size, size, handle);
        (surface, true)
    }

    /// Free the surface, returning true if one existed
    pub fn release<D>(&mut self, device: &mut D) -> bool
    where
        D: RenderDevice + ?Sized,
    {
        self.camera.target = None;
        match self.surface.take() {
            Some(surface) => {
                device.release_render_target(surface.handle);
                log::info!("Released shadow capture surface {:?}", surface.handle);
                true
            }
            None => false,
        }
    }

    /// Fit the camera to this frame's volume
    pub fn align(&mut self, frame: &ProjectionFrame) {
        self.camera.position = frame.origin;
        self.camera.rotation = frame.rotation;
        self.camera.half_size = frame.half_size;
        self.camera.clip = frame.capture_clip;
    }

    /// Current camera state
    pub fn camera(&self) -> &CaptureCamera {
        &self.camera
    }

    /// Current surface, if created
    pub fn surface(&self) -> Option<CaptureSurface> {
        self.surface
    }
}
