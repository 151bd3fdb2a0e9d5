//! # void_shadow - Projected Blob Shadows
//!
//! Cheap soft shadow for a single dynamic character, without shadow maps:
//! - Offscreen orthographic capture of the character's silhouette
//! - Orthographic projector that multiplies the silhouette onto receivers
//! - Full-screen composite quad that darkens covered pixels
//! - Pooled isolation layers so several casters can run side by side
//!
//! ## Architecture
//!
//! ```text
//!            owner node (rig origin)
//!                  |
//!        +---------+----------+
//!        |                    |
//!  SilhouetteCapture    ShadowProjector
//!  (private layer,      (ignores target layer,
//!   clear white,         Blend DstColor Zero)
//!   near/far = d -+ r)   near/far = d .. d + cast)
//!        |                    |
//!        +---- capture surface +
//!                  |
//!            CompositePass (quad at depth -99.99,
//!                           ZTest Greater, multiply)
//! ```
//!
//! The host owns the scene, the GPU and the frame loop and reaches the caster
//! through the traits in [`host`]. Each frame it calls, in order:
//!
//! 1. [`ShadowController::late_update`]
//! 2. [`ShadowController::on_pre_cull`]
//! 3. (renders the capture camera and the main camera)
//! 4. [`ShadowController::on_post_render`]
//!
//! ## Example
//!
//! ```ignore
//! use void_shadow::prelude::*;
//!
//! let pool = LayerPool::default().shared();
//! let quality = QualitySettings::default().shared();
//!
//! let mut caster = ShadowController::new(owner, pool, quality)
//!     .with_target(character)
//!     .with_config(ShadowCasterConfig::default().with_lightness(0.4));
//! caster.start(&scene)?;
//!
//! loop {
//!     caster.late_update(&scene, &mut device);
//!     caster.on_pre_cull(&mut scene);
//!     render(&scene, &mut device);
//!     caster.on_post_render(&mut scene, &mut immediate);
//! }
//! ```

pub mod alignment;
pub mod blend;
pub mod bounds;
pub mod capture;
pub mod composite;
pub mod config;
pub mod controller;
pub mod error;
pub mod host;
pub mod layer;
pub mod phase;
pub mod pipeline;
pub mod projector;
pub mod settings;

#[cfg(test)]
mod testing;

pub use alignment::{ClipRange, ProjectionFrame};
pub use bounds::{Aabb, BoundsEncloser, EnclosingVolume};
pub use capture::{CaptureCamera, CaptureSurface, RenderTargetDesc, SilhouetteCapture};
pub use composite::{CompositePass, COMPOSITE_DEPTH};
pub use config::ShadowCasterConfig;
pub use controller::{ControllerState, ControllerStats, ShadowController};
pub use error::{ShadowError, ShadowResult};
pub use host::{ImmediateContext, NodeId, RenderDevice, RenderTargetHandle, SceneGraph, TextureHandle, Topology};
pub use layer::{LayerId, LayerMask, LayerPool, LayerPoolConfig, SharedLayerPool};
pub use phase::{FrameHook, FramePhase};
pub use pipeline::PipelineState;
pub use projector::{GpuProjectorUniforms, ShadowProjector};
pub use settings::{QualitySettings, SharedQualitySettings};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::alignment::{look_rotation, ClipRange, ProjectionFrame};
    pub use crate::blend::{BlendConfig, BlendFactor, ColorMask, CompareFunction, CullMode};
    pub use crate::bounds::{Aabb, BoundsEncloser, EnclosingVolume};
    pub use crate::capture::{CaptureCamera, CaptureSurface, ColorFormat, RenderTargetDesc, SilhouetteCapture};
    pub use crate::composite::{CompositePass, COMPOSITE_DEPTH};
    pub use crate::config::ShadowCasterConfig;
    pub use crate::controller::{ControllerState, ControllerStats, ShadowController};
    pub use crate::error::{ShadowError, ShadowResult};
    pub use crate::host::{
        ImmediateContext, NodeId, RenderDevice, RenderTargetHandle, SceneGraph, TextureHandle, Topology,
    };
    pub use crate::layer::{IsolatedNodes, LayerId, LayerIsolator, LayerLease, LayerMask, LayerPool, LayerPoolConfig, SharedLayerPool};
    pub use crate::phase::{FrameHook, FramePhase};
    pub use crate::pipeline::{PipelineState, COMPOSITE_PASS, PROJECTOR_PASS};
    pub use crate::projector::{GpuProjectorUniforms, ProjectorMaterial, ShadowProjector};
    pub use crate::settings::{LightCountOverride, QualitySettings, SharedQualitySettings};
}
