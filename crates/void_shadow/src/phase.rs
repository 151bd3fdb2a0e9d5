//! Explicit frame phases
//!
//! The host drives the caster through three callbacks per frame. Isolation,
//! capture and composite only work in that order, so the controller tracks
//! where in the frame it is and rejects callbacks that arrive out of order.

use serde::{Deserialize, Serialize};

use crate::error::{ShadowError, ShadowResult};

/// Host callbacks that move a frame forward
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrameHook {
    /// Per-frame update after gameplay (surface creation, realignment)
    LateUpdate,
    /// Before visibility culling of the main camera (isolation)
    PreCull,
    /// After the main camera rendered (restore + composite)
    PostRender,
}

/// Where the active caster is within the current frame
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FramePhase {
    /// Target on its own layer; rig may be realigned
    PreCapture,
    /// Target isolated on the private layer while the capture camera renders
    Captured,
    /// Layers restored and the composite drawn
    Composited,
}

impl Default for FramePhase {
    fn default() -> Self {
        Self::PreCapture
    }
}

impl FramePhase {
    /// Phase after `hook`, or an error if the hook is not allowed now
    ///
    /// A late update may repeat (frames where the camera does not render),
    /// but isolation must always be followed by exactly one post-render.
    pub fn advance(self, hook: FrameHook) -> ShadowResult<FramePhase> {
        match (self, hook) {
            (Self::PreCapture | Self::Composited, FrameHook::LateUpdate) => Ok(Self::PreCapture),
            (Self::PreCapture, FrameHook::PreCull) => Ok(Self::Captured),
            (Self::Captured, FrameHook::PostRender) => Ok(Self::Composited),
            (phase, hook) => Err(ShadowError::PhaseOrder { hook, phase }),
        }
    }

    /// Check if the target is currently on the private layer
    pub fn is_isolated(self) -> bool {
        self == Self::Captured
    }
}
