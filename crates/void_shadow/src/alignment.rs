//! Capture camera / projector alignment
//!
//! Every frame the rig at the owner's position is turned toward the target's
//! enclosing volume and both frusta are fitted to it:
//!
//! ```text
//!   owner ----------- distance ----------->  center
//!                      |<---- radius ---->|<---- radius ---->|
//!   capture:           near                                  far
//!   projector:                            near ----- casting distance ----> far
//! ```

use glam::{Mat3, Mat4, Quat, Vec3, Vec4};

use crate::bounds::EnclosingVolume;

/// Smallest near plane handed to the capture camera
pub const MIN_NEAR_PLANE: f32 = 0.01;

/// Near/far clip planes measured along the view direction
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClipRange {
    pub near: f32,
    pub far: f32,
}

impl ClipRange {
    /// Depth of the range
    #[inline]
    pub fn depth(&self) -> f32 {
        self.far - self.near
    }
}

/// Per-frame alignment data shared by the capture camera and the projector
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ProjectionFrame {
    /// Rig position (the owner's world position)
    pub origin: Vec3,
    /// Rig orientation, -Z looking at the volume center
    pub rotation: Quat,
    /// Unit direction toward the volume center
    pub look_direction: Vec3,
    /// Distance from origin to the volume center
    pub distance: f32,
    /// Orthographic half-size (the enclosing radius)
    pub half_size: f32,
    /// Capture frustum straddling the volume
    pub capture_clip: ClipRange,
    /// Projector frustum starting at the volume center
    pub projector_clip: ClipRange,
}

impl ProjectionFrame {
    /// Fit both frusta to `volume` as seen from `origin`
    pub fn compute(origin: Vec3, volume: &EnclosingVolume, casting_distance: f32) -> Self {
        let offset = volume.center - origin;
        let distance = offset.length();
        let look_direction = if distance > f32::EPSILON {
            offset / distance
        } else {
            Vec3::NEG_Y
        };
        let radius = volume.radius;

        Self {
            origin,
            rotation: look_rotation(look_direction),
            look_direction,
            distance,
            half_size: radius,
            capture_clip: ClipRange {
                near: (distance - radius).max(MIN_NEAR_PLANE),
                far: distance + radius,
            },
            projector_clip: ClipRange {
                near: distance,
                far: distance + casting_distance,
            },
        }
    }

    /// World-to-view transform of the rig
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::from_quat(self.rotation.conjugate()) * Mat4::from_translation(-self.origin)
    }

    /// Orthographic projection of the capture camera
    pub fn capture_projection(&self) -> Mat4 {
        ortho(self.half_size, self.capture_clip)
    }

    /// Orthographic projection of the projector
    pub fn projector_projection(&self) -> Mat4 {
        ortho(self.half_size, self.projector_clip)
    }

    /// World position to shadow texture space (0..1 inside the projector frustum)
    pub fn projector_matrix(&self) -> Mat4 {
        texture_bias() * self.projector_projection() * self.view_matrix()
    }

    /// World position to falloff coordinate: u = 0 at the near plane, 1 at the far plane
    pub fn projector_clip_matrix(&self) -> Mat4 {
        let clip = self.projector_clip;
        let inv_depth = if clip.depth().abs() > f32::EPSILON {
            1.0 / clip.depth()
        } else {
            0.0
        };

        // Row 0 picks view-space depth (-z); everything else but w is dropped
        let depth_to_u = Mat4::from_cols(
            Vec4::ZERO,
            Vec4::ZERO,
            Vec4::new(-inv_depth, 0.0, 0.0, 0.0),
            Vec4::new(-clip.near * inv_depth, 0.0, 0.0, 1.0),
        );
        depth_to_u * self.view_matrix()
    }
}

/// Right-handed look rotation with -Z along `forward`
pub fn look_rotation(forward: Vec3) -> Quat {
    let up = if forward.dot(Vec3::Y).abs() > 0.999 {
        // Looking straight up or down
        Vec3::NEG_Z
    } else {
        Vec3::Y
    };

    let right = forward.cross(up).normalize();
    let actual_up = right.cross(forward);
    Quat::from_mat3(&Mat3::from_cols(right, actual_up, -forward)).normalize()
}

fn ortho(half_size: f32, clip: ClipRange) -> Mat4 {
    Mat4::orthographic_rh(-half_size, half_size, -half_size, half_size, clip.near, clip.far)
}

/// Clip space (-1..1) to texture space (0..1)
fn texture_bias() -> Mat4 {
    Mat4::from_translation(Vec3::new(0.5, 0.5, 0.0)) * Mat4::from_scale(Vec3::new(0.5, 0.5, 1.0))
}
