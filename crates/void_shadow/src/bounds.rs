//! Enclosing volumes for the shadow target

use glam::Vec3;

use crate::host::{NodeId, SceneGraph};

/// Radius used when the target has no renderable
pub const FALLBACK_RADIUS: f32 = 5.0;

/// Scale applied to every enclosing radius so the silhouette edge is not clipped
pub const RADIUS_SAFETY_FACTOR: f32 = 1.05;

/// Axis-aligned bounding box stored as center and half-extents
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub center: Vec3,
    pub extents: Vec3,
}

impl Aabb {
    /// Create from center and half-extents
    #[inline]
    pub const fn new(center: Vec3, extents: Vec3) -> Self {
        Self { center, extents }
    }

    /// Create from min and max corners
    #[inline]
    pub fn from_min_max(min: Vec3, max: Vec3) -> Self {
        Self {
            center: (min + max) * 0.5,
            extents: (max - min) * 0.5,
        }
    }

    /// Minimum corner
    #[inline]
    pub fn min(&self) -> Vec3 {
        self.center - self.extents
    }

    /// Maximum corner
    #[inline]
    pub fn max(&self) -> Vec3 {
        self.center + self.extents
    }

    /// Radius of the sphere circumscribing the box
    #[inline]
    pub fn circumradius(&self) -> f32 {
        self.extents.length()
    }
}

/// Bounding sphere around the shadow target
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EnclosingVolume {
    pub center: Vec3,
    /// Always > 0
    pub radius: f32,
}

impl EnclosingVolume {
    /// Volume circumscribing renderable bounds
    pub fn from_bounds(bounds: &Aabb) -> Self {
        let radius = bounds.circumradius();
        if radius > f32::EPSILON {
            Self {
                center: bounds.center,
                radius: radius * RADIUS_SAFETY_FACTOR,
            }
        } else {
            // Degenerate bounds: keep the center, not the zero radius
            Self::fallback(bounds.center)
        }
    }

    /// Default volume around a bare position
    pub fn fallback(position: Vec3) -> Self {
        Self {
            center: position,
            radius: FALLBACK_RADIUS * RADIUS_SAFETY_FACTOR,
        }
    }
}

/// Computes the enclosing volume of a target each frame
pub struct BoundsEncloser;

impl BoundsEncloser {
    /// Enclose the target's renderable, or its position if it has none
    pub fn compute<S>(scene: &S, target: NodeId) -> EnclosingVolume
    where
        S: SceneGraph + ?Sized,
    {
        match scene.renderable_bounds(target) {
            Some(bounds) => EnclosingVolume::from_bounds(&bounds),
            None => EnclosingVolume::fallback(scene.world_position(target)),
        }
    }
}
