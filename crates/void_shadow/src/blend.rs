//! Fixed-function blend and depth state
//!
//! Hardware blend state used by the shadow pipelines. Only factor based
//! blending is needed: both shadow passes multiply into the frame buffer.

use glam::Vec4;

/// Blend metadata for GPU pipeline configuration
///
/// Blending is additive: `src * src_factor + dst * dst_factor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendConfig {
    /// Source color blend factor
    pub src_color_factor: BlendFactor,
    /// Destination color blend factor
    pub dst_color_factor: BlendFactor,
    /// Source alpha blend factor
    pub src_alpha_factor: BlendFactor,
    /// Destination alpha blend factor
    pub dst_alpha_factor: BlendFactor,
}

/// Blend factors for GPU blending
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    Zero,
    SrcColor,
    DstColor,
    DstAlpha,
}

impl BlendConfig {
    /// `result = src * dst` (Blend DstColor Zero)
    pub const MULTIPLY: Self = Self {
        src_color_factor: BlendFactor::DstColor,
        dst_color_factor: BlendFactor::Zero,
        src_alpha_factor: BlendFactor::DstAlpha,
        dst_alpha_factor: BlendFactor::Zero,
    };

    /// Blend a source fragment into a destination pixel
    pub fn apply(&self, src: Vec4, dst: Vec4) -> Vec4 {
        let color = src.truncate() * self.src_color_factor.resolve(src, dst).truncate()
            + dst.truncate() * self.dst_color_factor.resolve(src, dst).truncate();
        let alpha = src.w * self.src_alpha_factor.resolve(src, dst).w + dst.w * self.dst_alpha_factor.resolve(src, dst).w;
        color.extend(alpha)
    }

    /// Check if the blend can only darken the destination (for sources in 0..1)
    pub fn darkens_only(&self) -> bool {
        matches!(
            (self.src_color_factor, self.dst_color_factor),
            (BlendFactor::DstColor, BlendFactor::Zero) | (BlendFactor::Zero, BlendFactor::SrcColor)
        )
    }
}

impl BlendFactor {
    /// Per-channel factor value
    pub fn resolve(self, src: Vec4, dst: Vec4) -> Vec4 {
        match self {
            Self::Zero => Vec4::ZERO,
            Self::SrcColor => src,
            Self::DstColor => dst,
            Self::DstAlpha => Vec4::splat(dst.w),
        }
    }
}

/// Depth comparison
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompareFunction {
    Never,
    Less,
    Equal,
    LessEqual,
    Greater,
    NotEqual,
    GreaterEqual,
    Always,
}

impl CompareFunction {
    /// Test an incoming value against a stored one
    pub fn passes(self, incoming: f32, stored: f32) -> bool {
        match self {
            Self::Never => false,
            Self::Less => incoming < stored,
            Self::Equal => incoming == stored,
            Self::LessEqual => incoming <= stored,
            Self::Greater => incoming > stored,
            Self::NotEqual => incoming != stored,
            Self::GreaterEqual => incoming >= stored,
            Self::Always => true,
        }
    }
}

/// Face culling
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CullMode {
    Off,
    Front,
    #[default]
    Back,
}

/// Color channel write mask
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColorMask {
    pub r: bool,
    pub g: bool,
    pub b: bool,
    pub a: bool,
}

impl ColorMask {
    pub const ALL: Self = Self { r: true, g: true, b: true, a: true };
    pub const RGB: Self = Self { r: true, g: true, b: true, a: false };

    /// Merge a written value into the existing one according to the mask
    pub fn apply(&self, written: Vec4, existing: Vec4) -> Vec4 {
        Vec4::new(
            if self.r { written.x } else { existing.x },
            if self.g { written.y } else { existing.y },
            if self.b { written.z } else { existing.z },
            if self.a { written.w } else { existing.w },
        )
    }
}

/// Polygon depth offset (slope factor, constant units)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct DepthOffset {
    pub factor: f32,
    pub units: f32,
}
