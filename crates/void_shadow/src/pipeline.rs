//! Static pipeline-state descriptors for the shadow passes
//!
//! The two shadow materials never change at runtime, so they are plain `const`
//! descriptors (blend, depth, texture combine stages) instead of shader
//! sources assembled at startup. Backends translate a [`PipelineState`] into
//! whatever their API needs; [`PipelineState::shade`] evaluates the texture
//! combiner on the CPU with the same semantics.

use glam::Vec4;

use crate::blend::{BlendConfig, ColorMask, CompareFunction, CullMode, DepthOffset};

/// Texture slot a stage samples from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureSlot {
    /// No texture bound (stage only combines colors)
    None,
    /// The captured silhouette
    Shadow,
    /// The static falloff cookie
    Falloff,
}

/// Texture coordinate generation for a stage
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TexGen {
    /// Use the vertex texture coordinates
    Vertex,
    /// Object-space position transformed by the stage matrix
    ObjectLinear,
}

/// Matrix applied to generated texture coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TextureMatrix {
    Identity,
    /// World to shadow texture space
    Projector,
    /// World to falloff coordinate along the projector axis
    ProjectorClip,
}

/// Per-stage color combiner
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CombineOp {
    /// `result = primary`
    Primary,
    /// `rgb = texture.rgb, a = 1 - texture.a`
    TextureInvertAlpha,
    /// `result = previous * texture.a + constant * (1 - texture.a)`
    LerpPreviousToConstant { constant: Vec4 },
}

impl CombineOp {
    /// Evaluate the combiner
    pub fn apply(self, previous: Vec4, texel: Vec4, primary: Vec4) -> Vec4 {
        match self {
            Self::Primary => primary,
            Self::TextureInvertAlpha => texel.truncate().extend(1.0 - texel.w),
            Self::LerpPreviousToConstant { constant } => constant.lerp(previous, texel.w),
        }
    }
}

/// One fixed-function texture stage
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureStage {
    pub slot: TextureSlot,
    pub tex_gen: TexGen,
    pub matrix: TextureMatrix,
    pub combine: CombineOp,
}

/// Alpha test against a reference value
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AlphaTest {
    pub compare: CompareFunction,
    pub reference: f32,
}

/// Complete state for one material pass
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PipelineState {
    pub label: &'static str,
    pub blend: Option<BlendConfig>,
    pub depth_compare: CompareFunction,
    pub depth_write: bool,
    pub depth_offset: DepthOffset,
    pub cull: CullMode,
    pub color_mask: ColorMask,
    pub alpha_test: Option<AlphaTest>,
    /// Fog color override (white fog leaves a multiply pass neutral)
    pub fog_color: Option<Vec4>,
    pub stages: &'static [TextureStage],
}

/// Neutral color the falloff stage fades toward
pub const FALLOFF_NEUTRAL: Vec4 = Vec4::new(1.0, 1.0, 1.0, 0.0);

/// Full-screen darkening pass drawn after the main scene
///
/// `Greater` depth testing against the existing depth buffer keeps the quad
/// off pixels where nothing was drawn (sky/background).
pub const COMPOSITE_PASS: PipelineState = PipelineState {
    label: "Shadow Composite",
    blend: Some(BlendConfig::MULTIPLY),
    depth_compare: CompareFunction::Greater,
    depth_write: false,
    depth_offset: DepthOffset { factor: 0.0, units: 0.0 },
    cull: CullMode::Off,
    color_mask: ColorMask::ALL,
    alpha_test: None,
    fog_color: None,
    stages: &[TextureStage {
        slot: TextureSlot::None,
        tex_gen: TexGen::Vertex,
        matrix: TextureMatrix::Identity,
        combine: CombineOp::Primary,
    }],
};

/// Projective multiply pass applied by the shadow projector
pub const PROJECTOR_PASS: PipelineState = PipelineState {
    label: "Shadow Projector Multiply",
    blend: Some(BlendConfig::MULTIPLY),
    depth_compare: CompareFunction::LessEqual,
    depth_write: false,
    depth_offset: DepthOffset { factor: -1.0, units: -1.0 },
    cull: CullMode::Back,
    color_mask: ColorMask::RGB,
    alpha_test: Some(AlphaTest {
        compare: CompareFunction::Greater,
        reference: 0.0,
    }),
    fog_color: Some(Vec4::ONE),
    stages: &[
        TextureStage {
            slot: TextureSlot::Shadow,
            tex_gen: TexGen::ObjectLinear,
            matrix: TextureMatrix::Projector,
            combine: CombineOp::TextureInvertAlpha,
        },
        TextureStage {
            slot: TextureSlot::Falloff,
            tex_gen: TexGen::ObjectLinear,
            matrix: TextureMatrix::ProjectorClip,
            combine: CombineOp::LerpPreviousToConstant {
                constant: FALLOFF_NEUTRAL,
            },
        },
    ],
};

/// Passes of the composite material, drawn in order
pub const COMPOSITE_PASSES: &[PipelineState] = &[COMPOSITE_PASS];

impl PipelineState {
    /// Run the texture combiner for one fragment
    ///
    /// `sample` returns the texel for a slot. Returns `None` when the alpha
    /// test discards the fragment.
    pub fn shade<F>(&self, primary: Vec4, mut sample: F) -> Option<Vec4>
    where
        F: FnMut(TextureSlot) -> Vec4,
    {
        let mut color = primary;
        for stage in self.stages {
            let texel = match stage.slot {
                TextureSlot::None => Vec4::ONE,
                slot => sample(slot),
            };
            color = stage.combine.apply(color, texel, primary);
        }

        match self.alpha_test {
            Some(test) if !test.compare.passes(color.w, test.reference) => None,
            _ => Some(color),
        }
    }
}
