//! Screen-space composite pass
//!
//! After the main camera has rendered, a single full-viewport quad is drawn
//! with the lightness as its color. The pass multiplies into the frame buffer
//! and depth tests `Greater` against what is already there, so only pixels
//! covered by real geometry are darkened.

use glam::{Vec2, Vec3, Vec4};

use crate::host::{ImmediateContext, Topology};
use crate::pipeline::{PipelineState, COMPOSITE_PASSES};

/// Quad depth in the `load_ortho` space (-1..100, far end)
pub const COMPOSITE_DEPTH: f32 = -99.99;

/// Full-viewport quad as (uv, position) pairs, counter-clockwise from the origin
pub const FULLSCREEN_QUAD: [(Vec2, Vec3); 4] = [
    (Vec2::new(0.0, 0.0), Vec3::new(0.0, 0.0, COMPOSITE_DEPTH)),
    (Vec2::new(1.0, 0.0), Vec3::new(1.0, 0.0, COMPOSITE_DEPTH)),
    (Vec2::new(1.0, 1.0), Vec3::new(1.0, 1.0, COMPOSITE_DEPTH)),
    (Vec2::new(0.0, 1.0), Vec3::new(0.0, 1.0, COMPOSITE_DEPTH)),
];

/// The composite material and its draw routine
#[derive(Clone, Debug)]
pub struct CompositePass {
    passes: &'static [PipelineState],
}

impl Default for CompositePass {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositePass {
    /// Composite with the built-in single-pass material
    pub fn new() -> Self {
        Self {
            passes: COMPOSITE_PASSES,
        }
    }

    /// Composite with a custom multi-pass material
    pub fn with_passes(passes: &'static [PipelineState]) -> Self {
        Self { passes }
    }

    /// Material passes
    pub fn passes(&self) -> &'static [PipelineState] {
        self.passes
    }

    /// Color the quad is drawn with
    pub fn color(lightness: f32) -> Vec4 {
        Vec4::splat(lightness)
    }

    /// Draw the quad once per material pass, returning the pass count
    pub fn execute<C>(&self, ctx: &mut C, lightness: f32) -> usize
    where
        C: ImmediateContext + ?Sized,
    {
        ctx.push_matrix();
        ctx.load_ortho();
        ctx.set_color(Self::color(lightness));

        for pass in self.passes {
            ctx.apply_pass(pass);
            ctx.begin(Topology::Quads);
            for (uv, position) in FULLSCREEN_QUAD {
                ctx.tex_coord(uv);
                ctx.vertex(position);
            }
            ctx.end();
        }

        ctx.pop_matrix();
        self.passes.len()
    }
}
