//! Software frame buffer
//!
//! A tiny color + depth buffer that implements [`ImmediateContext`], so the
//! composite pass can be executed for real: fragments are depth tested,
//! shaded and blended with the bound [`PipelineState`]. Also validates the
//! immediate-mode call sequence (matched push/pop, begin/end).
//!
//! Depth follows the window convention: 0 is near, 1 is far and the buffer
//! clears to [`CLEAR_DEPTH`]. `load_ortho` maps x/y 0..1 to the viewport and
//! z through a -1..100 orthographic depth range.

use glam::{Mat4, Vec2, Vec3, Vec4};
use void_shadow::pipeline::TextureSlot;
use void_shadow::{Aabb, ImmediateContext, PipelineState, ShadowProjector, Topology};

/// Depth the buffer is cleared to
pub const CLEAR_DEPTH: f32 = 1.0;

/// Near plane of the screen-space ortho projection
pub const ORTHO_NEAR: f32 = -1.0;

/// Far plane of the screen-space ortho projection
pub const ORTHO_FAR: f32 = 100.0;

/// Window depth of an eye-space z under `load_ortho`
pub fn ortho_window_depth(z: f32) -> f32 {
    let range = ORTHO_FAR - ORTHO_NEAR;
    let ndc = -2.0 / range * z - (ORTHO_FAR + ORTHO_NEAR) / range;
    (ndc + 1.0) * 0.5
}

/// Raster statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub primitives: u64,
    pub fragments_tested: u64,
    pub fragments_written: u64,
    /// Misordered immediate-mode calls
    pub violations: u64,
}

#[derive(Debug)]
struct Batch {
    topology: Topology,
    vertices: Vec<Vec3>,
}

/// Color + depth buffer with an immediate-mode front end
#[derive(Debug)]
pub struct FrameBuffer {
    width: u32,
    height: u32,
    color: Vec<Vec4>,
    depth: Vec<f32>,

    matrix_depth: usize,
    ortho: bool,
    current_color: Vec4,
    pass: Option<PipelineState>,
    batch: Option<Batch>,
    stats: RasterStats,
}

impl FrameBuffer {
    /// Create a buffer cleared to black at [`CLEAR_DEPTH`]
    pub fn new(width: u32, height: u32) -> Self {
        let len = (width as usize) * (height as usize);
        Self {
            width,
            height,
            color: vec![Vec4::new(0.0, 0.0, 0.0, 1.0); len],
            depth: vec![CLEAR_DEPTH; len],
            matrix_depth: 0,
            ortho: false,
            current_color: Vec4::ONE,
            pass: None,
            batch: None,
            stats: RasterStats::default(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Reset color and depth
    pub fn clear(&mut self, color: Vec4) {
        self.color.fill(color);
        self.depth.fill(CLEAR_DEPTH);
    }

    /// Draw opaque geometry covering pixels `[x0, x1) x [y0, y1)` at `depth`
    ///
    /// Uses a `Less` depth test with depth writes, like a regular opaque pass.
    pub fn fill_rect(&mut self, x0: u32, y0: u32, x1: u32, y1: u32, color: Vec4, depth: f32) {
        for y in y0.min(self.height)..y1.min(self.height) {
            for x in x0.min(self.width)..x1.min(self.width) {
                let i = self.index(x, y);
                if depth < self.depth[i] {
                    self.color[i] = color;
                    self.depth[i] = depth;
                }
            }
        }
    }

    /// Draw the screen-space footprint of a world box through `view_proj`
    ///
    /// `view_proj` maps to clip space with x/y in -1..1 and z in 0..1.
    /// Returns false when the box lies entirely outside the view volume.
    pub fn draw_box(&mut self, view_proj: Mat4, bounds: &Aabb, color: Vec4) -> bool {
        let (min, max) = (bounds.min(), bounds.max());
        let mut lo = Vec3::splat(f32::MAX);
        let mut hi = Vec3::splat(f32::MIN);
        for i in 0..8 {
            let corner = Vec3::new(
                if i & 1 == 0 { min.x } else { max.x },
                if i & 2 == 0 { min.y } else { max.y },
                if i & 4 == 0 { min.z } else { max.z },
            );
            let ndc = view_proj.project_point3(corner);
            lo = lo.min(ndc);
            hi = hi.max(ndc);
        }

        if hi.x < -1.0 || lo.x > 1.0 || hi.y < -1.0 || lo.y > 1.0 || hi.z < 0.0 || lo.z > 1.0 {
            return false;
        }

        let to_pixel = |ndc: f32, size: u32| ((ndc.clamp(-1.0, 1.0) * 0.5 + 0.5) * size as f32).round() as u32;
        let (x0, x1) = (to_pixel(lo.x, self.width), to_pixel(hi.x, self.width));
        let (y0, y1) = (to_pixel(lo.y, self.height), to_pixel(hi.y, self.height));
        self.fill_rect(x0, y0, x1, y1, color, lo.z.max(0.0));
        true
    }

    /// Nearest-texel lookup with uv in 0..1
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let x = ((uv.x.clamp(0.0, 1.0) * self.width as f32) as u32).min(self.width.saturating_sub(1));
        let y = ((uv.y.clamp(0.0, 1.0) * self.height as f32) as u32).min(self.height.saturating_sub(1));
        self.pixel(x, y).unwrap_or(Vec4::ONE)
    }

    /// Number of pixels whose color differs from `color`
    pub fn count_not(&self, color: Vec4) -> usize {
        self.color.iter().filter(|c| !c.abs_diff_eq(color, 1e-6)).count()
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Vec4> {
        self.in_bounds(x, y).then(|| self.color[self.index(x, y)])
    }

    pub fn depth(&self, x: u32, y: u32) -> Option<f32> {
        self.in_bounds(x, y).then(|| self.depth[self.index(x, y)])
    }

    /// Current immediate-mode matrix stack depth
    pub fn matrix_depth(&self) -> usize {
        self.matrix_depth
    }

    pub fn stats(&self) -> RasterStats {
        self.stats
    }

    fn in_bounds(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        (y as usize) * (self.width as usize) + x as usize
    }

    fn violation(&mut self, what: &str) {
        log::error!("Immediate-mode violation: {}", what);
        self.stats.violations += 1;
    }

    /// Viewport pixel position and window depth of a vertex
    fn to_window(&self, vertex: Vec3) -> Vec3 {
        let depth = if self.ortho {
            ortho_window_depth(vertex.z)
        } else {
            vertex.z.clamp(0.0, 1.0)
        };
        Vec3::new(vertex.x * self.width as f32, vertex.y * self.height as f32, depth)
    }

    fn rasterize(&mut self, polygon: &[Vec3]) {
        if polygon.len() < 3 {
            return;
        }
        let Some(pass) = self.pass else {
            self.violation("primitive drawn without a bound pass");
            return;
        };
        self.stats.primitives += 1;

        let window: Vec<Vec3> = polygon.iter().map(|v| self.to_window(*v)).collect();
        let depth = window.iter().map(|v| v.z).sum::<f32>() / window.len() as f32;
        let corners: Vec<Vec2> = window.iter().map(|v| v.truncate()).collect();

        let (min, max) = corners
            .iter()
            .fold((Vec2::splat(f32::MAX), Vec2::splat(f32::MIN)), |(lo, hi), c| (lo.min(*c), hi.max(*c)));
        let x0 = min.x.floor().max(0.0) as u32;
        let y0 = min.y.floor().max(0.0) as u32;
        let x1 = (max.x.ceil().max(0.0) as u32).min(self.width);
        let y1 = (max.y.ceil().max(0.0) as u32).min(self.height);

        for y in y0..y1 {
            for x in x0..x1 {
                let center = Vec2::new(x as f32 + 0.5, y as f32 + 0.5);
                if !inside_convex(&corners, center) {
                    continue;
                }
                self.stats.fragments_tested += 1;

                let i = self.index(x, y);
                if !pass.depth_compare.passes(depth, self.depth[i]) {
                    continue;
                }
                let Some(src) = pass.shade(self.current_color, |_| Vec4::ONE) else {
                    continue;
                };
                let dst = self.color[i];
                let blended = pass.blend.map_or(src, |blend| blend.apply(src, dst));
                self.color[i] = pass.color_mask.apply(blended, dst);
                if pass.depth_write {
                    self.depth[i] = depth;
                }
                self.stats.fragments_written += 1;
            }
        }
    }
}

impl ImmediateContext for FrameBuffer {
    fn push_matrix(&mut self) {
        self.matrix_depth += 1;
    }

    fn load_ortho(&mut self) {
        if self.matrix_depth == 0 {
            self.violation("load_ortho without push_matrix");
        }
        self.ortho = true;
    }

    fn pop_matrix(&mut self) {
        if self.matrix_depth == 0 {
            self.violation("pop_matrix on empty stack");
            return;
        }
        self.matrix_depth -= 1;
        if self.matrix_depth == 0 {
            self.ortho = false;
        }
    }

    fn set_color(&mut self, color: Vec4) {
        self.current_color = color;
    }

    fn apply_pass(&mut self, pass: &PipelineState) {
        if self.batch.is_some() {
            self.violation("apply_pass inside begin/end");
        }
        self.pass = Some(*pass);
    }

    fn begin(&mut self, topology: Topology) {
        if self.batch.is_some() {
            self.violation("nested begin");
        }
        self.batch = Some(Batch {
            topology,
            vertices: Vec::new(),
        });
    }

    fn tex_coord(&mut self, _uv: Vec2) {
        // Composite passes are untextured
    }

    fn vertex(&mut self, position: Vec3) {
        match self.batch.as_mut() {
            Some(batch) => batch.vertices.push(position),
            None => self.violation("vertex outside begin/end"),
        }
    }

    fn end(&mut self) {
        let Some(batch) = self.batch.take() else {
            self.violation("end without begin");
            return;
        };

        match batch.topology {
            Topology::Quads => {
                if batch.vertices.len() % 4 != 0 {
                    self.violation("quad batch with incomplete quad");
                }
                for quad in batch.vertices.chunks_exact(4) {
                    self.rasterize(quad);
                }
            }
            Topology::TriangleFan => self.rasterize(&batch.vertices),
        }
    }
}

fn inside_convex(corners: &[Vec2], point: Vec2) -> bool {
    let mut sign = 0.0f32;
    for (i, a) in corners.iter().enumerate() {
        let b = corners[(i + 1) % corners.len()];
        let cross = (b - *a).perp_dot(point - *a);
        if cross == 0.0 {
            continue;
        }
        if sign == 0.0 {
            sign = cross.signum();
        } else if cross.signum() != sign {
            return false;
        }
    }
    true
}

/// Frame-buffer multiplier the projector applies to a receiver point
///
/// `silhouette` samples the capture surface at a shadow uv, `falloff` the
/// cookie at (u, 0.5). Returns `None` outside the projector frustum or when
/// the pass discards the fragment.
pub fn projector_coverage<S, F>(projector: &ShadowProjector, world: Vec3, silhouette: S, falloff: F) -> Option<Vec4>
where
    S: Fn(Vec2) -> Vec4,
    F: Fn(Vec2) -> Vec4,
{
    let point = world.extend(1.0);
    let shadow = projector.projector_matrix() * point;
    let uv = shadow.truncate().truncate() / shadow.w;
    let u = (projector.projector_clip_matrix() * point).x;

    let inside = |v: f32| (0.0..=1.0).contains(&v);
    if !(inside(uv.x) && inside(uv.y) && inside(u)) {
        return None;
    }

    let falloff_uv = Vec2::new(u, 0.5);
    projector.material().pass.shade(Vec4::ONE, |slot| match slot {
        TextureSlot::Shadow => silhouette(uv),
        TextureSlot::Falloff => falloff(falloff_uv),
        TextureSlot::None => Vec4::ONE,
    })
}
