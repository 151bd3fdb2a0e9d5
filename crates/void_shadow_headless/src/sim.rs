//! Bobbing-character simulation
//!
//! Runs a full caster frame loop against the headless host: the capture
//! camera's view is rasterized into a software capture surface, the
//! composite pass darkens the silhouette, and a grid of ground points is
//! shaded through the projector to count how much ground lies in shadow.

use std::f32::consts::TAU;

use glam::{Vec2, Vec3, Vec4};
use serde::{Deserialize, Serialize};
use void_shadow::capture::CAPTURE_CLEAR_COLOR;
use void_shadow::{
    ControllerStats, LayerId, LayerPool, NodeId, QualitySettings, SceneGraph, ShadowCasterConfig, ShadowController,
    ShadowError, ShadowResult,
};

use crate::device::{DeviceStats, RecordingDevice};
use crate::raster::{projector_coverage, FrameBuffer};
use crate::scene::HeadlessScene;

/// Render layer the character lives on
pub const CHARACTER_LAYER: u8 = 8;

const CHARACTER_ALBEDO: Vec4 = Vec4::new(0.5, 0.45, 0.4, 1.0);
const GROUND_HALF_EXTENT: f32 = 4.0;
const GROUND_TOP: f32 = 0.05;

/// Simulation settings
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Frames to simulate
    pub frames: u32,
    /// Vertical bob amplitude of the character
    pub bob_amplitude: f32,
    /// Frames per bob cycle
    pub bob_period: u32,
    /// World position of the shadow rig
    pub light_position: [f32; 3],
    /// Ground samples per axis
    pub ground_samples: u32,
    /// Caster settings
    pub caster: ShadowCasterConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            frames: 120,
            bob_amplitude: 0.5,
            bob_period: 60,
            light_position: [2.0, 15.0, 1.0],
            ground_samples: 32,
            caster: ShadowCasterConfig::default(),
        }
    }
}

impl SimConfig {
    /// Parse from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> ShadowResult<Self> {
        serde_json::from_str(json).map_err(|e| ShadowError::Config(e.to_string()))
    }
}

/// Results of a run
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SimSummary {
    pub frames: u32,
    pub frames_composited: u64,
    pub surfaces_created: u64,
    pub surfaces_released: u64,
    pub live_targets: usize,
    /// Fewest shadowed ground samples in any frame
    pub min_shadowed_samples: usize,
    /// Most shadowed ground samples in any frame
    pub max_shadowed_samples: usize,
    /// Darkest ground multiplier seen
    pub darkest_coverage: f32,
    /// Silhouette pixels in the last capture
    pub silhouette_pixels: usize,
    pub layer_writes: u64,
    pub immediate_violations: u64,
}

/// Headless scene plus one shadow caster
pub struct Simulation {
    config: SimConfig,
    scene: HeadlessScene,
    device: RecordingDevice,
    capture: FrameBuffer,
    controller: ShadowController,
    character: NodeId,
    ground: NodeId,
    character_base: Vec3,
    summary: SimSummary,
}

impl Simulation {
    /// Build the scene and start the caster
    pub fn new(config: SimConfig) -> ShadowResult<Self> {
        let layer = LayerId::new(CHARACTER_LAYER)
            .ok_or_else(|| ShadowError::Config(format!("invalid character layer {}", CHARACTER_LAYER)))?;

        let mut scene = HeadlessScene::new();
        let world = scene.build("World").spawn();
        let ground = scene
            .build("Ground")
            .parent(world)
            .extents(Vec3::new(GROUND_HALF_EXTENT, GROUND_TOP, GROUND_HALF_EXTENT))
            .spawn();
        let character_base = Vec3::new(0.0, 1.6, 0.0);
        let character = scene
            .build("Character")
            .parent(world)
            .layer(layer)
            .position(character_base)
            .extents(Vec3::new(0.5, 1.1, 0.4))
            .spawn();
        scene
            .build("Head")
            .parent(character)
            .layer(layer)
            .position(Vec3::new(0.0, 1.35, 0.0))
            .extents(Vec3::splat(0.25))
            .spawn();
        scene
            .build("Arm")
            .parent(character)
            .layer(layer)
            .position(Vec3::new(0.65, 0.2, 0.0))
            .extents(Vec3::new(0.15, 0.6, 0.15))
            .spawn();
        let light = scene
            .build("ShadowLight")
            .parent(world)
            .position(Vec3::from(config.light_position))
            .spawn();

        let mut controller = ShadowController::new(light, LayerPool::default().shared(), QualitySettings::default().shared())
            .with_target(character)
            .with_config(config.caster.clone());
        controller.start(&scene)?;

        Ok(Self {
            capture: FrameBuffer::new(config.caster.texture_size, config.caster.texture_size),
            summary: SimSummary {
                min_shadowed_samples: usize::MAX,
                darkest_coverage: 1.0,
                ..Default::default()
            },
            config,
            scene,
            device: RecordingDevice::new(),
            controller,
            character,
            ground,
            character_base,
        })
    }

    pub fn scene(&self) -> &HeadlessScene {
        &self.scene
    }

    pub fn controller(&self) -> &ShadowController {
        &self.controller
    }

    pub fn device_stats(&self) -> DeviceStats {
        self.device.stats()
    }

    pub fn controller_stats(&self) -> ControllerStats {
        self.controller.stats()
    }

    /// Run one frame, returning the number of shadowed ground samples
    pub fn step(&mut self, frame: u32) -> usize {
        let phase = frame as f32 / self.config.bob_period.max(1) as f32 * TAU;
        let bob = Vec3::Y * self.config.bob_amplitude * phase.sin();
        self.scene.set_local_position(self.character, self.character_base + bob);

        self.controller.late_update(&self.scene, &mut self.device);
        self.controller.on_pre_cull(&mut self.scene);
        self.render_capture();
        self.controller.on_post_render(&mut self.scene, &mut self.capture);

        let shadowed = self.shade_ground();
        self.summary.frames += 1;
        self.summary.min_shadowed_samples = self.summary.min_shadowed_samples.min(shadowed);
        self.summary.max_shadowed_samples = self.summary.max_shadowed_samples.max(shadowed);
        shadowed
    }

    /// Simulate all configured frames, disable the caster and summarize
    pub fn run(mut self) -> SimSummary {
        for frame in 0..self.config.frames {
            let shadowed = self.step(frame);
            if frame % 30 == 0 {
                log::info!(
                    "Frame {}: character at y={:.2}, {} ground samples shadowed",
                    frame,
                    self.scene.world_position(self.character).y,
                    shadowed
                );
            }
        }

        self.controller.on_disable(&mut self.scene, &mut self.device);
        self.finish()
    }

    fn finish(mut self) -> SimSummary {
        if self.summary.frames == 0 {
            self.summary.min_shadowed_samples = 0;
        }
        let stats = self.controller.stats();
        self.summary.frames_composited = stats.frames_composited;
        self.summary.surfaces_created = stats.surfaces_created;
        self.summary.surfaces_released = stats.surfaces_released;
        self.summary.live_targets = self.device.live_targets();
        self.summary.layer_writes = self.scene.layer_writes();
        self.summary.immediate_violations = self.capture.stats().violations;
        self.summary
    }

    /// What the capture camera sees: every node on its culling mask
    fn render_capture(&mut self) {
        let (Some(camera), Some(frame), Some(surface)) = (
            self.controller.capture_camera(),
            self.controller.projection_frame(),
            self.controller.capture_surface(),
        ) else {
            return;
        };

        if self.capture.width() != surface.size {
            self.capture = FrameBuffer::new(surface.size, surface.size);
        }
        self.capture.clear(camera.clear_color);

        let view_proj = frame.capture_projection() * frame.view_matrix();
        let mask = camera.culling_mask;
        for node in self.scene.nodes() {
            if !mask.contains(self.scene.layer(node)) {
                continue;
            }
            if let Some(bounds) = self.scene.renderable_bounds(node) {
                self.capture.draw_box(view_proj, &bounds, CHARACTER_ALBEDO);
            }
        }
    }

    /// Shade a grid of ground points through the projector
    fn shade_ground(&mut self) -> usize {
        let Some(projector) = self.controller.projector() else {
            return 0;
        };
        if !projector.receives(self.scene.layer(self.ground)) {
            return 0;
        }

        let samples = self.config.ground_samples.max(2);
        let step = 2.0 * GROUND_HALF_EXTENT / (samples - 1) as f32;
        let capture = &self.capture;
        let mut shadowed = 0;

        for iz in 0..samples {
            for ix in 0..samples {
                let point = Vec3::new(
                    -GROUND_HALF_EXTENT + ix as f32 * step,
                    GROUND_TOP,
                    -GROUND_HALF_EXTENT + iz as f32 * step,
                );
                let coverage = projector_coverage(
                    projector,
                    point,
                    |uv| capture.sample(uv),
                    |uv: Vec2| Vec4::new(1.0, 1.0, 1.0, 1.0 - uv.x),
                );
                if let Some(coverage) = coverage {
                    let darkness = coverage.truncate().max_element();
                    if darkness < 0.999 {
                        shadowed += 1;
                        self.summary.darkest_coverage = self.summary.darkest_coverage.min(darkness);
                    }
                }
            }
        }

        self.summary.silhouette_pixels = capture.count_not(CAPTURE_CLEAR_COLOR);
        shadowed
    }
}
