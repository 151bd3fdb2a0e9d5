//! Shadow controller
//!
//! Owns the capture camera, projector and composite pass for one target and
//! drives them from the host's frame callbacks:
//!
//! 1. [`late_update`](ShadowController::late_update): create the capture
//!    surface if needed, fit camera and projector to the target
//! 2. [`on_pre_cull`](ShadowController::on_pre_cull): lower the pixel light
//!    count and move the target onto the private layer
//! 3. the host renders the capture camera
//! 4. [`on_post_render`](ShadowController::on_post_render): put the target
//!    back, draw the composite quad, restore the light count
//!
//! State machine:
//!
//! ```text
//! Uninitialized --start(no target)--> Disabled (permanent)
//! Uninitialized --start(target)-----> Active(PreCapture -> Captured -> Composited -> ...)
//! Active --on_disable--> Uninitialized --on_enable--> Active
//! ```

use glam::Vec4;

use crate::alignment::ProjectionFrame;
use crate::bounds::BoundsEncloser;
use crate::capture::{CaptureCamera, CaptureSurface, SilhouetteCapture};
use crate::composite::CompositePass;
use crate::config::ShadowCasterConfig;
use crate::error::{ShadowError, ShadowResult};
use crate::host::{ImmediateContext, NodeId, RenderDevice, SceneGraph, TextureHandle};
use crate::layer::{IsolatedNodes, LayerId, LayerIsolator, LayerLease, SharedLayerPool};
use crate::phase::{FrameHook, FramePhase};
use crate::projector::ShadowProjector;
use crate::settings::{LightCountOverride, SharedQualitySettings};

/// Lifecycle state of a controller
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// Not started yet, or disabled by the host
    Uninitialized,
    /// Started without a target; never does any work again
    Disabled,
    /// Running, at the given point of the frame
    Active(FramePhase),
}

/// Counters for hosts and diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ControllerStats {
    pub frames_composited: u64,
    pub surfaces_created: u64,
    pub surfaces_released: u64,
}

/// Camera/projector rig built at start
#[derive(Debug)]
struct ShadowRig {
    isolator: LayerIsolator,
    capture: SilhouetteCapture,
    projector: ShadowProjector,
    composite: CompositePass,
    /// Target layer seen outside any isolation window; isolation moves
    /// nodes off this layer and it is excluded from receiving the projection
    target_layer: LayerId,
}

impl ShadowRig {
    fn new(private: LayerId, target_layer: LayerId, falloff: Option<TextureHandle>) -> Self {
        Self {
            isolator: LayerIsolator::new(private),
            capture: SilhouetteCapture::new(private),
            projector: ShadowProjector::new(target_layer, falloff),
            composite: CompositePass::new(),
            target_layer,
        }
    }

    fn set_private_layer(&mut self, private: LayerId) {
        self.isolator = LayerIsolator::new(private);
        self.capture.set_private_layer(private);
    }
}

/// Projected blob shadow for one target
#[derive(Debug)]
pub struct ShadowController {
    owner: NodeId,
    target: Option<NodeId>,
    config: ShadowCasterConfig,
    fadeout_texture: Option<TextureHandle>,
    layer_pool: SharedLayerPool,
    quality: SharedQualitySettings,
    state: ControllerState,
    rig: Option<ShadowRig>,
    lease: Option<LayerLease>,
    isolation: Option<IsolatedNodes>,
    light_override: Option<LightCountOverride>,
    frame: Option<ProjectionFrame>,
    stats: ControllerStats,
}

impl ShadowController {
    /// Create a controller whose rig sits at `owner`
    pub fn new(owner: NodeId, layer_pool: SharedLayerPool, quality: SharedQualitySettings) -> Self {
        Self {
            owner,
            target: None,
            config: ShadowCasterConfig::default(),
            fadeout_texture: None,
            layer_pool,
            quality,
            state: ControllerState::Uninitialized,
            rig: None,
            lease: None,
            isolation: None,
            light_override: None,
            frame: None,
            stats: ControllerStats::default(),
        }
    }

    /// Set the target node
    pub fn with_target(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    /// Set the configuration
    pub fn with_config(mut self, config: ShadowCasterConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the falloff cookie bound at start
    pub fn with_fadeout_texture(mut self, texture: TextureHandle) -> Self {
        self.fadeout_texture = Some(texture);
        self
    }

    // ---- Lifecycle hooks ----

    /// Validate the target and build the rig
    ///
    /// Without a target the controller disables itself for good. A target
    /// assigned afterwards is not picked up.
    pub fn start<S>(&mut self, scene: &S) -> ShadowResult<()>
    where
        S: SceneGraph + ?Sized,
    {
        if self.state != ControllerState::Uninitialized || self.rig.is_some() {
            return Ok(());
        }

        let Some(target) = self.target else {
            log::error!("No target assigned, disabling shadow caster on {:?}", self.owner);
            self.state = ControllerState::Disabled;
            return Err(ShadowError::MissingTarget);
        };

        let target_layer = scene.layer(target);
        if target_layer.is_default() {
            log::warn!(
                "Shadow target {:?} is on the default layer; everything sharing it is isolated during capture",
                target
            );
        }

        let lease = LayerLease::acquire(&self.layer_pool).map_err(|err| {
            log::error!("Cannot start shadow caster on {:?}: {}", self.owner, err);
            err
        })?;

        self.rig = Some(ShadowRig::new(lease.layer(), target_layer, self.fadeout_texture));
        log::info!(
            "Shadow caster started for {:?} (isolation layer {}, target layer {})",
            target,
            lease.layer().index(),
            target_layer.index()
        );
        self.lease = Some(lease);
        self.state = ControllerState::Active(FramePhase::PreCapture);
        Ok(())
    }

    /// Resume after [`on_disable`](Self::on_disable)
    ///
    /// The capture surface is recreated lazily on the next late update.
    pub fn on_enable(&mut self) -> ShadowResult<()> {
        if self.state != ControllerState::Uninitialized {
            return Ok(());
        }
        let Some(rig) = self.rig.as_mut() else {
            // Never started: `start` does the setup
            return Ok(());
        };

        let lease = LayerLease::acquire(&self.layer_pool)?;
        rig.set_private_layer(lease.layer());
        self.lease = Some(lease);
        self.state = ControllerState::Active(FramePhase::PreCapture);
        log::debug!("Shadow caster on {:?} re-enabled", self.owner);
        Ok(())
    }

    /// Create the surface if missing and realign camera and projector
    pub fn late_update<S, D>(&mut self, scene: &S, device: &mut D)
    where
        S: SceneGraph + ?Sized,
        D: RenderDevice + ?Sized,
    {
        let ControllerState::Active(phase) = self.state else {
            return;
        };
        let Some(next) = Self::advance(phase, FrameHook::LateUpdate) else {
            return;
        };
        let Some(rig) = self.rig.as_mut() else {
            return;
        };
        let config = self.config.validated();

        let (surface, created) = rig.capture.ensure_surface(device, config.texture_size, config.depth_bits);
        if created {
            self.stats.surfaces_created += 1;
        }
        rig.projector.set_shadow_texture(Some(surface.handle));

        match self.target {
            Some(target) => {
                let layer = scene.layer(target);
                // A reserved layer means some caster holds the target isolated right now
                let isolated = self.layer_pool.lock().reserved().contains(layer);
                if layer != rig.target_layer && !isolated {
                    log::debug!(
                        "Target layer changed {} -> {}, updating projector exclusion",
                        rig.target_layer.index(),
                        layer.index()
                    );
                    rig.target_layer = layer;
                    rig.projector.set_target_layer(layer);
                }

                let volume = BoundsEncloser::compute(scene, target);
                let origin = scene.world_position(self.owner);
                let frame = ProjectionFrame::compute(origin, &volume, config.casting_distance);
                rig.capture.align(&frame);
                rig.projector.align(&frame);
                log::trace!(
                    "Aligned shadow rig: distance {:.3}, radius {:.3}, capture {:.3}..{:.3}, projector {:.3}..{:.3}",
                    frame.distance,
                    frame.half_size,
                    frame.capture_clip.near,
                    frame.capture_clip.far,
                    frame.projector_clip.near,
                    frame.projector_clip.far
                );
                self.frame = Some(frame);
            }
            None => log::warn!("Shadow caster on {:?} lost its target, keeping last alignment", self.owner),
        }

        device.update_capture_camera(rig.capture.camera());
        device.update_projector(&rig.projector);
        self.state = ControllerState::Active(next);
    }

    /// Isolate the target before the capture camera renders
    pub fn on_pre_cull<S>(&mut self, scene: &mut S)
    where
        S: SceneGraph + ?Sized,
    {
        let ControllerState::Active(phase) = self.state else {
            return;
        };
        let Some(next) = Self::advance(phase, FrameHook::PreCull) else {
            return;
        };
        let Some(rig) = self.rig.as_ref() else {
            return;
        };

        let reduced = self.config.validated().capture_light_count;
        self.light_override = Some(LightCountOverride::acquire(&self.quality, reduced));

        if let Some(target) = self.target {
            if scene.layer(target) != rig.target_layer {
                log::debug!(
                    "Target {:?} is on layer {} instead of {}, capturing only what is still there",
                    target,
                    scene.layer(target).index(),
                    rig.target_layer.index()
                );
            }
            self.isolation = Some(rig.isolator.isolate(scene, target, rig.target_layer));
        }
        self.state = ControllerState::Active(next);
    }

    /// Restore the target and darken the frame buffer
    pub fn on_post_render<S, C>(&mut self, scene: &mut S, ctx: &mut C)
    where
        S: SceneGraph + ?Sized,
        C: ImmediateContext + ?Sized,
    {
        let ControllerState::Active(phase) = self.state else {
            return;
        };
        let Some(next) = Self::advance(phase, FrameHook::PostRender) else {
            return;
        };
        let Some(rig) = self.rig.as_ref() else {
            return;
        };

        if let Some(isolated) = self.isolation.take() {
            rig.isolator.restore(scene, isolated);
        }

        let lightness = self.config.validated().lightness;
        rig.composite.execute(ctx, lightness);

        // Dropping the override restores the saved light count
        self.light_override = None;
        self.stats.frames_composited += 1;
        self.state = ControllerState::Active(next);
    }

    /// Release the capture surface and the isolation channel
    ///
    /// Safe at any point of the frame and idempotent.
    pub fn on_disable<S, D>(&mut self, scene: &mut S, device: &mut D)
    where
        S: SceneGraph + ?Sized,
        D: RenderDevice + ?Sized,
    {
        if !self.is_active() {
            return;
        }
        let Some(rig) = self.rig.as_mut() else {
            return;
        };

        if let Some(isolation) = self.isolation.take() {
            log::warn!("Shadow caster disabled mid-frame, restoring target layers");
            rig.isolator.restore(scene, isolation);
        }
        self.light_override = None;

        if rig.capture.release(device) {
            self.stats.surfaces_released += 1;
        }
        rig.projector.set_shadow_texture(None);

        self.lease = None;
        self.frame = None;
        self.state = ControllerState::Uninitialized;
    }

    fn advance(phase: FramePhase, hook: FrameHook) -> Option<FramePhase> {
        match phase.advance(hook) {
            Ok(next) => Some(next),
            Err(err) => {
                log::error!("{}", err);
                debug_assert!(false, "{}", err);
                None
            }
        }
    }

    // ---- Accessors ----

    /// Current lifecycle state
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Check if the controller is running
    pub fn is_active(&self) -> bool {
        matches!(self.state, ControllerState::Active(_))
    }

    /// Check if the controller disabled itself for good
    pub fn is_disabled(&self) -> bool {
        self.state == ControllerState::Disabled
    }

    pub fn owner(&self) -> NodeId {
        self.owner
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    /// Replace the target; takes effect on the next frame
    pub fn set_target(&mut self, target: Option<NodeId>) {
        self.target = target;
    }

    pub fn config(&self) -> &ShadowCasterConfig {
        &self.config
    }

    /// Mutable configuration, re-read every frame
    pub fn config_mut(&mut self) -> &mut ShadowCasterConfig {
        &mut self.config
    }

    /// Isolation layer leased while active
    pub fn private_layer(&self) -> Option<LayerId> {
        self.lease.as_ref().map(LayerLease::layer)
    }

    /// Layer excluded from receiving the projection
    pub fn excluded_layer(&self) -> Option<LayerId> {
        self.rig.as_ref().map(|rig| rig.target_layer)
    }

    pub fn capture_surface(&self) -> Option<CaptureSurface> {
        self.rig.as_ref().and_then(|rig| rig.capture.surface())
    }

    pub fn capture_camera(&self) -> Option<&CaptureCamera> {
        self.rig.as_ref().map(|rig| rig.capture.camera())
    }

    pub fn projector(&self) -> Option<&ShadowProjector> {
        self.rig.as_ref().map(|rig| &rig.projector)
    }

    /// Alignment computed by the last late update
    pub fn projection_frame(&self) -> Option<&ProjectionFrame> {
        self.frame.as_ref()
    }

    /// Color of the composite quad under the current configuration
    pub fn composite_color(&self) -> Vec4 {
        CompositePass::color(self.config.validated().lightness)
    }

    pub fn stats(&self) -> ControllerStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::Aabb;
    use crate::layer::LayerPool;
    use crate::settings::QualitySettings;
    use crate::testing::{QuadCounter, TestDevice, TestScene};
    use glam::Vec3;

    fn layer(index: u8) -> LayerId {
        LayerId::new(index).unwrap()
    }

    struct Fixture {
        scene: TestScene,
        device: TestDevice,
        ctx: QuadCounter,
        owner: NodeId,
        target: NodeId,
        limb: NodeId,
        pool: SharedLayerPool,
        quality: SharedQualitySettings,
    }

    impl Fixture {
        fn new() -> Self {
            let mut scene = TestScene::new();
            let owner = scene.add(None, LayerId::DEFAULT);
            scene.set_position(owner, Vec3::new(0.0, 25.0, 0.0));
            let target = scene.add(None, layer(8));
            scene.set_bounds(target, Aabb::new(Vec3::new(0.0, 5.0, 0.0), Vec3::new(1.0, 2.0, 1.0)));
            let limb = scene.add(Some(target), layer(8));

            Self {
                scene,
                device: TestDevice::default(),
                ctx: QuadCounter::default(),
                owner,
                target,
                limb,
                pool: LayerPool::default().shared(),
                quality: QualitySettings::default().shared(),
            }
        }

        fn controller(&self) -> ShadowController {
            ShadowController::new(self.owner, self.pool.clone(), self.quality.clone()).with_target(self.target)
        }

        fn frame(&mut self, controller: &mut ShadowController) {
            controller.late_update(&self.scene, &mut self.device);
            controller.on_pre_cull(&mut self.scene);
            controller.on_post_render(&mut self.scene, &mut self.ctx);
        }
    }

    #[test]
    fn test_missing_target_disables_permanently() {
        let mut fx = Fixture::new();
        let mut controller = ShadowController::new(fx.owner, fx.pool.clone(), fx.quality.clone());

        assert_eq!(controller.start(&fx.scene), Err(ShadowError::MissingTarget));
        assert!(controller.is_disabled());

        // Assigning a target later is not picked up
        controller.set_target(Some(fx.target));
        assert_eq!(controller.start(&fx.scene), Ok(()));
        for _ in 0..3 {
            fx.frame(&mut controller);
        }
        assert!(controller.is_disabled());
        assert_eq!(fx.device.created, 0);
        assert_eq!(fx.ctx.quads, 0);
        assert_eq!(fx.pool.lock().in_use(), 0);
    }

    #[test]
    fn test_frame_cycle() {
        let mut fx = Fixture::new();
        let mut controller = fx.controller();
        controller.start(&fx.scene).unwrap();
        assert_eq!(controller.private_layer(), Some(LayerId::LAST));

        controller.late_update(&fx.scene, &mut fx.device);
        assert_eq!(controller.state(), ControllerState::Active(FramePhase::PreCapture));
        assert_eq!(fx.device.created, 1);

        controller.on_pre_cull(&mut fx.scene);
        assert_eq!(fx.scene.layer(fx.target), LayerId::LAST);
        assert_eq!(fx.scene.layer(fx.limb), LayerId::LAST);
        assert_eq!(fx.quality.lock().pixel_light_count, 0);

        controller.on_post_render(&mut fx.scene, &mut fx.ctx);
        assert_eq!(fx.scene.layer(fx.target), layer(8));
        assert_eq!(fx.scene.layer(fx.limb), layer(8));
        assert_eq!(fx.quality.lock().pixel_light_count, 4);
        assert_eq!(fx.ctx.quads, 1);
        assert_eq!(fx.ctx.color, Some(Vec4::splat(0.3)));
        assert_eq!(controller.state(), ControllerState::Active(FramePhase::Composited));
        assert_eq!(controller.stats().frames_composited, 1);
    }

    #[test]
    fn test_alignment_end_to_end() {
        let mut fx = Fixture::new();
        let mut controller = fx.controller();
        controller.start(&fx.scene).unwrap();
        controller.late_update(&fx.scene, &mut fx.device);

        let frame = controller.projection_frame().unwrap();
        assert!((frame.half_size - 2.572).abs() < 1e-3);
        assert!((frame.capture_clip.near - 17.428).abs() < 1e-3);
        assert!((frame.capture_clip.far - 22.572).abs() < 1e-3);
        assert_eq!(frame.projector_clip.near, 20.0);
        assert_eq!(frame.projector_clip.far, 30.0);

        let camera = fx.device.camera.as_ref().unwrap();
        assert_eq!(camera.clip, frame.capture_clip);
        assert_eq!(camera.target, controller.capture_surface().map(|s| s.handle));
        assert_eq!(fx.device.projector_updates, 1);
    }

    #[test]
    fn test_disable_reenable_recreates_surface_with_new_size() {
        let mut fx = Fixture::new();
        let mut controller = fx.controller();
        controller.start(&fx.scene).unwrap();
        fx.frame(&mut controller);
        assert_eq!(controller.capture_surface().unwrap().size, 256);

        // Size changes do not touch the live surface
        controller.config_mut().texture_size = 512;
        fx.frame(&mut controller);
        assert_eq!(controller.capture_surface().unwrap().size, 256);
        assert_eq!(fx.device.created, 1);

        controller.on_disable(&mut fx.scene, &mut fx.device);
        assert_eq!(controller.state(), ControllerState::Uninitialized);
        assert!(controller.capture_surface().is_none());
        assert!(fx.device.live.is_empty());
        assert_eq!(fx.pool.lock().in_use(), 0);

        // Idempotent
        controller.on_disable(&mut fx.scene, &mut fx.device);
        assert_eq!(controller.stats().surfaces_released, 1);

        controller.on_enable().unwrap();
        assert!(controller.capture_surface().is_none());
        fx.frame(&mut controller);
        assert_eq!(controller.capture_surface().unwrap().size, 512);
        assert_eq!(fx.device.live[0].1.width, 512);
        assert_eq!(controller.stats().surfaces_created, 2);
    }

    #[test]
    fn test_disable_mid_frame_restores_layers() {
        let mut fx = Fixture::new();
        let mut controller = fx.controller();
        controller.start(&fx.scene).unwrap();
        controller.late_update(&fx.scene, &mut fx.device);
        controller.on_pre_cull(&mut fx.scene);

        controller.on_disable(&mut fx.scene, &mut fx.device);
        assert_eq!(fx.scene.layer(fx.target), layer(8));
        assert_eq!(fx.scene.layer(fx.limb), layer(8));
        assert_eq!(fx.quality.lock().pixel_light_count, 4);
    }

    #[test]
    fn test_concurrent_casters_use_distinct_layers() {
        let fx = Fixture::new();
        let mut first = fx.controller();
        let mut second = fx.controller();
        first.start(&fx.scene).unwrap();
        second.start(&fx.scene).unwrap();

        assert_ne!(first.private_layer(), second.private_layer());
        assert_eq!(fx.pool.lock().in_use(), 2);
    }

    #[test]
    fn test_pool_exhaustion_keeps_controller_uninitialized() {
        let fx = Fixture::new();
        let pool = LayerPool::single(LayerId::LAST).shared();
        let mut first = ShadowController::new(fx.owner, pool.clone(), fx.quality.clone()).with_target(fx.target);
        let mut second = ShadowController::new(fx.owner, pool.clone(), fx.quality.clone()).with_target(fx.target);

        first.start(&fx.scene).unwrap();
        assert_eq!(
            second.start(&fx.scene),
            Err(ShadowError::LayerPoolExhausted { capacity: 1 })
        );
        assert_eq!(second.state(), ControllerState::Uninitialized);

        drop(first);
        second.start(&fx.scene).unwrap();
        assert!(second.is_active());
    }

    #[test]
    fn test_target_layer_change_updates_exclusion() {
        let mut fx = Fixture::new();
        let mut controller = fx.controller();
        controller.start(&fx.scene).unwrap();
        fx.frame(&mut controller);
        assert_eq!(controller.excluded_layer(), Some(layer(8)));

        fx.scene.set_layer(fx.target, layer(9));
        fx.frame(&mut controller);
        assert_eq!(controller.excluded_layer(), Some(layer(9)));
        let projector = controller.projector().unwrap();
        assert!(projector.receives(layer(8)));
        assert!(!projector.receives(layer(9)));
    }

    #[test]
    fn test_casters_sharing_target_restore_its_layer() {
        let mut fx = Fixture::new();
        let mut first = fx.controller();
        let mut second = fx.controller();
        first.start(&fx.scene).unwrap();
        second.start(&fx.scene).unwrap();
        let first_layer = first.private_layer().unwrap();

        first.late_update(&fx.scene, &mut fx.device);
        second.late_update(&fx.scene, &mut fx.device);
        first.on_pre_cull(&mut fx.scene);
        second.on_pre_cull(&mut fx.scene);
        // Already isolated by the first caster; the second leaves it there
        assert_eq!(fx.scene.layer(fx.target), first_layer);
        first.on_post_render(&mut fx.scene, &mut fx.ctx);
        second.on_post_render(&mut fx.scene, &mut fx.ctx);

        assert_eq!(fx.scene.layer(fx.target), layer(8));
        assert_eq!(fx.scene.layer(fx.limb), layer(8));
        assert_eq!(fx.quality.lock().pixel_light_count, 4);

        // A late update seen during the other caster's isolation keeps the exclusion
        first.late_update(&fx.scene, &mut fx.device);
        first.on_pre_cull(&mut fx.scene);
        second.late_update(&fx.scene, &mut fx.device);
        assert_eq!(second.excluded_layer(), Some(layer(8)));
        second.on_pre_cull(&mut fx.scene);
        second.on_post_render(&mut fx.scene, &mut fx.ctx);
        first.on_post_render(&mut fx.scene, &mut fx.ctx);

        assert_eq!(fx.scene.layer(fx.target), layer(8));
        assert_eq!(fx.scene.layer(fx.limb), layer(8));
        assert_eq!(fx.quality.lock().pixel_light_count, 4);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "out of order")]
    fn test_post_render_without_pre_cull_panics_in_debug() {
        let mut fx = Fixture::new();
        let mut controller = fx.controller();
        controller.start(&fx.scene).unwrap();
        controller.late_update(&fx.scene, &mut fx.device);
        controller.on_post_render(&mut fx.scene, &mut fx.ctx);
    }
}
