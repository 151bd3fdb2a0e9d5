//! Integration tests for the shadow caster frame lifecycle
//!
//! Drives `ShadowController` through full frames against the headless host:
//! - Layer isolation and restoration
//! - Camera/projector alignment
//! - Capture surface lifetime across disable/enable
//! - Composite darkening on the software frame buffer
//! - Multiple casters sharing one layer pool

use glam::{Vec3, Vec4};
use void_shadow::prelude::*;
use void_shadow_headless::{DeviceEvent, FrameBuffer, HeadlessScene, RecordingDevice};

fn layer(index: u8) -> LayerId {
    LayerId::new(index).expect("valid layer")
}

struct Host {
    scene: HeadlessScene,
    device: RecordingDevice,
    frame_buffer: FrameBuffer,
    owner: NodeId,
    character: NodeId,
    pool: SharedLayerPool,
    quality: SharedQualitySettings,
}

impl Host {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();

        let mut scene = HeadlessScene::new();
        let world = scene.build("World").spawn();
        let owner = scene
            .build("ShadowLight")
            .parent(world)
            .position(Vec3::new(0.0, 25.0, 0.0))
            .spawn();
        let character = scene
            .build("Character")
            .parent(world)
            .layer(layer(8))
            .position(Vec3::new(0.0, 5.0, 0.0))
            .extents(Vec3::new(1.0, 2.0, 1.0))
            .spawn();
        let torso = scene.build("Torso").parent(character).layer(layer(8)).spawn();
        scene.build("Hand").parent(torso).layer(layer(9)).spawn();
        scene.build("Prop").parent(character).spawn();

        Self {
            scene,
            device: RecordingDevice::new(),
            frame_buffer: FrameBuffer::new(16, 16),
            owner,
            character,
            pool: LayerPool::default().shared(),
            quality: QualitySettings::default().shared(),
        }
    }

    fn caster(&self) -> ShadowController {
        ShadowController::new(self.owner, self.pool.clone(), self.quality.clone()).with_target(self.character)
    }

    fn frame(&mut self, caster: &mut ShadowController) {
        caster.late_update(&self.scene, &mut self.device);
        caster.on_pre_cull(&mut self.scene);
        caster.on_post_render(&mut self.scene, &mut self.frame_buffer);
    }
}

#[test]
fn test_isolation_round_trip_preserves_mixed_layers() {
    let mut host = Host::new();
    let mut caster = host.caster();
    caster.start(&host.scene).expect("caster should start");

    let before = host.scene.layer_snapshot(host.character);
    let private = caster.private_layer().expect("leased layer");

    caster.late_update(&host.scene, &mut host.device);
    caster.on_pre_cull(&mut host.scene);

    // Only nodes on the target's layer move; the hand and the prop stay put
    let during = host.scene.layer_snapshot(host.character);
    for ((node, was), (_, now)) in before.iter().zip(&during) {
        let expected = if *was == layer(8) { private } else { *was };
        assert_eq!(*now, expected, "node {:?}", node);
    }
    assert_eq!(during.iter().filter(|(_, l)| *l == private).count(), 2);
    assert_eq!(caster.state(), ControllerState::Active(FramePhase::Captured));

    caster.on_post_render(&mut host.scene, &mut host.frame_buffer);
    assert_eq!(host.scene.layer_snapshot(host.character), before);
    assert_eq!(caster.state(), ControllerState::Active(FramePhase::Composited));
}

#[test]
fn test_alignment_matches_volume() {
    let mut host = Host::new();
    let mut caster = host.caster();
    caster.start(&host.scene).expect("caster should start");
    host.frame(&mut caster);

    let camera = host.device.camera().expect("camera pushed");
    assert!((camera.clip.near - 17.428).abs() < 1e-3);
    assert!((camera.clip.far - 22.572).abs() < 1e-3);
    assert!((camera.half_size - 2.572).abs() < 1e-3);
    assert_eq!(camera.position, Vec3::new(0.0, 25.0, 0.0));
    assert_eq!(camera.clear_color, Vec4::ONE);
    assert_eq!(camera.culling_mask, LayerMask::only(caster.private_layer().expect("leased layer")));

    let uniforms = host.device.projector().expect("projector pushed");
    assert_eq!(uniforms.near, 20.0);
    assert_eq!(uniforms.far, 30.0);
    assert!((uniforms.half_size - 2.572).abs() < 1e-3);
    assert_eq!(host.device.projector_ignore_layers(), Some(LayerMask::only(layer(8))));

    // Rig looks straight down
    let forward = camera.rotation * Vec3::NEG_Z;
    assert!(forward.abs_diff_eq(Vec3::NEG_Y, 1e-5));
}

#[test]
fn test_missing_target_allocates_nothing() {
    let mut host = Host::new();
    let mut caster = ShadowController::new(host.owner, host.pool.clone(), host.quality.clone());

    assert_eq!(caster.start(&host.scene), Err(ShadowError::MissingTarget));
    for _ in 0..5 {
        host.frame(&mut caster);
    }

    assert_eq!(caster.state(), ControllerState::Disabled);
    assert!(host.device.events().is_empty());
    assert!(host.device.camera().is_none());
    assert_eq!(host.scene.layer_writes(), 0);
    assert_eq!(host.frame_buffer.stats().primitives, 0);
}

#[test]
fn test_target_without_renderable_uses_fallback_radius() {
    let mut host = Host::new();
    let bare = host.scene.build("Bare").layer(layer(8)).position(Vec3::new(0.0, 5.0, 0.0)).spawn();
    let mut caster = ShadowController::new(host.owner, host.pool.clone(), host.quality.clone()).with_target(bare);
    caster.start(&host.scene).expect("caster should start");
    host.frame(&mut caster);

    let frame = caster.projection_frame().expect("aligned");
    assert!((frame.half_size - 5.25).abs() < 1e-4);
    assert!((frame.capture_clip.near - 14.75).abs() < 1e-4);
}

#[test]
fn test_surface_lifetime_across_disable() {
    let mut host = Host::new();
    let mut caster = host.caster();
    caster.start(&host.scene).expect("caster should start");
    host.frame(&mut caster);
    host.frame(&mut caster);
    assert_eq!(host.device.live_targets(), 1);

    // A new size does not touch the live surface
    caster.config_mut().texture_size = 128;
    host.frame(&mut caster);
    let surface = caster.capture_surface().expect("surface live");
    assert_eq!(host.device.target(surface.handle).map(|d| d.width), Some(256));

    caster.on_disable(&mut host.scene, &mut host.device);
    caster.on_disable(&mut host.scene, &mut host.device);
    assert_eq!(host.device.live_targets(), 0);
    assert_eq!(host.device.stats().invalid_releases, 0);
    assert_eq!(host.pool.lock().in_use(), 0);

    caster.on_enable().expect("re-enable");
    assert_eq!(host.device.live_targets(), 0);
    host.frame(&mut caster);

    let surface = caster.capture_surface().expect("surface recreated");
    let desc = host.device.target(surface.handle).expect("live target");
    assert_eq!((desc.width, desc.height), (128, 128));
    assert_eq!(desc.depth_bits, 16);
    assert!(desc.power_of_two);

    let created = host
        .device
        .events()
        .iter()
        .filter(|e| matches!(e, DeviceEvent::Created(..)))
        .count();
    assert_eq!(created, 2);
}

#[test]
fn test_light_count_restored() {
    let mut host = Host::new();
    host.quality.lock().pixel_light_count = 6;
    let mut caster = host
        .caster()
        .with_config(ShadowCasterConfig { capture_light_count: 1, ..Default::default() });
    caster.start(&host.scene).expect("caster should start");

    caster.late_update(&host.scene, &mut host.device);
    caster.on_pre_cull(&mut host.scene);
    assert_eq!(host.quality.lock().pixel_light_count, 1);
    caster.on_post_render(&mut host.scene, &mut host.frame_buffer);
    assert_eq!(host.quality.lock().pixel_light_count, 6);

    // Disabled between isolation and composite
    caster.late_update(&host.scene, &mut host.device);
    caster.on_pre_cull(&mut host.scene);
    caster.on_disable(&mut host.scene, &mut host.device);
    assert_eq!(host.quality.lock().pixel_light_count, 6);
    assert_eq!(host.scene.layer(host.character), layer(8));
}

#[test]
fn test_composite_skips_background() {
    let mut host = Host::new();
    let sky = Vec4::new(0.4, 0.6, 0.9, 1.0);
    host.frame_buffer.clear(sky);
    host.frame_buffer.fill_rect(4, 4, 12, 12, Vec4::new(0.9, 0.9, 0.9, 1.0), 0.5);

    let mut caster = host.caster().with_config(ShadowCasterConfig::default().with_lightness(0.5));
    caster.start(&host.scene).expect("caster should start");
    host.frame(&mut caster);

    let covered = host.frame_buffer.pixel(8, 8).expect("in bounds");
    assert!((covered.x - 0.45).abs() < 1e-5);
    assert_eq!(host.frame_buffer.pixel(1, 1), Some(sky));
    assert_eq!(host.frame_buffer.pixel(14, 2), Some(sky));
    assert_eq!(host.frame_buffer.depth(8, 8), Some(0.5));
    assert_eq!(host.frame_buffer.matrix_depth(), 0);
    assert_eq!(host.frame_buffer.stats().violations, 0);
    assert_eq!(host.frame_buffer.stats().fragments_written, 64);
}

#[test]
fn test_casters_share_pool() {
    let mut host = Host::new();
    host.pool = LayerPool::new(LayerPoolConfig { first: 30, count: 2 }).shared();

    let mut a = host.caster();
    let mut b = host.caster();
    let mut c = host.caster();
    a.start(&host.scene).expect("first caster");
    b.start(&host.scene).expect("second caster");
    assert_ne!(a.private_layer(), b.private_layer());
    assert_eq!(
        c.start(&host.scene),
        Err(ShadowError::LayerPoolExhausted { capacity: 2 })
    );
    assert_eq!(c.state(), ControllerState::Uninitialized);

    // Freed channel is picked up by the waiting caster
    a.on_disable(&mut host.scene, &mut host.device);
    c.start(&host.scene).expect("third caster after release");
    assert!(c.is_active());
    assert_eq!(host.pool.lock().available(), 0);

    // Re-enable of the first one now fails until a channel frees up
    assert!(a.on_enable().is_err());
    assert_eq!(a.state(), ControllerState::Uninitialized);
}

#[test]
fn test_interleaved_casters_restore_shared_state() {
    let mut host = Host::new();
    let companion = host
        .scene
        .build("Companion")
        .layer(layer(10))
        .position(Vec3::new(3.0, 1.0, 0.0))
        .extents(Vec3::ONE)
        .spawn();

    // Two lights on the character plus one on the companion
    let mut casters = vec![
        host.caster(),
        ShadowController::new(host.owner, host.pool.clone(), host.quality.clone()).with_target(companion),
        host.caster(),
    ];
    for caster in casters.iter_mut() {
        caster.start(&host.scene).expect("caster should start");
    }
    let before = host.scene.layer_snapshot(host.character);

    for frame in 0..4 {
        for caster in casters.iter_mut() {
            caster.late_update(&host.scene, &mut host.device);
        }
        for caster in casters.iter_mut() {
            caster.on_pre_cull(&mut host.scene);
        }
        assert_eq!(host.quality.lock().pixel_light_count, 0);
        assert_eq!(host.quality.lock().active_overrides(), 3);

        if frame % 2 == 0 {
            for caster in casters.iter_mut() {
                caster.on_post_render(&mut host.scene, &mut host.frame_buffer);
            }
        } else {
            for caster in casters.iter_mut().rev() {
                caster.on_post_render(&mut host.scene, &mut host.frame_buffer);
            }
        }

        assert_eq!(host.quality.lock().pixel_light_count, 4, "frame {}", frame);
        assert_eq!(host.scene.layer_snapshot(host.character), before, "frame {}", frame);
        assert_eq!(host.scene.layer(companion), layer(10));
    }

    assert_eq!(casters[2].excluded_layer(), Some(layer(8)));
    assert_eq!(casters[1].excluded_layer(), Some(layer(10)));
    for caster in casters.iter() {
        assert_eq!(caster.stats().frames_composited, 4);
    }
}

#[test]
fn test_late_update_may_repeat() {
    let mut host = Host::new();
    let mut caster = host.caster();
    caster.start(&host.scene).expect("caster should start");

    caster.late_update(&host.scene, &mut host.device);
    caster.late_update(&host.scene, &mut host.device);
    host.frame(&mut caster);
    assert_eq!(caster.stats().frames_composited, 1);
    assert_eq!(caster.stats().surfaces_created, 1);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "out of order")]
fn test_double_pre_cull_panics_in_debug() {
    let mut host = Host::new();
    let mut caster = host.caster();
    caster.start(&host.scene).expect("caster should start");
    caster.late_update(&host.scene, &mut host.device);
    caster.on_pre_cull(&mut host.scene);
    caster.on_pre_cull(&mut host.scene);
}
