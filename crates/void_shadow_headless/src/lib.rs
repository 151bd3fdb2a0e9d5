//! # void_shadow_headless - In-Memory Host
//!
//! Implementations of the `void_shadow` host seams that need no window or GPU:
//! - [`HeadlessScene`]: named scene graph with layers, transforms and bounds
//! - [`RecordingDevice`]: render device that records allocations and updates
//! - [`FrameBuffer`]: software color + depth buffer driven through the
//!   immediate-mode context
//! - [`Simulation`]: a bobbing character with one caster, used by the
//!   `blob-shadow-sim` binary

pub mod device;
pub mod raster;
pub mod scene;
pub mod sim;

pub use device::{DeviceEvent, DeviceStats, RecordingDevice};
pub use raster::{ortho_window_depth, projector_coverage, FrameBuffer, RasterStats, CLEAR_DEPTH};
pub use scene::{HeadlessScene, NodeBuilder};
pub use sim::{SimConfig, SimSummary, Simulation};
