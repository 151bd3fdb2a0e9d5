//! Renderer-wide quality settings and scoped overrides
//!
//! The capture pass only needs flat silhouettes, so per-pixel lighting is
//! turned down while it renders. The host's value is saved by the first
//! [`LightCountOverride`] and put back when the last one is dropped, so
//! casters whose capture windows overlap restore it in any order.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

/// Renderer quality knobs shared across the host
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualitySettings {
    /// Lights evaluated per pixel; the rest fall back to vertex lighting
    pub pixel_light_count: u32,
    /// Host value held while overrides are active
    #[serde(skip)]
    saved_light_count: Option<u32>,
    #[serde(skip)]
    active_overrides: u32,
}

impl Default for QualitySettings {
    fn default() -> Self {
        Self::with_pixel_light_count(4)
    }
}

impl QualitySettings {
    pub fn with_pixel_light_count(pixel_light_count: u32) -> Self {
        Self {
            pixel_light_count,
            saved_light_count: None,
            active_overrides: 0,
        }
    }

    /// Number of light-count overrides currently held
    pub fn active_overrides(&self) -> u32 {
        self.active_overrides
    }

    /// Wrap into a shared handle
    pub fn shared(self) -> SharedQualitySettings {
        Arc::new(Mutex::new(self))
    }
}

/// Quality settings shared between the host and shadow casters
pub type SharedQualitySettings = Arc<Mutex<QualitySettings>>;

/// Temporarily lowered pixel light count, restored when the last one drops
#[derive(Debug)]
pub struct LightCountOverride {
    settings: SharedQualitySettings,
    saved: u32,
}

impl LightCountOverride {
    /// Lower the light count to `reduced`, saving the host value if no other override holds it
    ///
    /// The count is never raised: a host already below `reduced` keeps its value.
    pub fn acquire(settings: &SharedQualitySettings, reduced: u32) -> Self {
        let mut guard = settings.lock();
        let saved = match guard.saved_light_count {
            Some(saved) => saved,
            None => {
                let current = guard.pixel_light_count;
                guard.saved_light_count = Some(current);
                current
            }
        };
        guard.active_overrides += 1;
        guard.pixel_light_count = guard.pixel_light_count.min(reduced);
        drop(guard);

        Self {
            settings: Arc::clone(settings),
            saved,
        }
    }

    /// Light count that will be restored
    pub fn saved(&self) -> u32 {
        self.saved
    }
}

impl Drop for LightCountOverride {
    fn drop(&mut self) {
        let mut guard = self.settings.lock();
        guard.active_overrides = guard.active_overrides.saturating_sub(1);
        if guard.active_overrides == 0 {
            if let Some(saved) = guard.saved_light_count.take() {
                guard.pixel_light_count = saved;
            }
        }
    }
}
