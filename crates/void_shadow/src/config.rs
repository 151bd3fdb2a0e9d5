//! Shadow caster configuration
//!
//! Per-instance settings with serde support. Every field may change at any
//! time; the controller re-reads a validated copy each frame.

use serde::{Deserialize, Serialize};

use crate::error::{ShadowError, ShadowResult};

/// Smallest capture surface edge
pub const MIN_TEXTURE_SIZE: u32 = 16;

/// Largest capture surface edge
pub const MAX_TEXTURE_SIZE: u32 = 4096;

/// Per-instance shadow caster configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowCasterConfig {
    /// How far beyond the enclosing volume the shadow is projected
    pub casting_distance: f32,

    /// Darkening strength (0 = black, 1 = no darkening)
    pub lightness: f32,

    /// Capture surface edge in pixels (power of 2)
    pub texture_size: u32,

    /// Depth buffer bits of the capture surface
    pub depth_bits: u32,

    /// Per-pixel light count while the capture pass renders
    pub capture_light_count: u32,
}

impl Default for ShadowCasterConfig {
    fn default() -> Self {
        Self {
            casting_distance: 10.0,
            lightness: 0.3,
            texture_size: 256,
            depth_bits: 16,
            capture_light_count: 0,
        }
    }
}

impl ShadowCasterConfig {
    /// Set casting distance
    pub fn with_casting_distance(mut self, distance: f32) -> Self {
        self.casting_distance = distance;
        self
    }

    /// Set lightness
    pub fn with_lightness(mut self, lightness: f32) -> Self {
        self.lightness = lightness;
        self
    }

    /// Set capture texture size
    pub fn with_texture_size(mut self, size: u32) -> Self {
        self.texture_size = size;
        self
    }

    /// Clamp values to valid ranges
    pub fn validate(&mut self) {
        if !self.casting_distance.is_finite() {
            self.casting_distance = Self::default().casting_distance;
        }
        self.casting_distance = self.casting_distance.max(0.0);
        if !self.lightness.is_finite() {
            self.lightness = Self::default().lightness;
        }
        self.lightness = self.lightness.clamp(0.0, 1.0);
        self.texture_size = self
            .texture_size
            .clamp(MIN_TEXTURE_SIZE, MAX_TEXTURE_SIZE)
            .next_power_of_two();
        self.depth_bits = match self.depth_bits {
            0 => 0,
            1..=16 => 16,
            _ => 24,
        };
    }

    /// Validated copy
    pub fn validated(&self) -> Self {
        let mut config = self.clone();
        config.validate();
        config
    }

    /// Parse from JSON, validating the result
    pub fn from_json(json: &str) -> ShadowResult<Self> {
        let mut config: Self =
            serde_json::from_str(json).map_err(|e| ShadowError::Config(e.to_string()))?;
        config.validate();
        Ok(config)
    }
}
