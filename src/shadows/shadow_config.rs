//! Shadow configuration types.

use serde::{Deserialize, Serialize};

/// Shadow quality presets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ShadowQuality {
    /// 512x512 resolution — the classic single-light setup.
    #[default]
    Low,
    /// 1024x1024 resolution.
    Medium,
    /// 2048x2048 resolution.
    High,
    /// 4096x4096 resolution.
    Ultra,
}

impl ShadowQuality {
    /// Get the shadow map resolution for this quality level.
    pub fn resolution(&self) -> u32 {
        match self {
            Self::Low => 512,
            Self::Medium => 1024,
            Self::High => 2048,
            Self::Ultra => 4096,
        }
    }
}

/// Shadow rendering configuration.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ShadowConfig {
    /// Quality preset, determines shadow map resolution.
    pub quality: ShadowQuality,
    /// Depth bias applied when sampling the shadow map.
    pub bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        Self {
            quality: ShadowQuality::default(),
            bias: 0.01,
        }
    }
}

impl ShadowConfig {
    /// Create a config with a quality preset.
    pub fn with_quality(quality: ShadowQuality) -> Self {
        Self {
            quality,
            ..Self::default()
        }
    }

    /// Set the sampling depth bias.
    pub fn bias(mut self, bias: f32) -> Self {
        self.bias = bias;
        self
    }

    /// Shadow map resolution from the quality preset.
    #[inline]
    pub fn resolution(&self) -> u32 {
        self.quality.resolution()
    }
}
