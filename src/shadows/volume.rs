//! Shadow volume: the world-space region a directional shadow camera covers.

use crate::math::Vector3;

/// Center and size of the box the directional light's orthographic frustum
/// is fitted to. Smaller volumes spend the shadow map's resolution on less
/// world, giving sharper shadows.
///
/// The volume is plain data; whether it tracks a moving focus point (the
/// player, the main camera) is the caller's decision, made by calling
/// [`crate::shadows::ShadowMapRenderPass::set_volume`] every frame or not
/// at all.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowVolume {
    center: Vector3,
    size: Vector3,
}

impl Default for ShadowVolume {
    fn default() -> Self {
        Self {
            center: Vector3::ZERO,
            size: Vector3::ONE,
        }
    }
}

impl ShadowVolume {
    /// Create a volume from its center and full size per axis.
    pub fn new(center: Vector3, size: Vector3) -> Self {
        Self { center, size }
    }

    /// The volume center.
    #[inline]
    pub fn center(&self) -> Vector3 {
        self.center
    }

    /// The full size per axis.
    #[inline]
    pub fn size(&self) -> Vector3 {
        self.size
    }

    /// Half the size per axis — the orthographic half-extents.
    #[inline]
    pub fn half_extents(&self) -> Vector3 {
        self.size * 0.5
    }
}
