//! Shadow map texture handles.

use crate::core::Id;

/// A square depth texture a light renders its shadows into.
///
/// Owned by the light (lifetime = light's lifetime). The backing storage is
/// allocated by the device when the light creates the map.
#[derive(Debug)]
pub struct ShadowMap {
    id: Id,
    resolution: u32,
}

impl ShadowMap {
    /// Create a shadow map handle with the given square resolution.
    pub fn new(resolution: u32) -> Self {
        Self {
            id: Id::new(),
            resolution,
        }
    }

    /// The depth texture id.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// The resolution in pixels (maps are square).
    #[inline]
    pub fn resolution(&self) -> u32 {
        self.resolution
    }
}
