//! Light sources.

use std::rc::Rc;

use crate::core::{Id, RenderDevice};
use crate::math::{Color, Matrix4, Vector3, Vector4};
use crate::shadows::{ShadowConfig, ShadowMap};

/// Kind of light source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Parallel rays from a direction (sun-like). No position of its own.
    Directional,
    /// Omni-directional emitter at a position.
    Point,
    /// Cone-shaped emitter at a position.
    Spot,
}

/// A light source, optionally owning a shadow map.
///
/// The shadow map texture and the shadow view-projection matrix live on the
/// light: the shadow pass writes them, the lighting pass that performs
/// shadow lookups reads them.
#[derive(Debug)]
pub struct Light {
    id: Id,
    light_type: LightType,
    /// Light color.
    pub color: Color,
    /// Light intensity.
    pub intensity: f32,
    position: Vector3,
    direction: Vector3,
    attenuation: Vector4,
    shadow_map: Option<Rc<ShadowMap>>,
    shadow_matrix: Matrix4,
    shadow_bias: f32,
}

impl Light {
    fn new(light_type: LightType, position: Vector3, direction: Vector3, attenuation: Vector4) -> Self {
        Self {
            id: Id::new(),
            light_type,
            color: Color::WHITE,
            intensity: 1.0,
            position,
            direction: direction.normalized(),
            attenuation,
            shadow_map: None,
            shadow_matrix: Matrix4::IDENTITY,
            shadow_bias: 0.01,
        }
    }

    /// Create a directional light shining along `direction`.
    pub fn directional(direction: Vector3) -> Self {
        Self::new(LightType::Directional, Vector3::ZERO, direction, Vector4::ZERO)
    }

    /// Create a point light at `position` with the given range.
    pub fn point(position: Vector3, range: f32) -> Self {
        Self::new(
            LightType::Point,
            position,
            Vector3::UNIT_Y,
            Vector4::new(0.0, range, 0.0, 0.0),
        )
    }

    /// Create a spot light at `position` shining along `direction`.
    ///
    /// `range` is the maximum lit distance and `cone_angle` the full cone
    /// opening in radians; both feed the shadow projection.
    pub fn spot(position: Vector3, direction: Vector3, range: f32, cone_angle: f32) -> Self {
        Self::new(
            LightType::Spot,
            position,
            direction,
            Vector4::new(0.0, range, 0.5 * cone_angle, cone_angle),
        )
    }

    /// Get the unique ID.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// The light type.
    #[inline]
    pub fn light_type(&self) -> LightType {
        self.light_type
    }

    /// The light direction (normalized).
    #[inline]
    pub fn direction(&self) -> Vector3 {
        self.direction
    }

    /// Set the light direction.
    pub fn set_direction(&mut self, direction: Vector3) {
        self.direction = direction.normalized();
    }

    /// Move a positional light.
    pub fn set_position(&mut self, position: Vector3) {
        self.position = position;
    }

    /// The light position for shadow rendering.
    ///
    /// A directional light has no position of its own and anchors at the
    /// caller's reference point (the shadow volume center); positional
    /// lights return their own position.
    pub fn position_from(&self, reference: Vector3) -> Vector3 {
        match self.light_type {
            LightType::Directional => reference,
            _ => self.position,
        }
    }

    /// Packed attenuation parameters:
    /// `(min distance, max distance, inner angle, outer angle)`.
    /// The spot shadow projection derives its field of view from `w` and
    /// its far plane from `y`.
    #[inline]
    pub fn attenuation(&self) -> Vector4 {
        self.attenuation
    }

    /// Allocate the shadow map this light renders its shadows into.
    /// Resolution and depth bias come from the config.
    pub fn create_shadow_map(&mut self, device: &mut dyn RenderDevice, config: &ShadowConfig) {
        let map = ShadowMap::new(config.resolution());
        log::debug!(
            "shadow map {}x{} allocated for light {}",
            map.resolution(),
            map.resolution(),
            self.id
        );
        device.init_shadow_map(&map);
        self.shadow_map = Some(Rc::new(map));
        self.shadow_bias = config.bias;
    }

    /// The shadow map, if one has been created.
    #[inline]
    pub fn shadow_map(&self) -> Option<&Rc<ShadowMap>> {
        self.shadow_map.as_ref()
    }

    /// The light-space view-projection matrix of the last shadow render.
    #[inline]
    pub fn shadow_matrix(&self) -> &Matrix4 {
        &self.shadow_matrix
    }

    /// Store the light-space view-projection matrix. Written once per frame
    /// by the shadow pass.
    pub fn set_shadow_matrix(&mut self, matrix: Matrix4) {
        self.shadow_matrix = matrix;
    }

    /// Depth bias applied when sampling this light's shadow map.
    #[inline]
    pub fn shadow_bias(&self) -> f32 {
        self.shadow_bias
    }

    /// Set the shadow depth bias.
    pub fn set_shadow_bias(&mut self, bias: f32) {
        self.shadow_bias = bias;
    }
}
