//! Camera with explicit view and projection matrices.
//!
//! Unlike a scene camera that derives its view from a transform hierarchy,
//! render passes build cameras directly from matrices — the shadow pass
//! constructs a temporary light camera every frame and installs it for the
//! duration of the pass.

use crate::math::{Matrix4, Vector3};

/// A camera: a view matrix, a projection matrix, and their cached product.
///
/// `Clone + PartialEq` so that saved and restored cameras can be compared
/// bit-for-bit by state-restore tests.
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    view_matrix: Matrix4,
    projection_matrix: Matrix4,
    view_projection_matrix: Matrix4,
    needs_update: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self::new()
    }
}

impl Camera {
    /// Create a camera with identity view and projection.
    pub fn new() -> Self {
        Self {
            view_matrix: Matrix4::IDENTITY,
            projection_matrix: Matrix4::IDENTITY,
            view_projection_matrix: Matrix4::IDENTITY,
            needs_update: false,
        }
    }

    /// Set the view matrix from an eye position, target, and up vector.
    pub fn set_view(&mut self, eye: Vector3, target: Vector3, up: Vector3) {
        self.view_matrix = Matrix4::look_at(&eye, &target, &up);
        self.needs_update = true;
    }

    /// Set a perspective projection. `fov_y` is in radians.
    pub fn set_perspective(&mut self, fov_y: f32, aspect: f32, near: f32, far: f32) {
        self.projection_matrix = Matrix4::perspective(fov_y, aspect, near, far);
        self.needs_update = true;
    }

    /// Set an orthographic projection covering the box from `min` to `max`
    /// in view space.
    pub fn set_orthographic(&mut self, min: Vector3, max: Vector3) {
        self.projection_matrix = Matrix4::orthographic(min.x, max.x, min.y, max.y, min.z, max.z);
        self.needs_update = true;
    }

    /// Get the view matrix.
    #[inline]
    pub fn view_matrix(&self) -> &Matrix4 {
        &self.view_matrix
    }

    /// Get the projection matrix.
    #[inline]
    pub fn projection_matrix(&self) -> &Matrix4 {
        &self.projection_matrix
    }

    /// Get the combined view-projection matrix.
    pub fn view_projection_matrix(&mut self) -> &Matrix4 {
        if self.needs_update {
            self.view_projection_matrix = self.projection_matrix.multiply(&self.view_matrix);
            self.needs_update = false;
        }
        &self.view_projection_matrix
    }
}
