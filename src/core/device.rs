//! The graphics device abstraction.
//!
//! The render passes in this crate are written against [`RenderDevice`]
//! rather than a concrete graphics API. The wgpu implementation lives in
//! [`crate::backend`]; [`super::HeadlessDevice`] records the command stream
//! and backs the test suite.

use crate::geometry::Geometry;
use crate::material::{ShaderProgram, UniformValue};
use crate::math::Color;
use crate::shadows::ShadowMap;

use super::Id;

/// A viewport rectangle in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Viewport {
    /// Left edge.
    pub x: i32,
    /// Bottom edge.
    pub y: i32,
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Viewport {
    /// Create a new viewport.
    #[inline]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self { x, y, width, height }
    }
}

/// A render target: either the default (screen) target or an offscreen
/// target with a depth attachment.
#[derive(Debug)]
pub struct Framebuffer {
    id: Id,
    depth_attachment: Option<Id>,
}

impl Framebuffer {
    /// Create a framebuffer representing the default (screen) target.
    pub fn default_target() -> Self {
        Self { id: Id::new(), depth_attachment: None }
    }

    /// Create a framebuffer whose depth attachment is the given shadow map.
    pub fn with_depth(shadow_map: &ShadowMap) -> Self {
        Self {
            id: Id::new(),
            depth_attachment: Some(shadow_map.id()),
        }
    }

    /// Get the framebuffer id.
    #[inline]
    pub fn id(&self) -> Id {
        self.id
    }

    /// Get the depth attachment texture id, if any.
    #[inline]
    pub fn depth_attachment(&self) -> Option<Id> {
        self.depth_attachment
    }
}

/// The seam between render-pass logic and the graphics API.
///
/// Implementations are free to buffer commands; the renderer issues them in
/// the order the passes produce them and never depends on when they reach
/// the GPU within a frame.
pub trait RenderDevice {
    /// Allocate backing storage for a shadow map depth texture.
    fn init_shadow_map(&mut self, map: &ShadowMap);

    /// Create a render target with the framebuffer's attachments.
    /// Attachments must have been initialized beforehand.
    fn init_framebuffer(&mut self, framebuffer: &Framebuffer);

    /// Make the framebuffer the active render target.
    fn bind_framebuffer(&mut self, framebuffer: &Framebuffer);

    /// Set the viewport rectangle.
    fn set_viewport(&mut self, viewport: Viewport);

    /// Clear the active render target. `None` leaves a buffer untouched;
    /// the shadow pass clears depth only.
    fn clear(&mut self, color: Option<Color>, depth: Option<f32>);

    /// Activate a shader program.
    fn use_program(&mut self, program: &ShaderProgram);

    /// Set a named uniform on a program.
    fn set_uniform(&mut self, program: Id, name: &str, value: &UniformValue);

    /// Bind a geometry's vertex and index buffers.
    fn bind_geometry(&mut self, geometry: &Geometry);

    /// Draw the bound geometry with the active program.
    fn draw(&mut self, geometry: &Geometry);
}
